//! Actix-web extractors for session authentication.
//!
//! Session extractors read what the gates in [`super::gate`] resolved.
//! Credentials are wrapped in `SecretString` as soon as they are read from
//! the request and are never logged.

use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest, web};
use secrecy::{ExposeSecret, SecretString};
use tracing::error;
use uuid::Uuid;

use super::WebhookSecret;
use super::gate::GatedSession;
use crate::config::WEBHOOK_SECRET_HEADER;
use crate::error::AppError;
use crate::models::Session;

pub(super) fn app_data<T: 'static>(req: &HttpRequest) -> Result<web::Data<T>, AppError> {
    req.app_data::<web::Data<T>>().cloned().ok_or_else(|| {
        error!(
            "Missing app data {} for authentication",
            std::any::type_name::<T>()
        );
        AppError::Internal("Authentication is not configured".to_string())
    })
}

/// A session confirmed by the identity provider. No verification check.
///
/// Only available on routes wrapped in [`require_session`](super::require_session)
/// or [`require_verified_session`](super::require_verified_session).
///
/// ```ignore
/// async fn whoami(auth: AuthenticatedSession) -> impl Responder { ... }
/// ```
pub struct AuthenticatedSession {
    pub session: Session,
}

impl AuthenticatedSession {
    /// Identity id, which is also the local user id.
    pub fn user_id(&self) -> Uuid {
        self.session.identity.id
    }
}

impl FromRequest for AuthenticatedSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(gated_session(req).map(|gated| AuthenticatedSession {
            session: gated.session,
        }))
    }
}

/// A session whose identity passed the verification policy.
///
/// Only available on routes wrapped in
/// [`require_verified_session`](super::require_verified_session), which
/// answers 403 with `EMAIL_NOT_VERIFIED` for unverified callers.
pub struct VerifiedUser {
    pub session: Session,
}

impl VerifiedUser {
    /// Identity id, which is also the local user id.
    pub fn user_id(&self) -> Uuid {
        self.session.identity.id
    }
}

impl FromRequest for VerifiedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = gated_session(req).and_then(|gated| {
            if gated.verified {
                Ok(VerifiedUser {
                    session: gated.session,
                })
            } else {
                error!(
                    "Route {} takes VerifiedUser but is not behind the verification gate",
                    req.path()
                );
                Err(AppError::Internal(
                    "Authentication is not configured".to_string(),
                ))
            }
        });
        ready(result)
    }
}

/// Session left in request extensions by a gate.
fn gated_session(req: &HttpRequest) -> Result<GatedSession, AppError> {
    req.extensions()
        .get::<GatedSession>()
        .cloned()
        .ok_or_else(|| AppError::Unauthenticated("No session credential provided".to_string()))
}

/// Proof that a webhook request carried the shared secret.
///
/// When no secret is configured every request passes.
pub struct WebhookAuth;

impl FromRequest for WebhookAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let secret = match app_data::<WebhookSecret>(req) {
            Ok(secret) => secret,
            Err(e) => return ready(Err(e)),
        };

        if !secret.is_configured() {
            return ready(Ok(WebhookAuth));
        }

        let provided: Option<SecretString> = req
            .headers()
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| SecretString::from(s.to_string()));

        match provided {
            Some(ref value) if secret.verify(value.expose_secret()) => ready(Ok(WebhookAuth)),
            Some(_) => ready(Err(AppError::Unauthenticated(
                "Invalid webhook secret".to_string(),
            ))),
            None => ready(Err(AppError::Unauthenticated(format!(
                "Missing {} header",
                WEBHOOK_SECRET_HEADER
            )))),
        }
    }
}
