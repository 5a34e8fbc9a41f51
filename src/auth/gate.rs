//! Session gates for protected routes.
//!
//! Handler extractors are polled together, so a malformed path or body can
//! fail while a session lookup is still in flight. The gates resolve the
//! session (and optionally the verification policy) before the route's
//! extractors run, and leave the result in request extensions for
//! [`AuthenticatedSession`](super::AuthenticatedSession) and
//! [`VerifiedUser`](super::VerifiedUser).

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{Error, HttpMessage};
use tracing::info;

use super::extractor::app_data;
use super::session::{SessionResolver, extract_credentials};
use super::verification::VerificationPolicy;
use crate::error::{AppError, AppResult};
use crate::models::Session;

/// Session attached to a request by one of the gates.
#[derive(Debug, Clone)]
pub struct GatedSession {
    pub session: Session,
    /// True only when the verification policy ran and passed
    pub verified: bool,
}

async fn resolve(req: &ServiceRequest) -> AppResult<Session> {
    let resolver = app_data::<SessionResolver>(req.request())?;
    let credentials = extract_credentials(req.request(), resolver.cookie_name());
    resolver.resolve(&credentials).await
}

async fn resolve_verified(req: &ServiceRequest) -> AppResult<Session> {
    let session = resolve(req).await?;
    let policy = app_data::<VerificationPolicy>(req.request())?;

    if !policy.check(&session.identity).await? {
        info!(
            "Identity {} rejected: email address not verified",
            session.identity.id
        );
        return Err(AppError::EmailNotVerified);
    }

    Ok(session)
}

fn pass<B: MessageBody>(
    req: ServiceRequest,
    outcome: AppResult<GatedSession>,
) -> Result<ServiceRequest, ServiceResponse<EitherBody<B>>> {
    match outcome {
        Ok(gated) => {
            req.extensions_mut().insert(gated);
            Ok(req)
        }
        // Rendered here so outer middleware (CORS, request logging) sees a
        // normal response
        Err(e) => Err(req.error_response(e).map_into_right_body()),
    }
}

/// Require a confirmed session. No verification check.
pub async fn require_session<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let outcome = resolve(&req).await.map(|session| GatedSession {
        session,
        verified: false,
    });

    match pass(req, outcome) {
        Ok(req) => Ok(next.call(req).await?.map_into_left_body()),
        Err(rejected) => Ok(rejected),
    }
}

/// Require a confirmed session whose identity passes the verification
/// policy. Unverified callers get 403 with `EMAIL_NOT_VERIFIED`.
pub async fn require_verified_session<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let outcome = resolve_verified(&req).await.map(|session| GatedSession {
        session,
        verified: true,
    });

    match pass(req, outcome) {
        Ok(req) => Ok(next.call(req).await?.map_into_left_body()),
        Err(rejected) => Ok(rejected),
    }
}
