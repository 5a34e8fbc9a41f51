//! Session resolution: bearer token first, then the session cookie.

use actix_web::HttpRequest;
use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::Session;
use crate::services::{IdentityClient, ProviderError, SessionCredential};

/// Pull every credential the caller presented, in resolution order.
pub fn extract_credentials(req: &HttpRequest, cookie_name: &str) -> Vec<SessionCredential> {
    let mut credentials = Vec::with_capacity(2);

    if let Some(token) = bearer_token(req.headers()) {
        credentials.push(SessionCredential::Bearer(SecretString::from(token.to_string())));
    }

    if let Some(cookie) = req.cookie(cookie_name)
        && !cookie.value().is_empty()
    {
        credentials.push(SessionCredential::Cookie(SecretString::from(
            cookie.value().to_string(),
        )));
    }

    credentials
}

/// Token from `Authorization: Bearer <token>`, if present and non-empty.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Which carrier a request uses, for logging. Never returns the value.
pub fn carrier_kind(headers: &HeaderMap, cookie_name: &str) -> &'static str {
    if bearer_token(headers).is_some() {
        return "bearer";
    }

    let has_cookie = headers
        .get_all(actix_web::http::header::COOKIE)
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|pair| {
            pair.trim()
                .split_once('=')
                .is_some_and(|(name, value)| name == cookie_name && !value.is_empty())
        });

    if has_cookie { "cookie" } else { "none" }
}

/// Confirms caller credentials with the identity provider.
#[derive(Clone)]
pub struct SessionResolver {
    identity: IdentityClient,
}

impl SessionResolver {
    pub fn new(identity: IdentityClient) -> Self {
        Self { identity }
    }

    pub fn cookie_name(&self) -> &str {
        self.identity.session_cookie()
    }

    /// Try each credential in order; the first active session wins.
    ///
    /// Provider failures are not retried and end as `Unauthenticated`.
    pub async fn resolve(&self, credentials: &[SessionCredential]) -> AppResult<Session> {
        if credentials.is_empty() {
            return Err(AppError::Unauthenticated(
                "No session credential provided".to_string(),
            ));
        }

        for credential in credentials {
            match self.identity.to_session(credential).await {
                Ok(session) => {
                    debug!(
                        "Resolved session {} via {}",
                        session.id,
                        credential.carrier()
                    );
                    return Ok(session);
                }
                Err(ProviderError::Rejected(reason)) => {
                    info!(
                        "Session credential rejected (carrier={}): {}",
                        credential.carrier(),
                        reason
                    );
                }
                Err(ProviderError::NotFound) => {
                    info!(
                        "Session credential rejected (carrier={}): session not found",
                        credential.carrier()
                    );
                }
                Err(ProviderError::Unavailable(reason)) => {
                    warn!(
                        "Identity provider unavailable while resolving session (carrier={}): {}",
                        credential.carrier(),
                        reason
                    );
                }
            }
        }

        Err(AppError::Unauthenticated(
            "Session is invalid or expired".to_string(),
        ))
    }
}
