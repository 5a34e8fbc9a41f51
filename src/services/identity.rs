//! Identity provider adapter.
//!
//! Two calls are used:
//! - `GET {public}/sessions/whoami` confirms a session token or cookie
//! - `GET {admin}/admin/identities/{id}` loads an identity with credential metadata
//!
//! Neither call is retried. Callers decide how a failure surfaces.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use uuid::Uuid;

use super::ProviderError;
use crate::config::{IdentitySettings, SESSION_TOKEN_HEADER};
use crate::error::{AppError, AppResult};
use crate::models::{Identity, Session};

/// HTTP connect timeout for identity provider calls.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP total timeout for identity provider calls.
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// A credential presented by a caller, in the form it is forwarded upstream.
#[derive(Debug, Clone)]
pub enum SessionCredential {
    /// `Authorization: Bearer <token>`, forwarded as `X-Session-Token`
    Bearer(SecretString),
    /// Session cookie value, forwarded as a `Cookie` header
    Cookie(SecretString),
}

impl SessionCredential {
    /// Carrier name for logs. Never includes the credential value.
    pub fn carrier(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::Cookie(_) => "cookie",
        }
    }
}

/// Client for the identity provider's public and admin APIs.
#[derive(Clone)]
pub struct IdentityClient {
    public_url: String,
    admin_url: String,
    session_cookie: String,
    http_client: reqwest::Client,
}

impl IdentityClient {
    pub fn new(settings: &IdentitySettings) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::Internal(format!("Failed to build identity provider client: {}", e))
            })?;

        info!(
            "Identity provider client initialized (public={}, admin={}, cookie={})",
            settings.public_url, settings.admin_url, settings.session_cookie
        );

        Ok(Self {
            public_url: settings.public_url.trim_end_matches('/').to_string(),
            admin_url: settings.admin_url.trim_end_matches('/').to_string(),
            session_cookie: settings.session_cookie.clone(),
            http_client,
        })
    }

    /// Name of the browser session cookie.
    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    /// Ask the provider whether the credential belongs to an active session.
    pub async fn to_session(&self, credential: &SessionCredential) -> Result<Session, ProviderError> {
        let url = format!("{}/sessions/whoami", self.public_url);
        let request = match credential {
            SessionCredential::Bearer(token) => self
                .http_client
                .get(&url)
                .header(SESSION_TOKEN_HEADER, token.expose_secret()),
            SessionCredential::Cookie(value) => self.http_client.get(&url).header(
                reqwest::header::COOKIE,
                format!("{}={}", self.session_cookie, value.expose_secret()),
            ),
        };

        let response = request.send().await.map_err(ProviderError::transport)?;
        let response = check_status(response).await?;

        let session: Session = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("malformed session payload: {}", e)))?;

        if !session.active {
            return Err(ProviderError::Rejected("session is not active".to_string()));
        }

        debug!(
            "Session {} confirmed for identity {}",
            session.id, session.identity.id
        );
        Ok(session)
    }

    /// Load an identity with its OIDC credential identifiers.
    pub async fn get_identity(&self, id: Uuid) -> Result<Identity, ProviderError> {
        let url = format!(
            "{}/admin/identities/{}?include_credential=oidc",
            self.admin_url, id
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ProviderError::transport)?;
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("malformed identity payload: {}", e)))
    }
}

/// Map provider status codes onto [`ProviderError`].
///
/// 401 and 403 are rejections, 404 is reported separately, anything else
/// outside 2xx counts as the provider being unavailable.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderError::Rejected(format!("{}: {}", status, snippet)))
        }
        StatusCode::NOT_FOUND => Err(ProviderError::NotFound),
        _ => Err(ProviderError::Unavailable(format!("{}: {}", status, snippet))),
    }
}
