//! Adapters for the external identity and OAuth2 providers, plus the
//! session and client-management logic built on them.

pub mod client_manager;
pub mod identity;
pub mod oauth2_provider;

pub use client_manager::ClientManager;
pub use identity::{IdentityClient, SessionCredential};
pub use oauth2_provider::OAuth2ProviderClient;

use crate::error::AppError;

/// Failure talking to an external provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered and refused the credential or request
    #[error("rejected by provider: {0}")]
    Rejected(String),

    /// The addressed resource does not exist at the provider
    #[error("not found at provider")]
    NotFound,

    /// Transport failure, timeout, 5xx or malformed payload
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Unavailable(format!("timeout: {}", err))
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => AppError::NotFound("Provider resource".to_string()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}
