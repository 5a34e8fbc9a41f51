//! Caller authentication: identity provider sessions, the email
//! verification gate, and the webhook shared secret.

mod extractor;
pub mod gate;
pub mod session;
pub mod verification;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

pub use extractor::{AuthenticatedSession, VerifiedUser, WebhookAuth};
pub use gate::{GatedSession, require_session, require_verified_session};
pub use session::SessionResolver;
pub use verification::VerificationPolicy;

/// Shared secret the identity provider sends on `/hooks/*` calls.
///
/// `Debug` never prints the value.
#[derive(Clone)]
pub struct WebhookSecret(Option<SecretString>);

impl WebhookSecret {
    pub fn new(secret: Option<SecretString>) -> Self {
        Self(secret)
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    /// Constant-time comparison against the configured secret.
    ///
    /// Unequal lengths compare false without an early exit.
    pub fn verify(&self, provided: &str) -> bool {
        match &self.0 {
            Some(secret) => secret
                .expose_secret()
                .as_bytes()
                .ct_eq(provided.as_bytes())
                .into(),
            None => false,
        }
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "WebhookSecret([REDACTED])"),
            None => write!(f, "WebhookSecret(None)"),
        }
    }
}
