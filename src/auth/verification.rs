//! Email verification policy.
//!
//! A caller counts as verified when any of these hold:
//! 1. at most one local user exists (the bootstrap user)
//! 2. the identity has an OIDC credential linked through Google
//! 3. the identity has a verified email-channel address

use tracing::debug;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::Identity;
use crate::services::IdentityClient;

/// Rules that depend only on the identity document.
pub fn verified_by_identity(identity: &Identity) -> bool {
    identity.has_google_oidc() || identity.has_verified_email()
}

/// Full truth table for a known user count.
pub fn is_verified(user_count: u64, identity: &Identity) -> bool {
    user_count <= 1 || verified_by_identity(identity)
}

/// Applies the policy to a session identity.
#[derive(Clone)]
pub struct VerificationPolicy {
    pool: DbPool,
    identity: IdentityClient,
}

impl VerificationPolicy {
    pub fn new(pool: DbPool, identity: IdentityClient) -> Self {
        Self { pool, identity }
    }

    /// Evaluate the policy.
    ///
    /// Session payloads usually omit credential metadata. In that case the
    /// identity is loaded through the admin API, which is only done once the
    /// cheaper checks have failed. Errors from the user count or the lookup
    /// propagate.
    pub async fn check(&self, identity: &Identity) -> AppResult<bool> {
        if verified_by_identity(identity) {
            return Ok(true);
        }

        let user_count = self.pool.count_users().await?;
        if user_count <= 1 {
            debug!("Identity {} verified as bootstrap user", identity.id);
            return Ok(true);
        }

        if identity.has_credentials() {
            return Ok(false);
        }

        let full = self.identity.get_identity(identity.id).await?;
        Ok(verified_by_identity(&full))
    }
}
