//! Identity provider webhook payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::identity::Identity;

/// Body posted by the identity provider after registration, login or
/// verification flows.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IdentityHookPayload {
    pub identity: Identity,
    /// Flow id, logged for correlation only
    #[serde(default)]
    pub flow_id: Option<String>,
}

/// Acknowledgement returned to the identity provider.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HookAck {
    pub status: String,
    pub user_id: String,
    /// True when the local user row was created by this call
    pub created: bool,
}
