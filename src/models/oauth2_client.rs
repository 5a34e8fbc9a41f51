//! OAuth2 machine-to-machine client models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

/// Scope characters allowed by RFC 6749 §3.3 (NQCHAR without space).
fn is_scope_char(c: char) -> bool {
    c == '!' || ('#'..='[').contains(&c) || (']'..='~').contains(&c)
}

/// Audit actions recorded for client operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuditAction {
    Created,
    SecretRegenerated,
    Revoked,
    Deleted,
    TokenIssued,
}

impl ClientAuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::SecretRegenerated => "secret_regenerated",
            Self::Revoked => "revoked",
            Self::Deleted => "deleted",
            Self::TokenIssued => "token_issued",
        }
    }
}

/// Local client record (never contains the secret).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OAuth2Client {
    pub id: Uuid,
    pub client_id: String,
    pub name: String,
    pub description: Option<String>,
    pub scope: String,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub is_active: bool,
    pub secret_fingerprint: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub secret_rotated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::oauth2_client::Model> for OAuth2Client {
    fn from(m: crate::entity::oauth2_client::Model) -> Self {
        Self {
            id: m.id,
            client_id: m.client_id,
            name: m.name,
            description: m.description,
            scope: m.scope,
            owner_id: m.owner_id,
            organization_id: m.organization_id,
            is_active: m.is_active,
            secret_fingerprint: m.secret_fingerprint,
            last_used_at: m.last_used_at,
            secret_rotated_at: m.secret_rotated_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// One audit log entry for a client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientAuditEntry {
    pub id: Uuid,
    pub client_id: String,
    /// Acting user; absent for token issuance by the client itself
    pub actor_id: Option<Uuid>,
    pub action: String,
    #[schema(value_type = Option<Object>)]
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entity::oauth2_client_audit::Model> for ClientAuditEntry {
    fn from(m: crate::entity::oauth2_client_audit::Model) -> Self {
        Self {
            id: m.id,
            client_id: m.client_id,
            actor_id: m.actor_id,
            action: m.action,
            detail: m.detail,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientAuditResponse {
    /// Oldest first
    pub entries: Vec<ClientAuditEntry>,
}

/// Create client request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateClientRequest {
    pub name: String,
    pub description: Option<String>,
    pub organization_id: Uuid,
    /// Space-delimited scopes
    #[serde(default)]
    pub scope: Option<String>,
}

impl CreateClientRequest {
    /// Validate name and normalize the scope string.
    pub fn validate(&self) -> Result<(String, String), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("name is required".to_string());
        }
        if name.chars().count() > 100 {
            return Err("name must be at most 100 characters".to_string());
        }
        let scope = normalize_scope(self.scope.as_deref().unwrap_or(""))?;
        Ok((name.to_string(), scope))
    }
}

/// Returned once, on creation and on secret regeneration.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientSecretResponse {
    pub client_id: String,
    pub client_secret: String,
    pub name: String,
    pub scope: String,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientListResponse {
    pub clients: Vec<OAuth2Client>,
}

/// Query string for `DELETE /api/oauth2/clients/{client_id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteClientQuery {
    /// Hard-delete instead of revoking
    #[serde(default)]
    pub hard: bool,
}

/// Client-credentials token request (form or JSON).
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Token issued by the OAuth2 provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Token validation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateTokenRequest {
    pub token: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Introspection result (RFC 7662 subset).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Collapse whitespace and reject characters outside the scope grammar.
pub fn normalize_scope(raw: &str) -> Result<String, String> {
    let mut scopes: Vec<&str> = Vec::new();
    for token in raw.split_whitespace() {
        if !token.chars().all(is_scope_char) {
            return Err(format!("invalid scope token '{}'", token));
        }
        if !scopes.contains(&token) {
            scopes.push(token);
        }
    }
    Ok(scopes.join(" "))
}

/// Short SHA-256 fingerprint used to identify a secret without storing it.
pub fn secret_fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Generate a fresh client secret.
pub fn generate_secret() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}
