//! Identity provider session and identity payloads.
//!
//! Mirrors the subset of the provider's `/sessions/whoami` and
//! `/admin/identities/{id}` responses the server relies on. Unknown fields
//! are ignored during deserialization.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Credential type key for social sign-in credentials.
pub const OIDC_CREDENTIAL: &str = "oidc";

/// Identifier prefix the provider uses for Google-linked OIDC credentials.
pub const GOOGLE_IDENTIFIER_PREFIX: &str = "google:";

/// Verifiable address channel for email.
pub const EMAIL_CHANNEL: &str = "email";

/// An authenticated session as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authenticated_at: Option<DateTime<Utc>>,
    pub identity: Identity,
}

/// Identity record held by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub traits: IdentityTraits,
    #[serde(default)]
    pub verifiable_addresses: Vec<VerifiableAddress>,
    /// Keyed by credential type (`password`, `oidc`, ...). Only present on
    /// admin lookups that ask for it.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub credentials: HashMap<String, Credential>,
}

/// Schema traits the server reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct IdentityTraits {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<NameTraits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NameTraits {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
}

/// A contact channel tracked by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifiableAddress {
    pub value: String,
    #[serde(default)]
    pub verified: bool,
    /// Channel, e.g. `email`
    pub via: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Credential metadata (never secrets).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "type", default)]
    pub credential_type: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<String>,
}

impl Identity {
    /// Primary email: the schema trait, falling back to the first email address.
    pub fn email(&self) -> Option<&str> {
        self.traits.email.as_deref().or_else(|| {
            self.verifiable_addresses
                .iter()
                .find(|a| a.via == EMAIL_CHANNEL)
                .map(|a| a.value.as_str())
        })
    }

    pub fn first_name(&self) -> Option<&str> {
        self.traits.name.as_ref().and_then(|n| n.first.as_deref())
    }

    pub fn last_name(&self) -> Option<&str> {
        self.traits.name.as_ref().and_then(|n| n.last.as_deref())
    }

    /// Whether an OIDC credential was linked through Google.
    pub fn has_google_oidc(&self) -> bool {
        self.credentials
            .get(OIDC_CREDENTIAL)
            .is_some_and(|c| {
                c.identifiers
                    .iter()
                    .any(|id| id.starts_with(GOOGLE_IDENTIFIER_PREFIX))
            })
    }

    /// Whether any email-channel address is marked verified.
    pub fn has_verified_email(&self) -> bool {
        self.verifiable_addresses
            .iter()
            .any(|a| a.via == EMAIL_CHANNEL && a.verified)
    }

    /// Whether credential metadata was included in this payload.
    pub fn has_credentials(&self) -> bool {
        !self.credentials.is_empty()
    }
}
