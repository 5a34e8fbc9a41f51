//! User models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::organization::OrganizationSummary;

/// Maximum length accepted for profile string fields.
const MAX_PROFILE_FIELD_LEN: usize = 100;

/// User stored in database.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub theme: Option<String>,
    pub can_create_organizations: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name assembled from name parts, falling back to the email.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => self.email.clone(),
        }
    }
}

impl From<crate::entity::user::Model> for User {
    fn from(m: crate::entity::user::Model) -> Self {
        Self {
            id: m.id,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            timezone: m.timezone,
            locale: m.locale,
            theme: m.theme,
            can_create_organizations: m.can_create_organizations,
            last_login_at: m.last_login_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Profile fields copied from an identity provider identity.
#[derive(Debug, Clone)]
pub struct IdentityProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Outcome of creating or refreshing a local user from an identity.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub user: User,
    /// True when the row was inserted by this call
    pub created: bool,
    /// True when this user became the bootstrap owner of the default organization
    pub bootstrapped: bool,
}

/// Profile update request (`PUT /api/users/me`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// IANA timezone name, e.g. `Europe/Berlin`
    pub timezone: Option<String>,
    pub locale: Option<String>,
    /// `light`, `dark` or `system`
    pub theme: Option<String>,
}

impl UpdateProfileRequest {
    /// Validate lengths and the theme value.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("timezone", &self.timezone),
            ("locale", &self.locale),
        ] {
            if let Some(v) = value
                && v.chars().count() > MAX_PROFILE_FIELD_LEN
            {
                return Err(format!(
                    "{} must be at most {} characters",
                    field, MAX_PROFILE_FIELD_LEN
                ));
            }
        }

        if let Some(ref theme) = self.theme
            && !matches!(theme.as_str(), "light" | "dark" | "system")
        {
            return Err("theme must be one of 'light', 'dark', 'system'".to_string());
        }

        Ok(())
    }
}

/// User list response.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

/// `GET /api/whoami` response.
#[derive(Debug, Serialize, ToSchema)]
pub struct WhoamiResponse {
    pub identity_id: Uuid,
    pub session_id: String,
    pub email: Option<String>,
    /// Result of the email verification policy
    pub verified: bool,
    /// Local record; None until the registration callback has been received
    pub user: Option<User>,
    pub organizations: Vec<OrganizationSummary>,
}
