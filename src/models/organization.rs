//! Organization models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::membership::MemberRole;

/// Name given to the organization created at bootstrap.
pub const DEFAULT_ORGANIZATION_NAME: &str = "Default Organization";

/// Maximum organization name length (matches the column width).
const MAX_NAME_LEN: usize = 255;

/// Opaque attribute document stored as a JSONB object.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Organization kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrgType {
    #[default]
    Organization,
    Tenant,
}

impl OrgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Tenant => "tenant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "organization" => Some(Self::Organization),
            "tenant" => Some(Self::Tenant),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Organization stored in database.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub org_type: OrgType,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub is_default: bool,
    #[schema(value_type = Object)]
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::organization::Model> for Organization {
    fn from(m: crate::entity::organization::Model) -> Self {
        let attributes = match m.attributes {
            serde_json::Value::Object(map) => map,
            _ => Attributes::new(),
        };

        Self {
            id: m.id,
            parent_id: m.parent_id,
            org_type: OrgType::parse(&m.org_type).unwrap_or_default(),
            name: m.name,
            description: m.description,
            owner_id: m.owner_id,
            is_default: m.is_default,
            attributes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Organization as seen by a member, with the caller's role.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizationSummary {
    #[serde(flatten)]
    pub organization: Organization,
    pub role: MemberRole,
    pub member_count: u64,
}

/// Create organization request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub org_type: Option<OrgType>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<serde_json::Value>,
}

/// Update organization request. Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub org_type: Option<OrgType>,
    /// Replaces the whole attribute document when present
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<serde_json::Value>,
}

/// Validated fields for an organization insert.
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub description: Option<String>,
    pub org_type: OrgType,
    pub parent_id: Option<Uuid>,
    pub attributes: Attributes,
}

/// Validated fields for an organization update.
#[derive(Debug, Clone, Default)]
pub struct OrganizationChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub org_type: Option<OrgType>,
    pub attributes: Option<Attributes>,
}

/// Organization list response.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationListResponse {
    pub organizations: Vec<OrganizationSummary>,
}

/// Validate and trim an organization name.
pub fn validate_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("name is required".to_string());
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(format!("name must be at most {} characters", MAX_NAME_LEN));
    }
    Ok(trimmed.to_string())
}

/// Accept only a JSON object as the attribute document.
pub fn validate_attributes(value: Option<serde_json::Value>) -> Result<Option<Attributes>, String> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err("attributes must be a JSON object".to_string()),
    }
}

impl CreateOrganizationRequest {
    pub fn validate(self) -> Result<NewOrganization, String> {
        Ok(NewOrganization {
            name: validate_name(&self.name)?,
            description: self.description.map(|d| d.trim().to_string()),
            org_type: self.org_type.unwrap_or_default(),
            parent_id: self.parent_id,
            attributes: validate_attributes(self.attributes)?.unwrap_or_default(),
        })
    }
}

impl UpdateOrganizationRequest {
    pub fn validate(self) -> Result<OrganizationChanges, String> {
        let name = match self.name {
            Some(n) => Some(validate_name(&n)?),
            None => None,
        };

        Ok(OrganizationChanges {
            name,
            description: self.description.map(|d| d.trim().to_string()),
            org_type: self.org_type,
            attributes: validate_attributes(self.attributes)?,
        })
    }
}
