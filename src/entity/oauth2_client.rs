//! Local mirror of an OAuth2 machine-to-machine client.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth2_clients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Client id assigned by the OAuth2 provider
    #[sea_orm(unique)]
    pub client_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Space-delimited scope string
    pub scope: String,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub is_active: bool,
    /// First 16 hex chars of SHA-256(secret); the secret itself is never stored
    pub secret_fingerprint: String,
    pub last_used_at: Option<DateTimeUtc>,
    pub secret_rotated_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
