//! Database queries for OAuth2 client mirrors and their audit log.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::DbPool;
use crate::entity::oauth2_client::{self as client, ActiveModel, Entity as ClientEntity};
use crate::entity::oauth2_client_audit::{self as audit, Entity as AuditEntity};
use crate::error::{AppError, AppResult};
use crate::models::{ClientAuditAction, ClientAuditEntry, OAuth2Client};

/// Fields for a freshly registered client.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub client_id: String,
    pub name: String,
    pub description: Option<String>,
    pub scope: String,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub secret_fingerprint: String,
}

impl DbPool {
    /// Insert the local mirror of a client registered with the provider.
    pub async fn insert_client(&self, new_client: NewClient) -> AppResult<OAuth2Client> {
        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            client_id: Set(new_client.client_id),
            name: Set(new_client.name),
            description: Set(new_client.description),
            scope: Set(new_client.scope),
            owner_id: Set(new_client.owner_id),
            organization_id: Set(new_client.organization_id),
            is_active: Set(true),
            secret_fingerprint: Set(new_client.secret_fingerprint),
            last_used_at: Set(None),
            secret_rotated_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = model.insert(self.connection()).await?;
        Ok(inserted.into())
    }

    /// Find a client by provider client id.
    pub async fn find_client(&self, client_id: &str) -> AppResult<Option<OAuth2Client>> {
        let result = ClientEntity::find()
            .filter(client::Column::ClientId.eq(client_id))
            .one(self.connection())
            .await?;
        Ok(result.map(OAuth2Client::from))
    }

    /// Clients the user owns or can manage through an organization role,
    /// newest first.
    pub async fn list_clients_visible_to(
        &self,
        user_id: Uuid,
        managed_org_ids: &[Uuid],
    ) -> AppResult<Vec<OAuth2Client>> {
        let mut condition = sea_orm::Condition::any().add(client::Column::OwnerId.eq(user_id));
        if !managed_org_ids.is_empty() {
            condition = condition.add(client::Column::OrganizationId.is_in(managed_org_ids.to_vec()));
        }

        let rows = ClientEntity::find()
            .filter(condition)
            .order_by_desc(client::Column::CreatedAt)
            .all(self.connection())
            .await?;
        Ok(rows.into_iter().map(OAuth2Client::from).collect())
    }

    /// Flip the active flag. Returns the updated client.
    pub async fn set_client_active(&self, client_id: &str, active: bool) -> AppResult<OAuth2Client> {
        let existing = self.find_client_model(client_id).await?;

        let mut model: ActiveModel = existing.into();
        model.is_active = Set(active);
        model.updated_at = Set(Utc::now());

        let updated = model.update(self.connection()).await?;
        Ok(updated.into())
    }

    /// Record a rotated secret by fingerprint.
    pub async fn update_client_secret(
        &self,
        client_id: &str,
        secret_fingerprint: String,
    ) -> AppResult<OAuth2Client> {
        let existing = self.find_client_model(client_id).await?;
        let now = Utc::now();

        let mut model: ActiveModel = existing.into();
        model.secret_fingerprint = Set(secret_fingerprint);
        model.secret_rotated_at = Set(Some(now));
        model.updated_at = Set(now);

        let updated = model.update(self.connection()).await?;
        Ok(updated.into())
    }

    /// Stamp `last_used_at` after a successful token grant.
    pub async fn touch_client_last_used(&self, client_id: &str) -> AppResult<bool> {
        let result = ClientEntity::update_many()
            .col_expr(client::Column::LastUsedAt, Expr::value(Utc::now()))
            .filter(client::Column::ClientId.eq(client_id))
            .exec(self.connection())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Remove the local row.
    pub async fn delete_client(&self, client_id: &str) -> AppResult<()> {
        let result = ClientEntity::delete_many()
            .filter(client::Column::ClientId.eq(client_id))
            .exec(self.connection())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("OAuth2 client {}", client_id)));
        }
        Ok(())
    }

    /// Append an audit entry.
    pub async fn insert_client_audit(
        &self,
        client_id: &str,
        actor_id: Option<Uuid>,
        action: ClientAuditAction,
        detail: Option<serde_json::Value>,
    ) -> AppResult<()> {
        let model = audit::ActiveModel {
            id: Set(Uuid::now_v7()),
            client_id: Set(client_id.to_string()),
            actor_id: Set(actor_id),
            action: Set(action.as_str().to_string()),
            detail: Set(detail),
            created_at: Set(Utc::now()),
        };

        AuditEntity::insert(model)
            .exec_without_returning(self.connection())
            .await?;
        Ok(())
    }

    /// Audit entries for a client, oldest first.
    pub async fn list_client_audit(&self, client_id: &str) -> AppResult<Vec<ClientAuditEntry>> {
        let rows = AuditEntity::find()
            .filter(audit::Column::ClientId.eq(client_id))
            .order_by_asc(audit::Column::CreatedAt)
            .order_by_asc(audit::Column::Id)
            .all(self.connection())
            .await?;
        Ok(rows.into_iter().map(ClientAuditEntry::from).collect())
    }

    async fn find_client_model(&self, client_id: &str) -> AppResult<client::Model> {
        ClientEntity::find()
            .filter(client::Column::ClientId.eq(client_id))
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("OAuth2 client {}", client_id)))
    }
}
