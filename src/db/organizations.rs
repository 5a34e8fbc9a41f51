//! Database queries for organizations.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::DbPool;
use super::bootstrap;
use crate::entity::oauth2_client::{self, Entity as ClientEntity};
use crate::entity::organization::{self, ActiveModel, Entity as OrganizationEntity};
use crate::entity::organization_member::{self as member, Entity as MemberEntity};
use crate::error::{AppError, AppResult};
use crate::models::{
    MemberRole, NewOrganization, Organization, OrganizationChanges, OrganizationSummary,
};

impl DbPool {
    /// Insert an organization and link the creator as owner in one transaction.
    pub async fn create_organization(
        &self,
        creator_id: Uuid,
        new_org: NewOrganization,
    ) -> AppResult<Organization> {
        let txn = self.connection().begin().await?;

        if let Some(parent_id) = new_org.parent_id
            && OrganizationEntity::find_by_id(parent_id)
                .one(&txn)
                .await?
                .is_none()
        {
            return Err(AppError::InvalidInput(format!(
                "Parent organization {} does not exist",
                parent_id
            )));
        }

        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            parent_id: Set(new_org.parent_id),
            org_type: Set(new_org.org_type.as_str().to_string()),
            name: Set(new_org.name.clone()),
            description: Set(new_org.description),
            owner_id: Set(creator_id),
            is_default: Set(false),
            attributes: Set(serde_json::Value::Object(new_org.attributes)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = model.insert(&txn).await.map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("Organization name '{}' is taken", new_org.name))
            }
            other => other,
        })?;

        bootstrap::upsert_link(&txn, creator_id, inserted.id, MemberRole::Owner, true).await?;
        txn.commit().await?;

        Ok(inserted.into())
    }

    /// Get an organization by ID.
    pub async fn get_organization(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let result = OrganizationEntity::find_by_id(id)
            .one(self.connection())
            .await?;
        Ok(result.map(Organization::from))
    }

    /// Organizations the user belongs to, newest first, with the user's role
    /// and each organization's member count.
    pub async fn list_organizations_for_user(
        &self,
        user_id: Uuid,
    ) -> AppResult<Vec<OrganizationSummary>> {
        let rows = MemberEntity::find()
            .filter(member::Column::UserId.eq(user_id))
            .find_also_related(OrganizationEntity)
            .order_by_desc(organization::Column::CreatedAt)
            .all(self.connection())
            .await?;

        let org_ids: Vec<Uuid> = rows.iter().map(|(m, _)| m.organization_id).collect();
        let counts = self.member_counts(&org_ids).await?;

        Ok(rows
            .into_iter()
            .filter_map(|(link, org)| {
                let org = org?;
                Some(OrganizationSummary {
                    member_count: counts.get(&org.id).copied().unwrap_or(0),
                    role: MemberRole::parse(&link.role).unwrap_or_default(),
                    organization: org.into(),
                })
            })
            .collect())
    }

    /// Summary of one organization as seen by a member.
    pub async fn organization_summary(
        &self,
        org: Organization,
        role: MemberRole,
    ) -> AppResult<OrganizationSummary> {
        let member_count = self.count_members(org.id).await?;
        Ok(OrganizationSummary {
            organization: org,
            role,
            member_count,
        })
    }

    /// Number of members in an organization.
    pub async fn count_members(&self, organization_id: Uuid) -> AppResult<u64> {
        let count = MemberEntity::find()
            .filter(member::Column::OrganizationId.eq(organization_id))
            .count(self.connection())
            .await?;
        Ok(count)
    }

    async fn member_counts(&self, org_ids: &[Uuid]) -> AppResult<HashMap<Uuid, u64>> {
        if org_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64)> = MemberEntity::find()
            .select_only()
            .column(member::Column::OrganizationId)
            .column_as(Expr::from(Func::count(Expr::col(member::Column::UserId))), "member_count")
            .filter(member::Column::OrganizationId.is_in(org_ids.to_vec()))
            .group_by(member::Column::OrganizationId)
            .into_tuple()
            .all(self.connection())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, count)| (id, count.max(0) as u64))
            .collect())
    }

    /// Apply validated changes to an organization.
    pub async fn update_organization(
        &self,
        id: Uuid,
        changes: OrganizationChanges,
    ) -> AppResult<Organization> {
        let existing = OrganizationEntity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Organization {}", id)))?;

        let mut active: ActiveModel = existing.into();
        if let Some(ref name) = changes.name {
            active.name = Set(name.clone());
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description).filter(|d| !d.is_empty()));
        }
        if let Some(org_type) = changes.org_type {
            active.org_type = Set(org_type.as_str().to_string());
        }
        if let Some(attributes) = changes.attributes {
            active.attributes = Set(serde_json::Value::Object(attributes));
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(self.connection())
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict(format!(
                    "Organization name '{}' is taken",
                    changes.name.as_deref().unwrap_or_default()
                )),
                other => other,
            })?;

        Ok(updated.into())
    }

    /// Delete an organization. Memberships cascade.
    ///
    /// Refused while OAuth2 clients still belong to the organization, since
    /// removing their rows would orphan the provider-side clients.
    pub async fn delete_organization(&self, id: Uuid) -> AppResult<()> {
        let clients = ClientEntity::find()
            .filter(oauth2_client::Column::OrganizationId.eq(id))
            .count(self.connection())
            .await?;
        if clients > 0 {
            return Err(AppError::Conflict(format!(
                "Organization {} still has {} OAuth2 client(s); delete them first",
                id, clients
            )));
        }

        let result = OrganizationEntity::delete_by_id(id)
            .exec(self.connection())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Organization {}", id)));
        }
        Ok(())
    }
}
