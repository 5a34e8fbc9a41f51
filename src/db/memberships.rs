//! Database queries for organization membership links.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::DbPool;
use super::bootstrap;
use crate::entity::organization_member::{self as member, ActiveModel, Entity as MemberEntity};
use crate::entity::user::Entity as UserEntity;
use crate::error::{AppError, AppResult};
use crate::models::{MemberResponse, MemberRole, Membership};

impl DbPool {
    /// Look up the link between a user and an organization.
    pub async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Membership>> {
        let result = MemberEntity::find_by_id((user_id, organization_id))
            .one(self.connection())
            .await?;
        Ok(result.map(Membership::from))
    }

    /// Organizations in which the user is an admin or owner.
    pub async fn managed_organization_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows = MemberEntity::find()
            .filter(member::Column::UserId.eq(user_id))
            .filter(
                member::Column::Role
                    .is_in([MemberRole::Owner.as_str(), MemberRole::Admin.as_str()]),
            )
            .all(self.connection())
            .await?;
        Ok(rows.into_iter().map(|m| m.organization_id).collect())
    }

    /// Members of an organization in join order.
    pub async fn list_members(&self, organization_id: Uuid) -> AppResult<Vec<MemberResponse>> {
        let rows = MemberEntity::find()
            .filter(member::Column::OrganizationId.eq(organization_id))
            .find_also_related(UserEntity)
            .order_by_asc(member::Column::JoinedAt)
            .order_by_asc(member::Column::UserId)
            .all(self.connection())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(link, user)| {
                let user = user?;
                Some(MemberResponse {
                    user_id: link.user_id,
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    role: MemberRole::parse(&link.role).unwrap_or_default(),
                    joined_at: link.joined_at,
                })
            })
            .collect())
    }

    /// Add a user to an organization. Re-adding an existing member replaces
    /// the role and keeps the original join time.
    pub async fn add_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> AppResult<Membership> {
        bootstrap::upsert_link(self.connection(), user_id, organization_id, role, true).await?;

        self.find_membership(organization_id, user_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to fetch membership after insert".to_string()))
    }

    /// Change the role of an existing member.
    pub async fn update_member_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> AppResult<Membership> {
        let existing = MemberEntity::find_by_id((user_id, organization_id))
            .one(self.connection())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "User {} is not a member of organization {}",
                    user_id, organization_id
                ))
            })?;

        let mut active: ActiveModel = existing.into();
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(Utc::now());

        let updated = active.update(self.connection()).await?;
        Ok(updated.into())
    }

    /// Remove a user from an organization.
    pub async fn remove_member(&self, organization_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = MemberEntity::delete_by_id((user_id, organization_id))
            .exec(self.connection())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "User {} is not a member of organization {}",
                user_id, organization_id
            )));
        }
        Ok(())
    }
}
