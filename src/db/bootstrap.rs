//! First-user bootstrap and default organization assignment.
//!
//! These functions are generic over [`ConnectionTrait`] so they run inside the
//! user-creation transaction. The advisory lock serializes concurrent first
//! registrations; the partial unique index on `organizations(is_default)`
//! backs it up at the schema level.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::info;
use uuid::Uuid;

use crate::entity::organization::{self, Entity as OrganizationEntity};
use crate::entity::organization_member::{self, Entity as MemberEntity};
use crate::entity::user::{self, Entity as UserEntity};
use crate::error::AppResult;
use crate::models::MemberRole;
use crate::models::organization::DEFAULT_ORGANIZATION_NAME;

/// Transaction-scoped advisory lock key for bootstrap serialization.
const BOOTSTRAP_LOCK_KEY: i64 = 0x6f72_6764_6573_6b01;

/// What the bootstrap step did for a newly created user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// First user: granted organization creation and made owner of the default org
    Owner { organization_id: Uuid },
    /// Later user: joined the default org as member
    Member { organization_id: Uuid },
    /// Later user, but no default organization exists
    Skipped,
}

/// Block until no other transaction is running the bootstrap step.
///
/// Released automatically at commit or rollback.
pub async fn acquire_lock<C: ConnectionTrait>(conn: &C) -> AppResult<()> {
    conn.execute_unprepared(&format!(
        "SELECT pg_advisory_xact_lock({})",
        BOOTSTRAP_LOCK_KEY
    ))
    .await?;
    Ok(())
}

/// Look up the default organization.
pub async fn find_default_organization<C: ConnectionTrait>(
    conn: &C,
) -> AppResult<Option<organization::Model>> {
    let result = OrganizationEntity::find()
        .filter(organization::Column::IsDefault.eq(true))
        .one(conn)
        .await?;
    Ok(result)
}

/// Run the bootstrap transition for a user inserted in the current transaction.
///
/// Must be called after [`acquire_lock`] so the user count is stable.
pub async fn assign_initial_membership<C: ConnectionTrait>(
    conn: &C,
    user: &user::Model,
) -> AppResult<BootstrapOutcome> {
    let user_count = UserEntity::find().count(conn).await?;

    if user_count <= 1 {
        let mut active: user::ActiveModel = user.clone().into();
        active.can_create_organizations = Set(true);
        active.update(conn).await?;

        let default_org = match find_default_organization(conn).await? {
            Some(org) => org,
            None => create_default_organization(conn, user.id).await?,
        };

        upsert_link(conn, user.id, default_org.id, MemberRole::Owner, true).await?;

        info!(
            "Bootstrap: user {} is the first user and owns default organization {}",
            user.id, default_org.id
        );
        return Ok(BootstrapOutcome::Owner {
            organization_id: default_org.id,
        });
    }

    match find_default_organization(conn).await? {
        Some(org) => {
            upsert_link(conn, user.id, org.id, MemberRole::Member, false).await?;
            Ok(BootstrapOutcome::Member {
                organization_id: org.id,
            })
        }
        None => Ok(BootstrapOutcome::Skipped),
    }
}

/// Join a user with no memberships at all to the default organization.
///
/// Idempotent: returns false without writing when the user already belongs
/// to any organization or no default organization exists.
pub async fn ensure_default_membership<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<bool> {
    let existing = MemberEntity::find()
        .filter(organization_member::Column::UserId.eq(user_id))
        .count(conn)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    let Some(org) = find_default_organization(conn).await? else {
        return Ok(false);
    };

    let inserted = upsert_link(conn, user_id, org.id, MemberRole::Member, false).await?;
    if inserted {
        info!(
            "Converged user {} into default organization {}",
            user_id, org.id
        );
    }
    Ok(inserted)
}

async fn create_default_organization<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
) -> AppResult<organization::Model> {
    let now = Utc::now();
    let model = organization::ActiveModel {
        id: Set(Uuid::now_v7()),
        parent_id: Set(None),
        org_type: Set(crate::models::OrgType::Organization.as_str().to_string()),
        name: Set(DEFAULT_ORGANIZATION_NAME.to_string()),
        description: Set(Some("Organization every user joins on registration".to_string())),
        owner_id: Set(owner_id),
        is_default: Set(true),
        attributes: Set(serde_json::json!({})),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(model.insert(conn).await?)
}

/// Insert a membership link.
///
/// With `overwrite_role` the role of an existing link is replaced; otherwise
/// an existing link is left untouched. Returns whether a row was written.
pub async fn upsert_link<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    organization_id: Uuid,
    role: MemberRole,
    overwrite_role: bool,
) -> AppResult<bool> {
    let now = Utc::now();
    let model = organization_member::ActiveModel {
        user_id: Set(user_id),
        organization_id: Set(organization_id),
        role: Set(role.as_str().to_string()),
        joined_at: Set(now),
        updated_at: Set(now),
    };

    let mut on_conflict = OnConflict::columns([
        organization_member::Column::UserId,
        organization_member::Column::OrganizationId,
    ]);
    if overwrite_role {
        on_conflict.update_columns([
            organization_member::Column::Role,
            organization_member::Column::UpdatedAt,
        ]);
    } else {
        on_conflict.do_nothing();
    }

    let rows = MemberEntity::insert(model)
        .on_conflict(on_conflict)
        .exec_without_returning(conn)
        .await?;

    Ok(rows > 0)
}
