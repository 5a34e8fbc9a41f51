//! Database operations for users.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::info;
use uuid::Uuid;

use super::DbPool;
use super::bootstrap::{self, BootstrapOutcome};
use crate::entity::user::{self, Entity as UserEntity};
use crate::error::{AppError, AppResult};
use crate::models::user::{IdentityProfile, UpdateProfileRequest, UpsertOutcome, User};

/// Emails are stored trimmed and lowercased; the unique index is on LOWER(email).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl DbPool {
    /// Total number of local users.
    pub async fn count_users(&self) -> AppResult<u64> {
        let count = UserEntity::find().count(self.connection()).await?;
        Ok(count)
    }

    /// Find a user by id (the identity provider identity id).
    pub async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id).one(self.connection()).await?;
        Ok(result.map(User::from))
    }

    /// Find a user by email, case-insensitively.
    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(self.connection())
            .await?;
        Ok(result.map(User::from))
    }

    /// All users, newest first.
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = UserEntity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(self.connection())
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Create the local user for an identity, or refresh its profile fields.
    ///
    /// Creation runs the bootstrap step in the same transaction: the first
    /// user becomes owner of the default organization, later users join it
    /// as members. Calling this again for an existing identity never changes
    /// memberships. Only the insert path takes the bootstrap lock.
    pub async fn upsert_user_from_identity(
        &self,
        profile: &IdentityProfile,
    ) -> AppResult<UpsertOutcome> {
        let email = normalize_email(&profile.email);
        if email.is_empty() {
            return Err(AppError::InvalidInput(
                "identity has no email address".to_string(),
            ));
        }

        if let Some(m) = UserEntity::find_by_id(profile.id)
            .one(self.connection())
            .await?
        {
            let model = refresh_profile(self.connection(), m, profile, email).await?;
            return Ok(UpsertOutcome {
                user: model.into(),
                created: false,
                bootstrapped: false,
            });
        }

        let txn = self.connection().begin().await?;
        bootstrap::acquire_lock(&txn).await?;

        // A concurrent hook for the same identity may have won the lock
        if let Some(m) = UserEntity::find_by_id(profile.id).one(&txn).await? {
            let model = refresh_profile(&txn, m, profile, email).await?;
            txn.commit().await?;
            return Ok(UpsertOutcome {
                user: model.into(),
                created: false,
                bootstrapped: false,
            });
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(profile.id),
            email: Set(email),
            first_name: Set(profile.first_name.clone()),
            last_name: Set(profile.last_name.clone()),
            timezone: Set(None),
            locale: Set(None),
            theme: Set(None),
            can_create_organizations: Set(false),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model.insert(&txn).await?;

        let outcome = bootstrap::assign_initial_membership(&txn, &inserted).await?;

        // Re-read so the bootstrap grant is reflected in the returned user
        let fresh = UserEntity::find_by_id(profile.id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::Database("Failed to fetch newly inserted user".to_string()))?;
        txn.commit().await?;

        info!("Created user {} ({:?})", fresh.id, outcome);

        Ok(UpsertOutcome {
            user: fresh.into(),
            created: true,
            bootstrapped: matches!(outcome, BootstrapOutcome::Owner { .. }),
        })
    }

    /// Join a user who belongs to no organization to the default one.
    pub async fn ensure_default_membership(&self, user_id: Uuid) -> AppResult<bool> {
        bootstrap::ensure_default_membership(self.connection(), user_id).await
    }

    /// Stamp `last_login_at`. Returns false if the user does not exist.
    pub async fn record_login(&self, id: Uuid) -> AppResult<bool> {
        let now = Utc::now();
        let result = UserEntity::update_many()
            .col_expr(user::Column::LastLoginAt, Expr::value(now))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(id))
            .exec(self.connection())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Apply a validated profile update. Absent fields are left unchanged.
    pub async fn update_profile(&self, id: Uuid, req: &UpdateProfileRequest) -> AppResult<User> {
        let existing = UserEntity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

        let mut active: user::ActiveModel = existing.into();
        if let Some(ref v) = req.first_name {
            active.first_name = Set(non_empty(v));
        }
        if let Some(ref v) = req.last_name {
            active.last_name = Set(non_empty(v));
        }
        if let Some(ref v) = req.timezone {
            active.timezone = Set(non_empty(v));
        }
        if let Some(ref v) = req.locale {
            active.locale = Set(non_empty(v));
        }
        if let Some(ref v) = req.theme {
            active.theme = Set(non_empty(v));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(self.connection()).await?;
        Ok(updated.into())
    }
}

/// Copy identity-owned fields onto an existing user, writing only on change.
async fn refresh_profile<C: ConnectionTrait>(
    conn: &C,
    existing: user::Model,
    profile: &IdentityProfile,
    email: String,
) -> AppResult<user::Model> {
    let unchanged = existing.email == email
        && existing.first_name == profile.first_name
        && existing.last_name == profile.last_name;
    if unchanged {
        return Ok(existing);
    }

    let mut active: user::ActiveModel = existing.into();
    active.email = Set(email);
    active.first_name = Set(profile.first_name.clone());
    active.last_name = Set(profile.last_name.clone());
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// An empty string clears the field.
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
