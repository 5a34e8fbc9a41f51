//! Migration: Create organization_members table.
//!
//! Composite primary key enforces one role per (user, organization).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE organization_members (
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                    role VARCHAR(20) NOT NULL DEFAULT 'member'
                        CHECK (role IN ('owner', 'admin', 'member')),
                    joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    PRIMARY KEY (user_id, organization_id)
                );

                -- Member listing ordered by join time
                CREATE INDEX idx_organization_members_org_joined
                    ON organization_members(organization_id, joined_at);

                CREATE TRIGGER update_organization_members_updated_at
                    BEFORE UPDATE ON organization_members
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TRIGGER IF EXISTS update_organization_members_updated_at ON organization_members;
                DROP TABLE IF EXISTS organization_members CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
