//! Migration: Create organizations table.
//!
//! The partial unique index on `is_default` guarantees a single default
//! organization even under concurrent first registrations.

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
                CREATE TABLE organizations (
                    id UUID PRIMARY KEY,
                    parent_id UUID REFERENCES organizations(id) ON DELETE SET NULL,
                    org_type VARCHAR(20) NOT NULL DEFAULT 'organization'
                        CHECK (org_type IN ('organization', 'tenant')),
                    name VARCHAR(255) NOT NULL,
                    description TEXT,
                    owner_id UUID NOT NULL REFERENCES users(id),
                    is_default BOOLEAN NOT NULL DEFAULT FALSE,
                    attributes JSONB NOT NULL DEFAULT '{}'::jsonb
                        CHECK (jsonb_typeof(attributes) = 'object'),

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE UNIQUE INDEX idx_organizations_name ON organizations(name);

                -- At most one default organization
                CREATE UNIQUE INDEX idx_organizations_single_default
                    ON organizations(is_default)
                    WHERE is_default;

                CREATE INDEX idx_organizations_parent_id ON organizations(parent_id)
                    WHERE parent_id IS NOT NULL;

                CREATE INDEX idx_organizations_created_at ON organizations(created_at DESC);

                CREATE TRIGGER update_organizations_updated_at
                    BEFORE UPDATE ON organizations
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
                DROP TRIGGER IF EXISTS update_organizations_updated_at ON organizations;
                DROP TABLE IF EXISTS organizations CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
