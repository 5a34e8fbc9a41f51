//! Migration: Create oauth2_clients and oauth2_client_audit tables.
//!
//! Local mirror of machine-to-machine clients registered with the OAuth2
//! provider. Secrets are never stored, only a short fingerprint.

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
                CREATE TABLE oauth2_clients (
                    id UUID PRIMARY KEY,
                    client_id VARCHAR(255) NOT NULL,
                    name VARCHAR(100) NOT NULL,
                    description TEXT,
                    scope TEXT NOT NULL DEFAULT '',
                    owner_id UUID NOT NULL REFERENCES users(id),
                    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    secret_fingerprint VARCHAR(16) NOT NULL,
                    last_used_at TIMESTAMPTZ,
                    secret_rotated_at TIMESTAMPTZ,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE UNIQUE INDEX idx_oauth2_clients_client_id ON oauth2_clients(client_id);

                CREATE INDEX idx_oauth2_clients_owner ON oauth2_clients(owner_id, created_at DESC);

                CREATE INDEX idx_oauth2_clients_organization
                    ON oauth2_clients(organization_id)
                    WHERE is_active;

                CREATE TRIGGER update_oauth2_clients_updated_at
                    BEFORE UPDATE ON oauth2_clients
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();

                -- Append-only audit log (survives hard deletes)
                CREATE TABLE oauth2_client_audit (
                    id UUID PRIMARY KEY,
                    client_id VARCHAR(255) NOT NULL,
                    actor_id UUID,
                    action VARCHAR(32) NOT NULL
                        CHECK (action IN ('created', 'secret_regenerated', 'revoked', 'deleted', 'token_issued')),
                    detail JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_oauth2_client_audit_client
                    ON oauth2_client_audit(client_id, created_at DESC);
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
                DROP TABLE IF EXISTS oauth2_client_audit CASCADE;
                DROP TRIGGER IF EXISTS update_oauth2_clients_updated_at ON oauth2_clients;
                DROP TABLE IF EXISTS oauth2_clients CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
