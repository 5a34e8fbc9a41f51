//! OAuth2 client lifecycle across the provider and the local mirror.
//!
//! Every mutation touches both sides. When the second step fails the first
//! is undone where possible, and a failed undo is reported together with
//! the original error.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{OAuth2ProviderClient, ProviderError};
use crate::db::DbPool;
use crate::db::oauth2_clients::NewClient;
use crate::error::{AppError, AppResult};
use crate::models::oauth2_client::{generate_secret, normalize_scope, secret_fingerprint};
use crate::models::{
    ClientAuditAction, ClientAuditEntry, ClientSecretResponse, CreateClientRequest,
    IntrospectionResponse, OAuth2Client, TokenRequest, TokenResponse, ValidateTokenRequest,
};

/// Coordinates client operations between [`DbPool`] and [`OAuth2ProviderClient`].
#[derive(Clone)]
pub struct ClientManager {
    pool: DbPool,
    provider: OAuth2ProviderClient,
}

impl ClientManager {
    pub fn new(pool: DbPool, provider: OAuth2ProviderClient) -> Self {
        Self { pool, provider }
    }

    /// Register a client for an organization the actor administers.
    ///
    /// Provider first, then the local row. If the local insert fails the
    /// provider-side client is deleted again.
    pub async fn create(
        &self,
        actor: Uuid,
        req: CreateClientRequest,
    ) -> AppResult<ClientSecretResponse> {
        let (name, scope) = req.validate().map_err(AppError::InvalidInput)?;

        let membership = self
            .pool
            .find_membership(req.organization_id, actor)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Organization {}", req.organization_id)))?;
        if !membership.role.can_manage() {
            return Err(AppError::Forbidden(
                "admin or owner role required to create OAuth2 clients".to_string(),
            ));
        }

        let secret = SecretString::from(generate_secret());
        let registered = self
            .provider
            .create_client(&name, &scope, &secret, req.organization_id, actor)
            .await?;
        let secret = match registered.client_secret {
            Some(ref issued) if !issued.is_empty() => SecretString::from(issued.clone()),
            _ => secret,
        };

        let inserted = self
            .pool
            .insert_client(NewClient {
                client_id: registered.client_id.clone(),
                name,
                description: req.description.map(|d| d.trim().to_string()),
                scope,
                owner_id: actor,
                organization_id: req.organization_id,
                secret_fingerprint: secret_fingerprint(secret.expose_secret()),
            })
            .await;

        let client = match inserted {
            Ok(client) => client,
            Err(local_err) => {
                return Err(self
                    .compensate_remote_create(&registered.client_id, local_err)
                    .await);
            }
        };

        self.audit(
            &client.client_id,
            Some(actor),
            ClientAuditAction::Created,
            Some(json!({ "organization_id": client.organization_id, "scope": client.scope })),
        )
        .await;
        info!(
            "OAuth2 client {} created by {} for organization {}",
            client.client_id, actor, client.organization_id
        );

        Ok(ClientSecretResponse {
            client_id: client.client_id,
            client_secret: secret.expose_secret().to_string(),
            name: client.name,
            scope: client.scope,
            organization_id: client.organization_id,
            created_at: client.created_at,
        })
    }

    async fn compensate_remote_create(&self, client_id: &str, local_err: AppError) -> AppError {
        match self.provider.delete_client(client_id).await {
            Ok(()) | Err(ProviderError::NotFound) => {
                warn!(
                    "Local insert for OAuth2 client {} failed, provider registration removed: {}",
                    client_id, local_err
                );
                local_err
            }
            Err(remote_err) => {
                error!(
                    "OAuth2 client {} is registered at the provider but has no local row: \
                     insert failed ({}), cleanup failed ({})",
                    client_id, local_err, remote_err
                );
                AppError::Internal(format!(
                    "local insert failed: {}; provider cleanup failed: {}",
                    local_err, remote_err
                ))
            }
        }
    }

    /// Clients the actor owns or administers through an organization.
    pub async fn list(&self, actor: Uuid) -> AppResult<Vec<OAuth2Client>> {
        let managed = self.pool.managed_organization_ids(actor).await?;
        self.pool.list_clients_visible_to(actor, &managed).await
    }

    /// A single client. Never includes the secret.
    pub async fn get(&self, actor: Uuid, client_id: &str) -> AppResult<OAuth2Client> {
        self.authorize(actor, client_id).await
    }

    /// Deactivate a client and remove it from the provider.
    ///
    /// If the provider call fails the local row is reactivated.
    pub async fn revoke(&self, actor: Uuid, client_id: &str) -> AppResult<OAuth2Client> {
        let client = self.authorize(actor, client_id).await?;
        if !client.is_active {
            return Ok(client);
        }

        let revoked = self.pool.set_client_active(client_id, false).await?;

        match self.provider.delete_client(client_id).await {
            Ok(()) | Err(ProviderError::NotFound) => {}
            Err(remote_err) => {
                return Err(self.reactivate_after(client_id, remote_err).await);
            }
        }

        self.audit(client_id, Some(actor), ClientAuditAction::Revoked, None)
            .await;
        info!("OAuth2 client {} revoked by {}", client_id, actor);
        Ok(revoked)
    }

    /// Remove a client from the provider and delete the local row.
    pub async fn delete(&self, actor: Uuid, client_id: &str) -> AppResult<()> {
        let client = self.authorize(actor, client_id).await?;

        if client.is_active {
            self.pool.set_client_active(client_id, false).await?;
        }

        match self.provider.delete_client(client_id).await {
            Ok(()) | Err(ProviderError::NotFound) => {}
            Err(remote_err) if client.is_active => {
                return Err(self.reactivate_after(client_id, remote_err).await);
            }
            Err(remote_err) => return Err(remote_err.into()),
        }

        self.pool.delete_client(client_id).await?;
        self.audit(client_id, Some(actor), ClientAuditAction::Deleted, None)
            .await;
        info!("OAuth2 client {} deleted by {}", client_id, actor);
        Ok(())
    }

    async fn reactivate_after(&self, client_id: &str, remote_err: ProviderError) -> AppError {
        match self.pool.set_client_active(client_id, true).await {
            Ok(_) => {
                warn!(
                    "Provider delete for OAuth2 client {} failed, local row reactivated: {}",
                    client_id, remote_err
                );
                remote_err.into()
            }
            Err(local_err) => {
                error!(
                    "OAuth2 client {} is inactive locally but still registered at the provider: \
                     delete failed ({}), reactivation failed ({})",
                    client_id, remote_err, local_err
                );
                AppError::Internal(format!(
                    "provider delete failed: {}; local reactivation failed: {}",
                    remote_err, local_err
                ))
            }
        }
    }

    /// Issue a fresh secret for an active client. The secret is returned once.
    pub async fn regenerate_secret(
        &self,
        actor: Uuid,
        client_id: &str,
    ) -> AppResult<ClientSecretResponse> {
        let client = self.authorize(actor, client_id).await?;
        if !client.is_active {
            return Err(AppError::Conflict(format!(
                "OAuth2 client {} is revoked",
                client_id
            )));
        }

        let secret = SecretString::from(generate_secret());
        self.provider.set_client_secret(client_id, &secret).await?;

        let fingerprint = secret_fingerprint(secret.expose_secret());
        let updated = match self
            .pool
            .update_client_secret(client_id, fingerprint.clone())
            .await
        {
            Ok(updated) => updated,
            Err(local_err) => {
                return Err(self
                    .record_unmirrored_rotation(client_id, actor, fingerprint, local_err)
                    .await);
            }
        };

        self.audit(
            client_id,
            Some(actor),
            ClientAuditAction::SecretRegenerated,
            Some(json!({ "secret_fingerprint": updated.secret_fingerprint })),
        )
        .await;
        info!("OAuth2 client {} secret regenerated by {}", client_id, actor);

        Ok(ClientSecretResponse {
            client_id: updated.client_id,
            client_secret: secret.expose_secret().to_string(),
            name: updated.name,
            scope: updated.scope,
            organization_id: updated.organization_id,
            created_at: updated.created_at,
        })
    }

    /// The provider holds a new secret the local row does not describe.
    ///
    /// A rotation cannot be rolled back (the previous secret is never kept),
    /// so the new fingerprint goes into the audit log instead.
    async fn record_unmirrored_rotation(
        &self,
        client_id: &str,
        actor: Uuid,
        fingerprint: String,
        local_err: AppError,
    ) -> AppError {
        error!(
            "OAuth2 client {} secret rotated at the provider but the local fingerprint \
             was not updated: {}",
            client_id, local_err
        );

        let detail = json!({
            "secret_fingerprint": fingerprint,
            "local_update_failed": true,
            "error": local_err.to_string(),
        });
        match self
            .pool
            .insert_client_audit(
                client_id,
                Some(actor),
                ClientAuditAction::SecretRegenerated,
                Some(detail),
            )
            .await
        {
            Ok(()) => local_err,
            Err(audit_err) => {
                error!(
                    "OAuth2 client {} rotation is unrecorded locally: {}",
                    client_id, audit_err
                );
                AppError::Internal(format!(
                    "provider secret rotated; local update failed: {}; audit failed: {}",
                    local_err, audit_err
                ))
            }
        }
    }

    /// Audit log for a client the actor may manage, oldest first.
    pub async fn audit_log(
        &self,
        actor: Uuid,
        client_id: &str,
    ) -> AppResult<Vec<ClientAuditEntry>> {
        self.authorize(actor, client_id).await?;
        self.pool.list_client_audit(client_id).await
    }

    /// Proxy the client-credentials grant for a locally known, active client.
    pub async fn issue_token(&self, req: TokenRequest) -> AppResult<TokenResponse> {
        if let Some(ref grant) = req.grant_type
            && grant != "client_credentials"
        {
            return Err(AppError::InvalidInput(format!(
                "unsupported grant_type '{}'",
                grant
            )));
        }
        let scope = normalize_scope(req.scope.as_deref().unwrap_or(""))
            .map_err(AppError::InvalidInput)?;

        let client = self
            .pool
            .find_client(&req.client_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| AppError::Unauthenticated("unknown or revoked client".to_string()))?;

        let secret = SecretString::from(req.client_secret);
        let token = match self
            .provider
            .issue_token(&client.client_id, &secret, Some(scope.as_str()))
            .await
        {
            Ok(token) => token,
            Err(ProviderError::Rejected(reason)) => {
                warn!("Token request for client {} rejected: {}", client.client_id, reason);
                return Err(AppError::Unauthenticated(
                    "invalid client credentials".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        self.pool.touch_client_last_used(&client.client_id).await?;
        self.audit(
            &client.client_id,
            None,
            ClientAuditAction::TokenIssued,
            Some(json!({ "scope": token.scope })),
        )
        .await;

        Ok(token)
    }

    /// Proxy token introspection.
    pub async fn validate(&self, req: ValidateTokenRequest) -> AppResult<IntrospectionResponse> {
        if req.token.trim().is_empty() {
            return Err(AppError::InvalidInput("token is required".to_string()));
        }
        let token = SecretString::from(req.token);
        let result = self
            .provider
            .introspect(&token, req.scope.as_deref())
            .await?;
        Ok(result)
    }

    /// Load a client the actor may manage: its owner, or an admin/owner of
    /// its organization. Non-members get NotFound.
    async fn authorize(&self, actor: Uuid, client_id: &str) -> AppResult<OAuth2Client> {
        let client = self
            .pool
            .find_client(client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("OAuth2 client {}", client_id)))?;

        if client.owner_id == actor {
            return Ok(client);
        }

        match self
            .pool
            .find_membership(client.organization_id, actor)
            .await?
        {
            Some(m) if m.role.can_manage() => Ok(client),
            Some(_) => Err(AppError::Forbidden(
                "admin or owner role required to manage this client".to_string(),
            )),
            None => Err(AppError::NotFound(format!("OAuth2 client {}", client_id))),
        }
    }

    /// Audit writes never fail the operation they describe.
    async fn audit(
        &self,
        client_id: &str,
        actor: Option<Uuid>,
        action: ClientAuditAction,
        detail: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .pool
            .insert_client_audit(client_id, actor, action, detail)
            .await
        {
            warn!(
                "Failed to record audit '{}' for OAuth2 client {}: {}",
                action.as_str(),
                client_id,
                e
            );
        }
    }
}
