//! OAuth2 provider adapter.
//!
//! Admin API: `/admin/clients[/{id}]` for the client lifecycle and
//! `/admin/oauth2/introspect` for token validation. Public API:
//! `/oauth2/token` for the client-credentials grant.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::ProviderError;
use super::identity::check_status;
use crate::config::OAuth2Settings;
use crate::error::{AppError, AppResult};
use crate::models::{IntrospectionResponse, TokenResponse};

/// HTTP connect timeout for OAuth2 provider calls.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP total timeout for OAuth2 provider calls.
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Client registration sent to the provider.
#[derive(Debug, Serialize)]
struct ClientRegistration<'a> {
    client_name: &'a str,
    client_secret: &'a str,
    grant_types: [&'static str; 1],
    response_types: [&'static str; 1],
    scope: &'a str,
    token_endpoint_auth_method: &'static str,
    metadata: ClientMetadata,
}

#[derive(Debug, Serialize)]
struct ClientMetadata {
    organization_id: Uuid,
    owner_id: Uuid,
}

/// Registration as echoed by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredClient {
    pub client_id: String,
    /// Present on create responses only
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Client for the OAuth2 provider.
#[derive(Clone)]
pub struct OAuth2ProviderClient {
    public_url: String,
    admin_url: String,
    http_client: reqwest::Client,
}

impl OAuth2ProviderClient {
    pub fn new(settings: &OAuth2Settings) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::Internal(format!("Failed to build OAuth2 provider client: {}", e))
            })?;

        info!(
            "OAuth2 provider client initialized (public={}, admin={})",
            settings.public_url, settings.admin_url
        );

        Ok(Self {
            public_url: settings.public_url.trim_end_matches('/').to_string(),
            admin_url: settings.admin_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn client_url(&self, client_id: &str) -> String {
        format!(
            "{}/admin/clients/{}",
            self.admin_url,
            urlencoding::encode(client_id)
        )
    }

    /// Register a client-credentials client with the given secret.
    pub async fn create_client(
        &self,
        name: &str,
        scope: &str,
        secret: &SecretString,
        organization_id: Uuid,
        owner_id: Uuid,
    ) -> Result<RegisteredClient, ProviderError> {
        let registration = ClientRegistration {
            client_name: name,
            client_secret: secret.expose_secret(),
            grant_types: [CLIENT_CREDENTIALS_GRANT],
            response_types: ["token"],
            scope,
            token_endpoint_auth_method: "client_secret_basic",
            metadata: ClientMetadata {
                organization_id,
                owner_id,
            },
        };

        let response = self
            .http_client
            .post(format!("{}/admin/clients", self.admin_url))
            .json(&registration)
            .send()
            .await
            .map_err(ProviderError::transport)?;
        let response = check_status(response).await?;

        let registered: RegisteredClient = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("malformed client payload: {}", e)))?;

        debug!("Provider registered client {}", registered.client_id);
        Ok(registered)
    }

    /// Replace a client's secret.
    ///
    /// The provider's update is a full replacement, so the current document
    /// is fetched and sent back with only the secret changed.
    pub async fn set_client_secret(
        &self,
        client_id: &str,
        secret: &SecretString,
    ) -> Result<(), ProviderError> {
        let url = self.client_url(client_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ProviderError::transport)?;
        let response = check_status(response).await?;
        let mut document: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("malformed client payload: {}", e)))?;

        let Some(fields) = document.as_object_mut() else {
            return Err(ProviderError::Unavailable(
                "client payload is not an object".to_string(),
            ));
        };
        fields.insert(
            "client_secret".to_string(),
            serde_json::Value::String(secret.expose_secret().to_string()),
        );

        let response = self
            .http_client
            .put(&url)
            .json(&document)
            .send()
            .await
            .map_err(ProviderError::transport)?;
        check_status(response).await?;
        Ok(())
    }

    /// Delete a client. A missing client is reported as [`ProviderError::NotFound`].
    pub async fn delete_client(&self, client_id: &str) -> Result<(), ProviderError> {
        let response = self
            .http_client
            .delete(self.client_url(client_id))
            .send()
            .await
            .map_err(ProviderError::transport)?;
        check_status(response).await?;
        Ok(())
    }

    /// Run the client-credentials grant against the public token endpoint.
    pub async fn issue_token(
        &self,
        client_id: &str,
        client_secret: &SecretString,
        scope: Option<&str>,
    ) -> Result<TokenResponse, ProviderError> {
        let mut form = vec![("grant_type", CLIENT_CREDENTIALS_GRANT)];
        if let Some(scope) = scope.filter(|s| !s.is_empty()) {
            form.push(("scope", scope));
        }

        let response = self
            .http_client
            .post(format!("{}/oauth2/token", self.public_url))
            .basic_auth(client_id, Some(client_secret.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(ProviderError::transport)?;

        // invalid_client / invalid_scope come back as 400
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected(body.chars().take(200).collect()));
        }
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("malformed token payload: {}", e)))
    }

    /// Introspect an access token.
    pub async fn introspect(
        &self,
        token: &SecretString,
        scope: Option<&str>,
    ) -> Result<IntrospectionResponse, ProviderError> {
        let mut form = vec![("token", token.expose_secret())];
        if let Some(scope) = scope.filter(|s| !s.is_empty()) {
            form.push(("scope", scope));
        }

        let response = self
            .http_client
            .post(format!("{}/admin/oauth2/introspect", self.admin_url))
            .form(&form)
            .send()
            .await
            .map_err(ProviderError::transport)?;
        let response = check_status(response).await?;

        response.json().await.map_err(|e| {
            ProviderError::Unavailable(format!("malformed introspection payload: {}", e))
        })
    }
}
