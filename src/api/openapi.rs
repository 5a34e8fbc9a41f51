//! OpenAPI documentation configuration.

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};

use crate::config::{WEBHOOK_SECRET_HEADER, defaults};
use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Orgdesk Server",
        version = "0.1.0",
        description = "User and organization management on top of an external identity provider, with machine-to-machine OAuth2 clients"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Session
        api::whoami::whoami,
        // Users
        api::users::list_users,
        api::users::get_me,
        api::users::update_me,
        api::users::get_user,
        // Organizations
        api::organizations::list_organizations,
        api::organizations::create_organization,
        api::organizations::get_organization,
        api::organizations::update_organization,
        api::organizations::delete_organization,
        api::organizations::list_members,
        api::organizations::add_member,
        api::organizations::update_member,
        api::organizations::remove_member,
        // OAuth2
        api::oauth2_clients::create_client,
        api::oauth2_clients::list_clients,
        api::oauth2_clients::get_client,
        api::oauth2_clients::delete_client,
        api::oauth2_clients::regenerate_secret,
        api::oauth2_clients::client_audit,
        api::oauth2_clients::issue_token,
        api::oauth2_clients::validate_token,
        // Hooks
        api::hooks::after_registration,
        api::hooks::after_login,
        api::hooks::after_verification,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Identity
            models::Session,
            models::Identity,
            models::VerifiableAddress,
            models::WhoamiResponse,
            // Users
            models::User,
            models::UserListResponse,
            models::UpdateProfileRequest,
            // Organizations
            models::OrgType,
            models::Organization,
            models::OrganizationSummary,
            models::OrganizationListResponse,
            models::CreateOrganizationRequest,
            models::UpdateOrganizationRequest,
            // Members
            models::MemberRole,
            models::Membership,
            models::MemberResponse,
            models::MemberListResponse,
            models::AddMemberRequest,
            models::UpdateMemberRoleRequest,
            // OAuth2
            models::OAuth2Client,
            models::ClientListResponse,
            models::ClientSecretResponse,
            models::ClientAuditEntry,
            models::ClientAuditResponse,
            models::CreateClientRequest,
            models::TokenRequest,
            models::TokenResponse,
            models::ValidateTokenRequest,
            models::IntrospectionResponse,
            // Hooks
            models::IdentityHookPayload,
            models::HookAck,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Session", description = "Current session introspection"),
        (name = "Users", description = "Local user records and profiles"),
        (name = "Organizations", description = "Organizations and their members"),
        (name = "OAuth2 Clients", description = "Machine-to-machine client management"),
        (name = "OAuth2 Tokens", description = "Client-credentials token issuance and introspection"),
        (name = "Hooks", description = "Identity provider webhooks")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add session and webhook security schemes.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    defaults::DEV_SESSION_COOKIE,
                ))),
            );
            components.add_security_scheme(
                "webhook_secret",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(WEBHOOK_SECRET_HEADER))),
            );
        }
    }
}
