//! Domain models for the organization server.

pub mod identity;
pub mod membership;
pub mod oauth2_client;
pub mod organization;
pub mod user;
pub mod webhook;

// Re-export commonly used types
pub use identity::{Identity, Session, VerifiableAddress};
pub use membership::{
    AddMemberRequest, MemberListResponse, MemberResponse, MemberRole, Membership,
    UpdateMemberRoleRequest,
};
pub use oauth2_client::{
    ClientAuditAction, ClientAuditEntry, ClientAuditResponse, ClientListResponse, ClientSecretResponse, CreateClientRequest,
    DeleteClientQuery, IntrospectionResponse, OAuth2Client, TokenRequest, TokenResponse,
    ValidateTokenRequest,
};
pub use organization::{
    CreateOrganizationRequest, NewOrganization, OrgType, Organization, OrganizationChanges,
    OrganizationListResponse, OrganizationSummary, UpdateOrganizationRequest,
};
pub use user::{
    IdentityProfile, UpdateProfileRequest, UpsertOutcome, User, UserListResponse,
    WhoamiResponse,
};
pub use webhook::{HookAck, IdentityHookPayload};
