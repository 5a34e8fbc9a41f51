//! Organization and membership API handlers.

use actix_web::{HttpResponse, web};
use tracing::info;
use uuid::Uuid;

use crate::auth::VerifiedUser;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    AddMemberRequest, CreateOrganizationRequest, MemberListResponse, MemberRole, Membership,
    Organization, OrganizationListResponse, OrganizationSummary, UpdateMemberRoleRequest,
    UpdateOrganizationRequest,
};

/// Load an organization together with the caller's role in it.
///
/// Non-members get NotFound so organization ids do not leak.
async fn load_for_member(
    pool: &DbPool,
    organization_id: Uuid,
    user_id: Uuid,
) -> AppResult<(Organization, MemberRole)> {
    let not_found = || AppError::NotFound(format!("Organization {}", organization_id));

    let membership = pool
        .find_membership(organization_id, user_id)
        .await?
        .ok_or_else(not_found)?;
    let org = pool
        .get_organization(organization_id)
        .await?
        .ok_or_else(not_found)?;

    Ok((org, membership.role))
}

fn require_manager(role: MemberRole) -> AppResult<()> {
    if role.can_manage() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin or owner role required".to_string()))
    }
}

/// Check a role assignment on `target` made by a caller holding `caller_role`.
///
/// Only owners hand out or take away the owner role, and the organization's
/// recorded owner always keeps it.
fn check_role_change(
    org: &Organization,
    caller_role: MemberRole,
    target: Uuid,
    current: Option<MemberRole>,
    new_role: MemberRole,
) -> AppResult<()> {
    let touches_owner = new_role.is_owner() || current.is_some_and(|r| r.is_owner());
    if touches_owner && !caller_role.is_owner() {
        return Err(AppError::Forbidden(
            "only owners can grant or change the owner role".to_string(),
        ));
    }
    if target == org.owner_id && !new_role.is_owner() {
        return Err(AppError::Conflict(
            "the organization owner cannot be demoted".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Organizations
// ============================================================================

/// List organizations the caller belongs to.
#[utoipa::path(
    get,
    path = "/api/organizations",
    tag = "Organizations",
    responses(
        (status = 200, description = "Organizations, newest first", body = OrganizationListResponse),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Email not verified", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn list_organizations(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let organizations = pool.list_organizations_for_user(auth.user_id()).await?;
    Ok(HttpResponse::Ok().json(OrganizationListResponse { organizations }))
}

/// Create an organization. The caller becomes its owner.
#[utoipa::path(
    post,
    path = "/api/organizations",
    tag = "Organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationSummary),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not create organizations", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn create_organization(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    body: web::Json<CreateOrganizationRequest>,
) -> AppResult<HttpResponse> {
    let user = pool.find_user(auth.user_id()).await?;
    if !user.is_some_and(|u| u.can_create_organizations) {
        return Err(AppError::Forbidden(
            "organization creation is not permitted for this user".to_string(),
        ));
    }

    let new_org = body.into_inner().validate().map_err(AppError::InvalidInput)?;
    let org = pool.create_organization(auth.user_id(), new_org).await?;
    info!("Organization {} ({}) created by {}", org.id, org.name, auth.user_id());

    let summary = pool.organization_summary(org, MemberRole::Owner).await?;
    Ok(HttpResponse::Created().json(summary))
}

/// Get an organization the caller belongs to.
#[utoipa::path(
    get,
    path = "/api/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization", body = OrganizationSummary),
        (status = 404, description = "Not found or not a member", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn get_organization(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let (org, role) = load_for_member(&pool, path.into_inner(), auth.user_id()).await?;
    let summary = pool.organization_summary(org, role).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Update an organization. Requires admin or owner.
#[utoipa::path(
    put,
    path = "/api/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "Organization ID")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Updated organization", body = OrganizationSummary),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found or not a member", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn update_organization(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrganizationRequest>,
) -> AppResult<HttpResponse> {
    let (org, role) = load_for_member(&pool, path.into_inner(), auth.user_id()).await?;
    require_manager(role)?;

    let changes = body.into_inner().validate().map_err(AppError::InvalidInput)?;
    let updated = pool.update_organization(org.id, changes).await?;
    let summary = pool.organization_summary(updated, role).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Delete an organization. Requires owner; the default organization is kept.
#[utoipa::path(
    delete,
    path = "/api/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found or not a member", body = crate::error::ErrorResponse),
        (status = 409, description = "Default organization or clients remain", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn delete_organization(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let (org, role) = load_for_member(&pool, path.into_inner(), auth.user_id()).await?;
    if !role.is_owner() {
        return Err(AppError::Forbidden("owner role required".to_string()));
    }
    if org.is_default {
        return Err(AppError::Conflict(
            "the default organization cannot be deleted".to_string(),
        ));
    }

    pool.delete_organization(org.id).await?;
    info!("Organization {} deleted by {}", org.id, auth.user_id());
    Ok(HttpResponse::NoContent().finish())
}

// ============================================================================
// Members
// ============================================================================

/// List members in join order.
#[utoipa::path(
    get,
    path = "/api/organizations/{id}/members",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Members ordered by join time", body = MemberListResponse),
        (status = 404, description = "Not found or not a member", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn list_members(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let (org, _) = load_for_member(&pool, path.into_inner(), auth.user_id()).await?;
    let members = pool.list_members(org.id).await?;
    Ok(HttpResponse::Ok().json(MemberListResponse { members }))
}

/// Add a user to the organization, or change the role of an existing member.
#[utoipa::path(
    post,
    path = "/api/organizations/{id}/members",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Organization ID")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Membership created or updated", body = Membership),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "Organization or user not found", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn add_member(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<AddMemberRequest>,
) -> AppResult<HttpResponse> {
    let (org, caller_role) = load_for_member(&pool, path.into_inner(), auth.user_id()).await?;
    require_manager(caller_role)?;

    let req = body.into_inner();
    let target = match (req.user_id, req.email.as_deref()) {
        (Some(id), None) => pool.find_user(id).await?,
        (None, Some(email)) => pool.find_user_by_email(email).await?,
        _ => {
            return Err(AppError::InvalidInput(
                "exactly one of user_id or email is required".to_string(),
            ));
        }
    }
    .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    let role = req.role.unwrap_or_default();
    let current = pool
        .find_membership(org.id, target.id)
        .await?
        .map(|m| m.role);
    check_role_change(&org, caller_role, target.id, current, role)?;

    let membership = pool.add_member(org.id, target.id, role).await?;
    info!(
        "User {} added to organization {} as {} by {}",
        target.id,
        org.id,
        role,
        auth.user_id()
    );
    Ok(HttpResponse::Created().json(membership))
}

/// Change a member's role.
#[utoipa::path(
    put,
    path = "/api/organizations/{id}/members/{user_id}",
    tag = "Members",
    params(
        ("id" = Uuid, Path, description = "Organization ID"),
        ("user_id" = Uuid, Path, description = "Member user ID")
    ),
    request_body = UpdateMemberRoleRequest,
    responses(
        (status = 200, description = "Updated membership", body = Membership),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Organization owner cannot be demoted", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn update_member(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateMemberRoleRequest>,
) -> AppResult<HttpResponse> {
    let (organization_id, user_id) = path.into_inner();
    let (org, caller_role) = load_for_member(&pool, organization_id, auth.user_id()).await?;
    require_manager(caller_role)?;

    let current = pool
        .find_membership(org.id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {}", user_id)))?;
    let role = body.into_inner().role;
    check_role_change(&org, caller_role, user_id, Some(current.role), role)?;

    let membership = pool.update_member_role(org.id, user_id, role).await?;
    Ok(HttpResponse::Ok().json(membership))
}

/// Remove a member. Members may remove themselves; the recorded owner stays.
#[utoipa::path(
    delete,
    path = "/api/organizations/{id}/members/{user_id}",
    tag = "Members",
    params(
        ("id" = Uuid, Path, description = "Organization ID"),
        ("user_id" = Uuid, Path, description = "Member user ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Organization owner cannot be removed", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn remove_member(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    let (organization_id, user_id) = path.into_inner();
    let (org, caller_role) = load_for_member(&pool, organization_id, auth.user_id()).await?;

    if user_id == org.owner_id {
        return Err(AppError::Conflict(
            "the organization owner cannot be removed".to_string(),
        ));
    }

    let is_self = user_id == auth.user_id();
    if !is_self {
        require_manager(caller_role)?;
        let target = pool
            .find_membership(org.id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {}", user_id)))?;
        if target.role.is_owner() && !caller_role.is_owner() {
            return Err(AppError::Forbidden(
                "only owners can remove another owner".to_string(),
            ));
        }
    }

    pool.remove_member(org.id, user_id).await?;
    info!(
        "User {} removed from organization {} by {}",
        user_id,
        org.id,
        auth.user_id()
    );
    Ok(HttpResponse::NoContent().finish())
}

/// Configure organization and member routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/organizations")
            .route(web::get().to(list_organizations))
            .route(web::post().to(create_organization)),
    )
    .service(
        web::resource("/organizations/{id}")
            .route(web::get().to(get_organization))
            .route(web::put().to(update_organization))
            .route(web::delete().to(delete_organization)),
    )
    .service(
        web::resource("/organizations/{id}/members")
            .route(web::get().to(list_members))
            .route(web::post().to(add_member)),
    )
    .service(
        web::resource("/organizations/{id}/members/{user_id}")
            .route(web::put().to(update_member))
            .route(web::delete().to(remove_member)),
    );
}
