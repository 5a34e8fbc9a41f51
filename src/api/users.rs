//! User API handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crate::auth::VerifiedUser;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{UpdateProfileRequest, User, UserListResponse};

/// List all users.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "All users, newest first", body = UserListResponse),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Email not verified", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn list_users(_auth: VerifiedUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let users = pool.list_users().await?;
    Ok(HttpResponse::Ok().json(UserListResponse { users }))
}

/// The caller's own user record.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Caller's user record", body = User),
        (status = 404, description = "No local user yet", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn get_me(auth: VerifiedUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let user = pool
        .find_user(auth.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", auth.user_id())))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Update the caller's profile and UI preferences.
#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "Users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "No local user yet", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn update_me(
    auth: VerifiedUser,
    pool: web::Data<DbPool>,
    body: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    req.validate().map_err(AppError::InvalidInput)?;

    let user = pool.update_profile(auth.user_id(), &req).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Get a user by ID.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(
        ("id" = Uuid, Path, description = "User ID (identity id)")
    ),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn get_user(
    _auth: VerifiedUser,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let user = pool
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Configure user routes. `/users/me` is registered before `/users/{id}`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/users").route(web::get().to(list_users)))
        .service(
            web::resource("/users/me")
                .route(web::get().to(get_me))
                .route(web::put().to(update_me)),
        )
        .service(web::resource("/users/{id}").route(web::get().to(get_user)));
}
