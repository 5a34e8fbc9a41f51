//! Current session endpoint.

use actix_web::middleware::from_fn;
use actix_web::{HttpResponse, web};

use crate::auth::{AuthenticatedSession, VerificationPolicy, require_session};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::WhoamiResponse;

/// Describe the caller's session, verification state and local record.
///
/// Does not require a verified email; the `verified` field reports it.
#[utoipa::path(
    get,
    path = "/api/whoami",
    tag = "Session",
    responses(
        (status = 200, description = "Current session", body = WhoamiResponse),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse),
    ),
    security(
        ("session_token" = []),
        ("session_cookie" = [])
    )
)]
pub async fn whoami(
    auth: AuthenticatedSession,
    pool: web::Data<DbPool>,
    policy: web::Data<VerificationPolicy>,
) -> AppResult<HttpResponse> {
    let verified = policy.check(&auth.session.identity).await?;

    let user = pool.find_user(auth.user_id()).await?;
    let organizations = match user {
        Some(ref u) => pool.list_organizations_for_user(u.id).await?,
        None => Vec::new(),
    };

    Ok(HttpResponse::Ok().json(WhoamiResponse {
        identity_id: auth.session.identity.id,
        session_id: auth.session.id.clone(),
        email: auth.session.identity.email().map(str::to_string),
        verified,
        user,
        organizations,
    }))
}

/// Configure the whoami route. It sits behind the session gate only.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/whoami")
            .wrap(from_fn(require_session))
            .route(web::get().to(whoami)),
    );
}
