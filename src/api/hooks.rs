//! Identity provider webhooks.
//!
//! The provider calls these after its registration, login and verification
//! flows. Each call upserts the local user from the identity in the payload,
//! so any hook can create the row if an earlier one was missed.

use actix_web::{HttpResponse, web};
use tracing::{info, warn};

use crate::auth::WebhookAuth;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{HookAck, Identity, IdentityHookPayload, IdentityProfile, UpsertOutcome};

fn profile_from_identity(identity: &Identity) -> AppResult<IdentityProfile> {
    let email = identity
        .email()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            AppError::InvalidInput(format!("identity {} has no email address", identity.id))
        })?;

    Ok(IdentityProfile {
        id: identity.id,
        email: email.to_string(),
        first_name: identity.first_name().map(str::to_string),
        last_name: identity.last_name().map(str::to_string),
    })
}

fn ack(outcome: &UpsertOutcome) -> HookAck {
    HookAck {
        status: "ok".to_string(),
        user_id: outcome.user.id.to_string(),
        created: outcome.created,
    }
}

/// Create the local user after registration, running first-user bootstrap.
#[utoipa::path(
    post,
    path = "/hooks/after-registration",
    tag = "Hooks",
    request_body = IdentityHookPayload,
    responses(
        (status = 200, description = "User upserted", body = HookAck),
        (status = 400, description = "Identity has no email", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or wrong webhook secret", body = crate::error::ErrorResponse),
    ),
    security(("webhook_secret" = []))
)]
pub async fn after_registration(
    _auth: WebhookAuth,
    pool: web::Data<DbPool>,
    body: web::Json<IdentityHookPayload>,
) -> AppResult<HttpResponse> {
    let payload = body.into_inner();
    let profile = profile_from_identity(&payload.identity)?;

    let outcome = pool.upsert_user_from_identity(&profile).await?;
    if !outcome.created {
        warn!(
            "Registration hook for existing user {} (flow {:?}); profile refreshed",
            outcome.user.id, payload.flow_id
        );
    } else {
        info!(
            "Registered user {} (bootstrap owner: {}, flow {:?})",
            outcome.user.id, outcome.bootstrapped, payload.flow_id
        );
    }

    Ok(HttpResponse::Ok().json(ack(&outcome)))
}

/// Record a login and converge default organization membership.
#[utoipa::path(
    post,
    path = "/hooks/after-login",
    tag = "Hooks",
    request_body = IdentityHookPayload,
    responses(
        (status = 200, description = "Login recorded", body = HookAck),
        (status = 401, description = "Missing or wrong webhook secret", body = crate::error::ErrorResponse),
    ),
    security(("webhook_secret" = []))
)]
pub async fn after_login(
    _auth: WebhookAuth,
    pool: web::Data<DbPool>,
    body: web::Json<IdentityHookPayload>,
) -> AppResult<HttpResponse> {
    let payload = body.into_inner();
    let profile = profile_from_identity(&payload.identity)?;

    let outcome = pool.upsert_user_from_identity(&profile).await?;
    pool.record_login(outcome.user.id).await?;
    if !outcome.created && pool.ensure_default_membership(outcome.user.id).await? {
        info!(
            "User {} had no organizations and joined the default one on login",
            outcome.user.id
        );
    }

    Ok(HttpResponse::Ok().json(ack(&outcome)))
}

/// Refresh the local profile after the provider verified an address.
#[utoipa::path(
    post,
    path = "/hooks/after-verification",
    tag = "Hooks",
    request_body = IdentityHookPayload,
    responses(
        (status = 200, description = "User refreshed", body = HookAck),
        (status = 401, description = "Missing or wrong webhook secret", body = crate::error::ErrorResponse),
    ),
    security(("webhook_secret" = []))
)]
pub async fn after_verification(
    _auth: WebhookAuth,
    pool: web::Data<DbPool>,
    body: web::Json<IdentityHookPayload>,
) -> AppResult<HttpResponse> {
    let payload = body.into_inner();
    let profile = profile_from_identity(&payload.identity)?;

    let outcome = pool.upsert_user_from_identity(&profile).await?;
    info!(
        "Verification hook for user {} (verified email: {})",
        outcome.user.id,
        payload.identity.has_verified_email()
    );

    Ok(HttpResponse::Ok().json(ack(&outcome)))
}

/// Configure webhook routes (mounted under `/hooks`).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/after-registration").route(web::post().to(after_registration)))
        .service(web::resource("/after-login").route(web::post().to(after_login)))
        .service(web::resource("/after-verification").route(web::post().to(after_verification)));
}
