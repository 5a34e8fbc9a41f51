//! Liveness and readiness probes.
//!
//! Both live outside `/api` and need no session.

use std::time::Instant;

use actix_web::{HttpResponse, get, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::error::ErrorResponse;

/// Liveness payload.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    checked_at: DateTime<Utc>,
}

/// Readiness payload.
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    status: &'static str,
    database: &'static str,
    /// Round-trip time of the database ping
    database_latency_ms: u64,
}

/// Liveness probe. Never touches the database or the providers.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        checked_at: Utc::now(),
    })
}

/// Readiness probe: 200 once the database answers a ping.
///
/// Provider reachability is not part of readiness; session checks already
/// degrade to 401 when the identity provider is down.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Database reachable", body = ReadyResponse),
        (status = 503, description = "Database unreachable", body = ErrorResponse)
    )
)]
#[get("/ready")]
pub async fn ready(pool: web::Data<DbPool>) -> HttpResponse {
    let started = Instant::now();

    match pool.ping().await {
        Ok(()) => HttpResponse::Ok().json(ReadyResponse {
            status: "ready",
            database: "connected",
            database_latency_ms: started.elapsed().as_millis() as u64,
        }),
        Err(e) => {
            tracing::warn!("Readiness probe failed: {}", e);
            HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error: "NOT_READY".to_string(),
                code: None,
                message: "Database is unreachable".to_string(),
            })
        }
    }
}

/// Register both probes at the application root.
pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready);
}
