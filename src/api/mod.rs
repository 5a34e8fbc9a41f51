//! API endpoint modules.

pub mod health;
pub mod hooks;
pub mod oauth2_clients;
pub mod openapi;
pub mod organizations;
pub mod users;
pub mod whoami;

pub use health::configure_health_routes;
pub use hooks::configure_routes as configure_hook_routes;
pub use oauth2_clients::configure_routes as configure_oauth2_routes;
pub use oauth2_clients::configure_token_routes as configure_oauth2_token_routes;
pub use openapi::ApiDoc;
pub use organizations::configure_routes as configure_organization_routes;
pub use users::configure_routes as configure_user_routes;
pub use whoami::configure_routes as configure_whoami_routes;

use actix_web::middleware::from_fn;
use actix_web::web;

use crate::auth::require_verified_session;

/// Mount every route group: probes at the root, the JSON API under `/api`
/// and identity provider webhooks under `/hooks`.
///
/// Inside `/api` the public token routes and whoami are registered first;
/// everything else falls through to the verification-gated scope, so the
/// session is settled before any path or body is parsed.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_health_routes)
        .service(
            web::scope("/api")
                .configure(configure_oauth2_token_routes)
                .configure(configure_whoami_routes)
                .service(
                    web::scope("")
                        .wrap(from_fn(require_verified_session))
                        .configure(configure_user_routes)
                        .configure(configure_organization_routes)
                        .configure(configure_oauth2_routes),
                ),
        )
        .service(web::scope("/hooks").configure(configure_hook_routes));
}
