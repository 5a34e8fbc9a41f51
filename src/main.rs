//! Orgdesk server - main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::io;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use orgdesk_lib::api::{self, ApiDoc};
use orgdesk_lib::auth::{SessionResolver, VerificationPolicy, WebhookSecret};
use orgdesk_lib::config::Config;
use orgdesk_lib::db::DbPool;
use orgdesk_lib::middleware::RequestLogger;
use orgdesk_lib::services::{ClientManager, IdentityClient, OAuth2ProviderClient};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::other(format!("{}: {}", context, err))
}

/// Check configuration only (for container health checks).
fn health_check() -> bool {
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| io::Error::other(format!("Failed to set tracing subscriber: {}", e)))?;

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL, provider URLs and ORGD_WEBHOOK_SECRET must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Orgdesk Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }
    if config.webhook_secret.is_none() {
        warn!("No webhook secret configured; /hooks/* accepts unauthenticated calls");
    }

    let pool = DbPool::new(&config)
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;

    pool.run_migrations()
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;
    info!("Database migrations complete");

    let identity = IdentityClient::new(&config.identity)
        .map_err(|e| startup_error("Failed to build identity client", e))?;
    let oauth2 = OAuth2ProviderClient::new(&config.oauth2)
        .map_err(|e| startup_error("Failed to build OAuth2 client", e))?;
    info!(
        "Identity provider: {} (admin {}), OAuth2 provider: {} (admin {})",
        config.identity.public_url,
        config.identity.admin_url,
        config.oauth2.public_url,
        config.oauth2.admin_url
    );

    let resolver = web::Data::new(SessionResolver::new(identity.clone()));
    let policy = web::Data::new(VerificationPolicy::new(pool.clone(), identity));
    let clients = web::Data::new(ClientManager::new(pool.clone(), oauth2));
    let webhook_secret = web::Data::new(WebhookSecret::new(config.webhook_secret.clone()));
    let pool_data = web::Data::new(pool);

    let bind_address = config.bind_address();
    let cookie_name = config.identity.session_cookie.clone();
    let allowed_origins = config.cors_allowed_origins.clone();
    let openapi = ApiDoc::openapi();

    let worker_count = if config.is_development() {
        4
    } else {
        num_cpus::get()
    };
    info!(
        "Starting server at http://{} ({} workers)",
        bind_address, worker_count
    );

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
                header::HeaderName::from_static("x-session-token"),
            ])
            .supports_credentials()
            .max_age(3600);
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(RequestLogger::new(&cookie_name))
            .app_data(pool_data.clone())
            .app_data(resolver.clone())
            .app_data(policy.clone())
            .app_data(clients.clone())
            .app_data(webhook_secret.clone())
            // Registered ahead of the /api scope, which would otherwise claim /api/docs
            .service(
                SwaggerUi::new("/api/docs/{_:.*}").url("/api/docs/openapi.json", openapi.clone()),
            )
            .configure(api::configure_app)
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
