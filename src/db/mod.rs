//! Database module providing connection management, migrations, and queries.
//!
//! Query methods are implemented on [`DbPool`] in the per-table submodules.

pub mod bootstrap;
pub mod memberships;
pub mod oauth2_clients;
pub mod organizations;
pub mod users;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::migration::Migrator;

/// Acquire timeout for a pooled connection; exhaustion surfaces as a request error.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect timeout per attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection pool wrapper.
///
/// `DatabaseConnection` is internally reference counted, so cloning is cheap.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Connect using configuration, retrying with a fixed backoff.
    ///
    /// This is the only automatic retry in the server: after
    /// `connect_retries` failed attempts the error is returned so the process
    /// can fail fast.
    pub async fn new(config: &Config) -> AppResult<Self> {
        let settings = &config.database;
        let attempts = settings.connect_retries.max(1);

        let mut last_error = None;
        for attempt in 1..=attempts {
            match Database::connect(Self::options(config)).await {
                Ok(conn) => {
                    info!(
                        "Database connected (attempt {}/{}, pool {}..{})",
                        attempt, attempts, settings.min_connections, settings.max_connections
                    );
                    return Ok(Self { conn });
                }
                Err(e) => {
                    warn!(
                        "Database connection attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(settings.connect_backoff).await;
                    }
                }
            }
        }

        Err(AppError::Database(format!(
            "Failed to connect after {} attempts: {}",
            attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Build a pool that connects on first use. Used by tests that never
    /// reach the database.
    pub async fn connect_lazy(url: &str) -> AppResult<Self> {
        let mut options = ConnectOptions::new(url.to_owned());
        options
            .connect_lazy(true)
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(500))
            .sqlx_logging(false);

        let conn = Database::connect(options).await?;
        Ok(Self { conn })
    }

    fn options(config: &Config) -> ConnectOptions {
        let settings = &config.database;
        let mut options = ConnectOptions::new(settings.url.clone());
        options
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .connect_timeout(CONNECT_TIMEOUT)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .sqlx_logging(config.is_development());
        options
    }

    /// Apply all pending migrations.
    pub async fn run_migrations(&self) -> AppResult<()> {
        Migrator::up(&self.conn, None).await?;
        Ok(())
    }

    /// Access the underlying connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Round-trip a trivial query (readiness probe).
    pub async fn ping(&self) -> AppResult<()> {
        self.conn.ping().await?;
        Ok(())
    }
}
