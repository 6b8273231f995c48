//! Persistence layer for the director.
//!
//! The [`Repository`] contract the planner and pollers read through, with a
//! Postgres implementation and an in-memory one.

mod error;
pub mod memory;
pub mod models;
mod postgres;
mod repository;

pub use error::DbError;
pub use memory::{MemoryRepository, NewInstance};
pub use models::{
    AppliedSpec, DeploymentRecord, InstanceAddress, InstanceRecord, InstanceState, VmRecord, VmRef,
};
pub use postgres::PgRepository;
pub use repository::Repository;

use std::path::PathBuf;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the director's store lives and how it is migrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Directory holding the SQL migrations applied in dev mode.
    pub migrations_dir: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/fleet".to_string(),
            max_connections: 10,
            migrations_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations")),
        }
    }
}

/// Connection pool to the director's store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    migrations_dir: PathBuf,
}

impl Database {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(max_connections = config.max_connections, "Connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        Ok(Self {
            pool,
            migrations_dir: config.migrations_dir.clone(),
        })
    }

    /// Apply pending migrations from the configured directory.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        info!(migrations_dir = %self.migrations_dir.display(), "Running database migrations");
        Migrator::new(self.migrations_dir.clone())
            .await
            .map_err(DbError::Migration)?
            .run(&self.pool)
            .await
            .map_err(DbError::Migration)
    }

    pub fn repository(&self) -> PgRepository {
        PgRepository::new(self.pool.clone())
    }
}
