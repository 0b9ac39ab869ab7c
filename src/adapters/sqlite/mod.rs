//! SQLite persistence for job records.

pub mod connection;
pub mod job_state_repository;
pub mod migrations;

pub use connection::{
    create_pool, create_test_pool, database_url, verify_connection, ConnectionError, PoolConfig,
};
pub use job_state_repository::SqliteJobStateRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::DatabaseConfig;

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> IntegrationResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map_err(|e| IntegrationError::Storage(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Errors from [`initialize_database`].
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Opening the database failed.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// Migrating the schema failed.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// Open the configured database and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(&database_url(&config.path), &PoolConfig::from(config)).await?;
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await?;
    Ok(pool)
}
