//! SQLite database adapters for the defier engine.

pub mod board_repository;
pub mod connection;
pub mod defy_repository;
pub mod membership_repository;
pub mod migrations;
pub mod participant_repository;

pub use board_repository::SqliteBoardRepository;
pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use defy_repository::SqliteDefyRepository;
pub use membership_repository::SqliteMembershipRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use participant_repository::{SqliteGroupRepository, SqliteParticipantRepository};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DatabaseConfig;

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse a JSON column.
pub fn parse_json<T: serde::de::DeserializeOwned>(s: &str) -> DomainResult<T> {
    serde_json::from_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Convert a stored INTEGER counter back to `u32`.
pub fn parse_counter(value: i64, column: &str) -> DomainResult<u32> {
    u32::try_from(value)
        .map_err(|_| DomainError::SerializationError(format!("{column} out of range: {value}")))
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(&config.url(), Some(PoolConfig::from(config))).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
