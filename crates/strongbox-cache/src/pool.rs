//! SQLite pool holding one device's account, tree and chunks
//!
//! The database lives at [`StorageConfig::database_path`]. Opening it applies
//! the schema and records its version in `sync_state`; a database written by
//! a newer schema is refused rather than silently downgraded.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use strongbox_core::config::StorageConfig;
use tracing::{debug, info};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20261018_initial.sql");
const SCHEMA_VERSION: i64 = 1;

/// Connections to the local state database
///
/// File databases use WAL so readers never block the single writer. The
/// in-memory database has exactly one connection, kept forever, because
/// SQLite drops an in-memory database with its last connection.
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database under `storage.data_dir`, creating it if needed
    pub async fn open(storage: &StorageConfig) -> Result<Self, CacheError> {
        Self::new(&storage.database_path()).await
    }

    /// Opens or creates the database file at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot open {}: {e}", db_path.display()))
            })?;

        let pool = Self::prepared(pool).await?;
        info!(path = %db_path.display(), "Local database opened");
        Ok(pool)
    }

    /// A private database that disappears with the pool
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {e}")))?;
        Self::prepared(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema version recorded in the database
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        let stored: Option<(String,)> =
            sqlx::query_as("SELECT value FROM sync_state WHERE key = 'schema_version'")
                .fetch_optional(&self.pool)
                .await?;
        stored
            .map(|(v,)| v.parse::<i64>())
            .transpose()
            .map_err(|e| CacheError::MigrationFailed(format!("unreadable schema version: {e}")))
            .map(|v| v.unwrap_or(0))
    }

    async fn prepared(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("applying schema: {e}")))?;

        let db = Self { pool };
        let found = db.schema_version().await?;
        if found > SCHEMA_VERSION {
            return Err(CacheError::MigrationFailed(format!(
                "database schema {found} is newer than this build ({SCHEMA_VERSION})"
            )));
        }
        if found < SCHEMA_VERSION {
            sqlx::query(
                "INSERT INTO sync_state (key, value) VALUES ('schema_version', ?)
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            )
            .bind(SCHEMA_VERSION.to_string())
            .execute(&db.pool)
            .await?;
            debug!(from = found, to = SCHEMA_VERSION, "Schema version recorded");
        }
        Ok(db)
    }
}
