//! Strongbox Cache - Local state persistence
//!
//! SQLite-based storage for:
//! - The account and sync cursor
//! - Base (last synced) and local (unpushed) file metadata
//! - The change log
//! - Encrypted chunks and document manifests
//!
//! ## Architecture
//!
//! This crate implements the `IMetadataStore` and `IContentStore` ports from
//! `strongbox-core` using SQLite as the storage backend. It is a driven
//! (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteMetadataStore`] - `IMetadataStore` implementation
//! - [`SqliteContentStore`] - `IContentStore` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use strongbox_core::config::StorageConfig;
//! use strongbox_cache::{DatabasePool, SqliteContentStore, SqliteMetadataStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::open(&StorageConfig::default()).await?;
//! let metadata = SqliteMetadataStore::new(pool.pool().clone());
//! let content = SqliteContentStore::new(pool.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod content_store;
pub mod metadata_store;
pub mod pool;

pub use content_store::SqliteContentStore;
pub use metadata_store::SqliteMetadataStore;
pub use pool::DatabasePool;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}
