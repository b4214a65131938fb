//! SQLite implementation of IMetadataStore
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                   |
//! |----------------|----------|--------------------------------------------|
//! | FileId         | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | Account        | TEXT     | serde_json serialization                   |
//! | ServerMeta     | TEXT     | serde_json, versions mirrored as INTEGER   |
//! | FileMetadata   | TEXT     | serde_json serialization                   |
//! | ChangeKind     | TEXT     | `.as_str()` / `FromStr`                    |
//! | PublicKeys     | TEXT     | serde_json serialization                   |
//! | u64 / i64      | INTEGER  | cast to i64                                |

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use strongbox_core::domain::{
    Account, ChangeKind, ChangeRecord, FileId, FileMetadata, ServerMeta, Username,
};
use strongbox_core::ports::{IMetadataStore, SyncCommit};
use strongbox_crypto::PublicKeys;

use crate::CacheError;

const KEY_ROOT: &str = "root";
const KEY_CURSOR: &str = "cursor";
const KEY_LAST_SYNCED: &str = "last_synced";

/// SQLite-based implementation of the metadata store port
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT value FROM sync_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<(), CacheError> {
        sqlx::query("INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, CacheError> {
    value.parse().map_err(|_| {
        CacheError::SerializationError(format!("Invalid value for '{}': {}", key, value))
    })
}

fn base_from_row(row: &SqliteRow) -> Result<ServerMeta, CacheError> {
    let data: String = row.get("data");
    Ok(serde_json::from_str(&data)?)
}

fn local_from_row(row: &SqliteRow) -> Result<FileMetadata, CacheError> {
    let data: String = row.get("data");
    Ok(serde_json::from_str(&data)?)
}

fn change_from_row(row: &SqliteRow) -> Result<ChangeRecord, CacheError> {
    let file_id_str: String = row.get("file_id");
    let kind_str: String = row.get("kind");
    let base_version: i64 = row.get("base_version");
    let timestamp: i64 = row.get("timestamp");

    let file_id = FileId::from_str(&file_id_str).map_err(|e| {
        CacheError::SerializationError(format!("Invalid FileId '{}': {}", file_id_str, e))
    })?;
    let kind = ChangeKind::from_str(&kind_str).map_err(CacheError::SerializationError)?;

    Ok(ChangeRecord {
        file_id,
        kind,
        base_version: base_version as u64,
        timestamp,
    })
}

async fn insert_change<'c, E>(executor: E, record: &ChangeRecord) -> Result<(), CacheError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO change_log (file_id, kind, base_version, timestamp) VALUES (?, ?, ?, ?)",
    )
    .bind(record.file_id.to_string())
    .bind(record.kind.as_str())
    .bind(record.base_version as i64)
    .bind(record.timestamp)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_local<'c, E>(executor: E, meta: &FileMetadata) -> Result<(), CacheError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    let data = serde_json::to_string(meta)?;
    sqlx::query("INSERT OR REPLACE INTO local_files (id, data) VALUES (?, ?)")
        .bind(meta.id.to_string())
        .bind(data)
        .execute(executor)
        .await?;
    Ok(())
}

// ============================================================================
// IMetadataStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IMetadataStore for SqliteMetadataStore {
    // --- Account ---

    async fn get_account(&self) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query("SELECT data FROM account WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let data: String = r.get("data");
                Ok(Some(serde_json::from_str(&data).map_err(CacheError::from)?))
            }
            None => Ok(None),
        }
    }

    async fn save_account(&self, account: &Account) -> anyhow::Result<()> {
        let data = serde_json::to_string(account).map_err(CacheError::from)?;
        sqlx::query("INSERT OR REPLACE INTO account (id, data) VALUES (1, ?)")
            .bind(&data)
            .execute(&self.pool)
            .await?;

        tracing::debug!(username = %account.username(), "Saved account");
        Ok(())
    }

    async fn get_root(&self) -> anyhow::Result<Option<FileId>> {
        match self.get_state(KEY_ROOT).await? {
            Some(value) => Ok(Some(FileId::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn set_root(&self, id: FileId) -> anyhow::Result<()> {
        self.set_state(KEY_ROOT, &id.to_string()).await?;
        Ok(())
    }

    // --- Sync bookkeeping ---

    async fn get_last_synced(&self) -> anyhow::Result<i64> {
        match self.get_state(KEY_LAST_SYNCED).await? {
            Some(value) => Ok(parse_number(KEY_LAST_SYNCED, &value)?),
            None => Ok(0),
        }
    }

    async fn get_cursor(&self) -> anyhow::Result<u64> {
        match self.get_state(KEY_CURSOR).await? {
            Some(value) => Ok(parse_number(KEY_CURSOR, &value)?),
            None => Ok(0),
        }
    }

    // --- Files ---

    async fn get_base(&self) -> anyhow::Result<Vec<ServerMeta>> {
        let rows = sqlx::query("SELECT data FROM base_files ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut files = Vec::with_capacity(rows.len());
        for row in &rows {
            files.push(base_from_row(row)?);
        }
        Ok(files)
    }

    async fn get_local(&self) -> anyhow::Result<Vec<FileMetadata>> {
        let rows = sqlx::query("SELECT data FROM local_files ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut files = Vec::with_capacity(rows.len());
        for row in &rows {
            files.push(local_from_row(row)?);
        }
        Ok(files)
    }

    async fn get_changes(&self) -> anyhow::Result<Vec<ChangeRecord>> {
        let rows = sqlx::query("SELECT * FROM change_log ORDER BY seq ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(change_from_row(row)?);
        }
        Ok(records)
    }

    async fn stage_local(
        &self,
        metas: &[FileMetadata],
        records: &[ChangeRecord],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for meta in metas {
            insert_local(&mut *tx, meta).await?;
        }
        for record in records {
            insert_change(&mut *tx, record).await?;
        }
        tx.commit().await?;

        tracing::trace!(
            files = metas.len(),
            changes = records.len(),
            "Staged local changes"
        );
        Ok(())
    }

    async fn commit_sync(&self, commit: SyncCommit) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for meta in &commit.base_upserts {
            let data = serde_json::to_string(meta).map_err(CacheError::from)?;
            sqlx::query(
                "INSERT OR REPLACE INTO base_files \
                 (id, metadata_version, content_version, data) VALUES (?, ?, ?, ?)",
            )
            .bind(meta.id().to_string())
            .bind(meta.metadata_version as i64)
            .bind(meta.content_version as i64)
            .bind(&data)
            .execute(&mut *tx)
            .await?;
        }

        for id in &commit.removed {
            let id_str = id.to_string();
            sqlx::query("DELETE FROM base_files WHERE id = ?")
                .bind(&id_str)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM local_files")
            .execute(&mut *tx)
            .await?;
        for meta in &commit.local {
            insert_local(&mut *tx, meta).await?;
        }

        sqlx::query("DELETE FROM change_log")
            .execute(&mut *tx)
            .await?;
        for record in &commit.changes {
            insert_change(&mut *tx, record).await?;
        }

        sqlx::query("INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)")
            .bind(KEY_CURSOR)
            .bind(commit.cursor.to_string())
            .execute(&mut *tx)
            .await?;

        if let Some(last_synced) = commit.last_synced {
            sqlx::query("INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)")
                .bind(KEY_LAST_SYNCED)
                .bind(last_synced.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            upserts = commit.base_upserts.len(),
            removed = commit.removed.len(),
            local = commit.local.len(),
            cursor = commit.cursor,
            "Committed sync"
        );
        Ok(())
    }

    // --- Public keys ---

    async fn cache_public_key(
        &self,
        username: &Username,
        keys: &PublicKeys,
    ) -> anyhow::Result<()> {
        let data = serde_json::to_string(keys).map_err(CacheError::from)?;
        sqlx::query("INSERT OR REPLACE INTO public_keys (username, data) VALUES (?, ?)")
            .bind(username.as_str())
            .bind(&data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_cached_public_key(
        &self,
        username: &Username,
    ) -> anyhow::Result<Option<PublicKeys>> {
        let row = sqlx::query("SELECT data FROM public_keys WHERE username = ?")
            .bind(username.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let data: String = r.get("data");
                Ok(Some(serde_json::from_str(&data).map_err(CacheError::from)?))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sync_state WHERE key != 'schema_version'")
            .execute(&mut *tx)
            .await?;
        for table in [
            "account",
            "base_files",
            "local_files",
            "change_log",
            "public_keys",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!("Cleared local metadata");
        Ok(())
    }
}
