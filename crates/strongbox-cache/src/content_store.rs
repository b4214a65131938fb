//! SQLite implementation of IContentStore
//!
//! Chunks are stored once by address. Every manifest also records which
//! chunks it references in `manifest_chunks`, so garbage collection is a
//! pair of set-difference deletes.

use std::collections::HashSet;

use sqlx::{Row, SqlitePool};

use strongbox_core::domain::{Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId};
use strongbox_core::ports::{GcStats, IContentStore};
use strongbox_crypto::EncryptedData;

use crate::CacheError;

/// SQLite-based implementation of the content store port
pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn has_chunk(&self, hash: &ChunkHash) -> Result<bool, CacheError> {
        let row = sqlx::query("SELECT 1 FROM chunks WHERE hash = ?")
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl IContentStore for SqliteContentStore {
    async fn put_chunks(&self, chunks: &[Chunk]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query("INSERT OR IGNORE INTO chunks (hash, data, size) VALUES (?, ?, ?)")
                .bind(chunk.hash.as_str())
                .bind(chunk.data.to_bytes())
                .bind(chunk.stored_size() as i64)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::trace!(count = chunks.len(), "Stored chunks");
        Ok(())
    }

    async fn get_chunks(&self, hashes: &[ChunkHash]) -> anyhow::Result<Vec<Chunk>> {
        let mut chunks = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let row = sqlx::query("SELECT data FROM chunks WHERE hash = ?")
                .bind(hash.as_str())
                .fetch_optional(&self.pool)
                .await?;

            if let Some(row) = row {
                let bytes: Vec<u8> = row.get("data");
                let data = EncryptedData::from_bytes(&bytes).map_err(|e| {
                    CacheError::SerializationError(format!("Invalid chunk {}: {}", hash, e))
                })?;
                chunks.push(Chunk {
                    hash: hash.clone(),
                    data,
                });
            }
        }
        Ok(chunks)
    }

    async fn missing_chunks(&self, hashes: &[ChunkHash]) -> anyhow::Result<Vec<ChunkHash>> {
        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        for hash in hashes {
            if seen.insert(hash) && !self.has_chunk(hash).await? {
                missing.push(hash.clone());
            }
        }
        Ok(missing)
    }

    async fn put_manifest(
        &self,
        id: FileId,
        hash: &DocumentHash,
        manifest: &DocumentManifest,
    ) -> anyhow::Result<()> {
        let id_str = id.to_string();
        let data = serde_json::to_string(manifest).map_err(CacheError::from)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR REPLACE INTO manifests (file_id, hash, data) VALUES (?, ?, ?)")
            .bind(&id_str)
            .bind(hash.as_str())
            .bind(&data)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM manifest_chunks WHERE file_id = ? AND hash = ?")
            .bind(&id_str)
            .bind(hash.as_str())
            .execute(&mut *tx)
            .await?;
        for chunk in &manifest.chunks {
            sqlx::query("INSERT INTO manifest_chunks (file_id, hash, chunk_hash) VALUES (?, ?, ?)")
                .bind(&id_str)
                .bind(hash.as_str())
                .bind(chunk.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_manifest(
        &self,
        id: FileId,
        hash: &DocumentHash,
    ) -> anyhow::Result<Option<DocumentManifest>> {
        let row = sqlx::query("SELECT data FROM manifests WHERE file_id = ? AND hash = ?")
            .bind(id.to_string())
            .bind(hash.as_str())
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

    async fn delete_manifests(&self, id: FileId) -> anyhow::Result<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM manifest_chunks WHERE file_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM manifests WHERE file_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn gc(&self, keep: &[(FileId, DocumentHash)]) -> anyhow::Result<GcStats> {
        let keep: HashSet<(String, String)> = keep
            .iter()
            .map(|(id, hash)| (id.to_string(), hash.as_str().to_string()))
            .collect();

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query("SELECT file_id, hash FROM manifests")
            .fetch_all(&mut *tx)
            .await?;

        let mut stats = GcStats::default();
        for row in &rows {
            let file_id: String = row.get("file_id");
            let hash: String = row.get("hash");
            if keep.contains(&(file_id.clone(), hash.clone())) {
                continue;
            }
            sqlx::query("DELETE FROM manifest_chunks WHERE file_id = ? AND hash = ?")
                .bind(&file_id)
                .bind(&hash)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM manifests WHERE file_id = ? AND hash = ?")
                .bind(&file_id)
                .bind(&hash)
                .execute(&mut *tx)
                .await?;
            stats.manifests_removed += 1;
        }

        let removed = sqlx::query(
            "DELETE FROM chunks WHERE hash NOT IN (SELECT chunk_hash FROM manifest_chunks)",
        )
        .execute(&mut *tx)
        .await?;
        stats.chunks_removed = removed.rows_affected() as usize;

        tx.commit().await?;

        tracing::debug!(
            manifests_removed = stats.manifests_removed,
            chunks_removed = stats.chunks_removed,
            "Garbage collected content"
        );
        Ok(stats)
    }

    async fn stored_bytes(&self) -> anyhow::Result<u64> {
        let row = sqlx::query("SELECT COALESCE(SUM(size), 0) AS total FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["manifest_chunks", "manifests", "chunks"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
