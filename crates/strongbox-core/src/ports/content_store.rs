//! Content store port (driven/secondary port)
//!
//! Holds encrypted chunks by address and document manifests by file and
//! version. Chunks are shared between documents and versions; a chunk is
//! kept as long as any stored manifest references it.

use crate::domain::{Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId};

/// Result of a garbage collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub manifests_removed: usize,
    pub chunks_removed: usize,
}

#[async_trait::async_trait]
pub trait IContentStore: Send + Sync {
    /// Stores chunks, ignoring ones already present
    async fn put_chunks(&self, chunks: &[Chunk]) -> anyhow::Result<()>;

    async fn get_chunks(&self, hashes: &[ChunkHash]) -> anyhow::Result<Vec<Chunk>>;

    /// The subset of `hashes` not stored locally
    async fn missing_chunks(&self, hashes: &[ChunkHash]) -> anyhow::Result<Vec<ChunkHash>>;

    async fn put_manifest(
        &self,
        id: FileId,
        hash: &DocumentHash,
        manifest: &DocumentManifest,
    ) -> anyhow::Result<()>;

    async fn get_manifest(
        &self,
        id: FileId,
        hash: &DocumentHash,
    ) -> anyhow::Result<Option<DocumentManifest>>;

    async fn delete_manifests(&self, id: FileId) -> anyhow::Result<()>;

    /// Drops manifests not in `keep`, then chunks no manifest references
    async fn gc(&self, keep: &[(FileId, DocumentHash)]) -> anyhow::Result<GcStats>;

    /// Total encrypted bytes held
    async fn stored_bytes(&self) -> anyhow::Result<u64>;

    /// Deletes everything
    async fn clear(&self) -> anyhow::Result<()>;
}
