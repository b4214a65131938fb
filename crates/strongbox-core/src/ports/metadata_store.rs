//! Metadata store port (driven/secondary port)
//!
//! Persists the account, the last synced server copy of every file (the
//! base), locally modified copies, the change log and a small cache of
//! other users' public keys.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Local edits and their change records are written together by
//!   [`IMetadataStore::stage_local`]; the outcome of a sync is written by
//!   [`IMetadataStore::commit_sync`]. Both are atomic.

use strongbox_crypto::PublicKeys;

use crate::domain::{Account, ChangeRecord, FileId, FileMetadata, ServerMeta, Username};

/// Everything a sync writes back, applied in one transaction
#[derive(Debug, Clone, Default)]
pub struct SyncCommit {
    /// Base records to insert or replace
    pub base_upserts: Vec<ServerMeta>,
    /// Files to forget entirely (base, local and change log)
    pub removed: Vec<FileId>,
    /// Replacement for the full set of local records
    pub local: Vec<FileMetadata>,
    /// Replacement for the full change log
    pub changes: Vec<ChangeRecord>,
    /// New server cursor
    pub cursor: u64,
    /// Completion time in milliseconds, when the sync reached the server
    pub last_synced: Option<i64>,
}

#[async_trait::async_trait]
pub trait IMetadataStore: Send + Sync {
    async fn get_account(&self) -> anyhow::Result<Option<Account>>;

    async fn save_account(&self, account: &Account) -> anyhow::Result<()>;

    async fn get_root(&self) -> anyhow::Result<Option<FileId>>;

    async fn set_root(&self, id: FileId) -> anyhow::Result<()>;

    /// Milliseconds since the epoch of the last successful sync, 0 if never
    async fn get_last_synced(&self) -> anyhow::Result<i64>;

    /// Server version up to which updates have been pulled
    async fn get_cursor(&self) -> anyhow::Result<u64>;

    async fn get_base(&self) -> anyhow::Result<Vec<ServerMeta>>;

    async fn get_local(&self) -> anyhow::Result<Vec<FileMetadata>>;

    /// The change log in append order
    async fn get_changes(&self) -> anyhow::Result<Vec<ChangeRecord>>;

    /// Stores local records and appends their change records atomically
    async fn stage_local(
        &self,
        metas: &[FileMetadata],
        records: &[ChangeRecord],
    ) -> anyhow::Result<()>;

    async fn commit_sync(&self, commit: SyncCommit) -> anyhow::Result<()>;

    async fn cache_public_key(&self, username: &Username, keys: &PublicKeys)
        -> anyhow::Result<()>;

    async fn get_cached_public_key(&self, username: &Username)
        -> anyhow::Result<Option<PublicKeys>>;

    /// Deletes everything, the account included
    async fn clear(&self) -> anyhow::Result<()>;
}
