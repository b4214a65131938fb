//! In-memory implementation of the IServerApi port

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use strongbox_core::domain::{
    Account, Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId, ServerMeta, SignedMeta,
    Username,
};
use strongbox_core::ports::{
    DocumentUpload, EndpointError, FileDiff, IServerApi, ServerError, ServerUsage, UpdatesResponse,
};
use strongbox_crypto::PublicKeys;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::state::ServerState;

/// Bytes charged for every live file, on top of its content
pub const METADATA_FEE: u64 = 1000;

/// Data cap given to every account unless overridden
pub const DEFAULT_DATA_CAP: u64 = 1024 * 1024 * 1024;

/// Reference server holding every account in memory
///
/// Clone an `Arc<InMemoryServer>` into each client to simulate several
/// devices or users talking to one server.
pub struct InMemoryServer {
    state: RwLock<ServerState>,
    client_version: String,
    min_client_version: RwLock<Option<String>>,
    data_cap: AtomicU64,
    offline: AtomicBool,
    registration_enabled: AtomicBool,
    requests: AtomicU64,
}

impl InMemoryServer {
    pub fn new() -> Self {
        info!("Starting in-memory server");
        Self {
            state: RwLock::new(ServerState::default()),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            min_client_version: RwLock::new(None),
            data_cap: AtomicU64::new(DEFAULT_DATA_CAP),
            offline: AtomicBool::new(false),
            registration_enabled: AtomicBool::new(true),
            requests: AtomicU64::new(0),
        }
    }

    /// Version the connected clients claim to run
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    pub fn with_data_cap(self, cap: u64) -> Self {
        self.data_cap.store(cap, Ordering::SeqCst);
        self
    }

    // ------------------------------------------------------------------
    // Test switches
    // ------------------------------------------------------------------

    /// While offline every call fails with `Unreachable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn set_data_cap(&self, cap: u64) {
        self.data_cap.store(cap, Ordering::SeqCst);
    }

    /// Clients older than `version` get `ClientUpdateRequired`
    pub async fn set_min_client_version(&self, version: Option<String>) {
        *self.min_client_version.write().await = version;
    }

    pub fn set_registration_enabled(&self, enabled: bool) {
        self.registration_enabled.store(enabled, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Calls that reached the server (not counting offline rejections)
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.version()
    }

    /// Files stored, tombstones included
    pub async fn file_count(&self) -> usize {
        self.state.read().await.file_count()
    }

    pub async fn chunk_count(&self) -> usize {
        self.state.read().await.chunk_count()
    }

    async fn admit(&self) -> Result<(), ServerError> {
        if self.is_offline() {
            return Err(ServerError::Unreachable);
        }
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(min) = self.min_client_version.read().await.as_deref() {
            if version_lt(&self.client_version, min) {
                debug!(client = %self.client_version, min, "Rejecting outdated client");
                return Err(ServerError::ClientUpdateRequired);
            }
        }
        Ok(())
    }

    async fn admit_account(&self, account: &Account) -> Result<(), ServerError> {
        self.admit().await?;
        self.state
            .read()
            .await
            .authenticate(account.username(), &account.public_keys())
    }
}

impl Default for InMemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares dotted numeric versions; non-numeric parts count as zero
fn version_lt(version: &str, min: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (mut a, mut b) = (parse(version), parse(min));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a < b
}

#[async_trait::async_trait]
impl IServerApi for InMemoryServer {
    async fn new_account(
        &self,
        account: &Account,
        root: SignedMeta,
    ) -> Result<ServerMeta, ServerError> {
        self.admit().await?;
        if !self.registration_enabled.load(Ordering::SeqCst) {
            return Err(ServerError::Endpoint(EndpointError::Disabled));
        }
        let accepted =
            self.state
                .write()
                .await
                .new_account(account.username(), account.public_keys(), root)?;
        info!(username = %account.username(), "Registered account");
        Ok(accepted)
    }

    /// Public keys are public; the caller need not be registered
    async fn get_public_key(
        &self,
        _account: &Account,
        username: &Username,
    ) -> Result<PublicKeys, ServerError> {
        self.admit().await?;
        self.state.read().await.public_key(username)
    }

    async fn get_updates(
        &self,
        account: &Account,
        since: u64,
    ) -> Result<UpdatesResponse, ServerError> {
        self.admit_account(account).await?;
        Ok(self.state.read().await.updates(account.username(), since))
    }

    async fn get_file_ids(&self, account: &Account) -> Result<Vec<FileId>, ServerError> {
        self.admit_account(account).await?;
        Ok(self.state.read().await.file_ids(account.username()))
    }

    async fn get_document(
        &self,
        account: &Account,
        id: FileId,
        hash: &DocumentHash,
    ) -> Result<DocumentManifest, ServerError> {
        self.admit_account(account).await?;
        self.state
            .read()
            .await
            .document(account.username(), id, hash)
    }

    async fn missing_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<ChunkHash>, ServerError> {
        self.admit_account(account).await?;
        Ok(self.state.read().await.missing_chunks(hashes))
    }

    async fn put_chunks(&self, account: &Account, chunks: Vec<Chunk>) -> Result<(), ServerError> {
        self.admit_account(account).await?;
        self.state.write().await.put_chunks(chunks)
    }

    async fn get_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<Chunk>, ServerError> {
        self.admit_account(account).await?;
        Ok(self.state.read().await.get_chunks(hashes))
    }

    async fn upsert(
        &self,
        account: &Account,
        updates: Vec<FileDiff>,
        documents: Vec<DocumentUpload>,
    ) -> Result<Vec<ServerMeta>, ServerError> {
        self.admit_account(account).await?;
        let cap = self.data_cap.load(Ordering::SeqCst);
        self.state.write().await.upsert(
            account.username(),
            &account.public_keys(),
            updates,
            documents,
            cap,
        )
    }

    async fn get_usage(&self, account: &Account) -> Result<ServerUsage, ServerError> {
        self.admit_account(account).await?;
        Ok(ServerUsage {
            usages: self.state.read().await.usage(account.username()),
            cap: self.data_cap.load(Ordering::SeqCst),
        })
    }

    async fn delete_account(&self, account: &Account) -> Result<(), ServerError> {
        self.admit_account(account).await?;
        self.state.write().await.delete_account(account.username());
        info!(username = %account.username(), "Account deleted");
        Ok(())
    }
}
