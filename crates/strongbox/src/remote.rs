//! The server a handle talks to, retargeted when an account arrives
//!
//! The facade and its sync engine share one [`Remote`]. Creating or importing
//! an account registers against that account's own URL and then switches
//! both to it.

use std::sync::{Arc, PoisonError, RwLock};

use strongbox_core::domain::{
    Account, Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId, ServerMeta, SignedMeta,
    Username,
};
use strongbox_core::ports::{
    DocumentUpload, FileDiff, IServerApi, ServerError, ServerUsage, UpdatesResponse,
};
use strongbox_crypto::PublicKeys;
use tracing::debug;

/// Opens a connection to the server at a URL
pub(crate) type Connector = Box<dyn Fn(&str) -> Arc<dyn IServerApi> + Send + Sync>;

pub(crate) struct Remote {
    current: RwLock<Arc<dyn IServerApi>>,
    /// `None` when the server was injected; every URL then maps to it
    connect: Option<Connector>,
}

impl Remote {
    pub(crate) fn fixed(server: Arc<dyn IServerApi>) -> Self {
        Self {
            current: RwLock::new(server),
            connect: None,
        }
    }

    pub(crate) fn connecting(server: Arc<dyn IServerApi>, connect: Connector) -> Self {
        Self {
            current: RwLock::new(server),
            connect: Some(connect),
        }
    }

    fn current(&self) -> Arc<dyn IServerApi> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A connection to `api_url`, not yet used by the handle
    pub(crate) fn at(&self, api_url: &str) -> Arc<dyn IServerApi> {
        match &self.connect {
            Some(connect) => connect(api_url),
            None => self.current(),
        }
    }

    /// Routes every later call, the sync engine's included, to `server`
    pub(crate) fn switch_to(&self, server: Arc<dyn IServerApi>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = server;
        debug!("Server connection switched");
    }
}

#[async_trait::async_trait]
impl IServerApi for Remote {
    async fn new_account(
        &self,
        account: &Account,
        root: SignedMeta,
    ) -> Result<ServerMeta, ServerError> {
        self.current().new_account(account, root).await
    }

    async fn get_public_key(
        &self,
        account: &Account,
        username: &Username,
    ) -> Result<PublicKeys, ServerError> {
        self.current().get_public_key(account, username).await
    }

    async fn get_updates(
        &self,
        account: &Account,
        since: u64,
    ) -> Result<UpdatesResponse, ServerError> {
        self.current().get_updates(account, since).await
    }

    async fn get_file_ids(&self, account: &Account) -> Result<Vec<FileId>, ServerError> {
        self.current().get_file_ids(account).await
    }

    async fn get_document(
        &self,
        account: &Account,
        id: FileId,
        hash: &DocumentHash,
    ) -> Result<DocumentManifest, ServerError> {
        self.current().get_document(account, id, hash).await
    }

    async fn missing_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<ChunkHash>, ServerError> {
        self.current().missing_chunks(account, hashes).await
    }

    async fn put_chunks(&self, account: &Account, chunks: Vec<Chunk>) -> Result<(), ServerError> {
        self.current().put_chunks(account, chunks).await
    }

    async fn get_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<Chunk>, ServerError> {
        self.current().get_chunks(account, hashes).await
    }

    async fn upsert(
        &self,
        account: &Account,
        updates: Vec<FileDiff>,
        documents: Vec<DocumentUpload>,
    ) -> Result<Vec<ServerMeta>, ServerError> {
        self.current().upsert(account, updates, documents).await
    }

    async fn get_usage(&self, account: &Account) -> Result<ServerUsage, ServerError> {
        self.current().get_usage(account).await
    }

    async fn delete_account(&self, account: &Account) -> Result<(), ServerError> {
        self.current().delete_account(account).await
    }
}
