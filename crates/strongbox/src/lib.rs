//! Strongbox - encrypted file tree with multi-device sync and sharing
//!
//! [`Strongbox`] is the handle applications hold. It owns the local stores,
//! the server connection and the sync engine, and exposes every operation
//! as an async method returning a typed error:
//!
//! - **Account** - create, import, export, delete
//! - **Files** - create, rename, move, delete, paths and listings
//! - **Documents** - read and write content, drawings
//! - **Sharing** - share, pending shares, links
//! - **Sync** - sync with progress, pending work, last synced time
//! - **Usage** - server usage against the data cap, local plaintext size
//! - **Search** - file paths and document content
//! - **Import/export** - copy between disk and the tree
//!
//! [`blocking::Strongbox`] wraps the same surface for synchronous callers.
//!
//! # Example
//!
//! ```rust,no_run
//! use strongbox::Strongbox;
//! use strongbox_core::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let sb = Strongbox::open(Config::default()).await?;
//! sb.create_account("alice", "https://api.example.com", true).await?;
//!
//! let todo = sb.create_at_path("/notes/todo.md").await?;
//! sb.write_document(todo.id, b"buy milk").await?;
//! sb.sync(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod blocking;
pub mod documents;
pub mod errors;
pub mod files;
pub mod import_export;
mod remote;
pub mod search;
pub mod sharing;
pub mod sync;
pub mod usage;

use std::sync::Arc;

use strongbox_api::ApiClient;
use strongbox_cache::{DatabasePool, SqliteContentStore, SqliteMetadataStore};
use strongbox_core::config::Config;
use strongbox_core::domain::{Account, LazyTree};
use strongbox_core::ports::{IContentStore, IMetadataStore, IServerApi};
use strongbox_sync::{Snapshot, SyncEngine};
use tokio::sync::Mutex;
use tracing::info;

use remote::Remote;

pub use errors::*;
pub use import_export::{ExportProgress, ImportStatus};
pub use search::{ContentMatch, PathMatch, SearchResults};

pub use strongbox_core::domain::{
    ChangeRecord, DocumentHash, Drawing, DrawingFormat, File, FileId, FileType, PathFilter,
    ShareMode, SyncProgress, SyncStatus, UncompressedUsage, UsageMetrics,
};
pub use strongbox_sync::{ProgressCallback, SyncResult};

/// An open local store and its connection to the server
pub struct Strongbox {
    config: Config,
    server: Arc<Remote>,
    metadata: Arc<dyn IMetadataStore>,
    content: Arc<dyn IContentStore>,
    engine: Arc<SyncEngine>,
    /// Held by every read and write of the local tree, and for whole syncs
    tree_lock: Arc<Mutex<()>>,
}

impl Strongbox {
    /// Opens the store under `config.storage.data_dir` and connects to
    /// `config.server.api_url`
    ///
    /// If an account already exists, its own server URL takes precedence.
    /// Creating or importing an account connects to that account's URL.
    pub async fn open(config: Config) -> Result<Self, InitError> {
        let errors = config.validate();
        if let Some(first) = errors.first() {
            return Err(InitError::InvalidConfig(format!("{}: {}", first.field, first.message)));
        }

        let (metadata, content) = open_stores(&config).await?;
        let api_url = match metadata
            .get_account()
            .await
            .map_err(|e| InitError::Storage(format!("{e:#}")))?
        {
            Some(account) => account.api_url().to_string(),
            None => config.server.api_url.clone(),
        };

        let server_config = config.server.clone();
        let rate_limiting = config.rate_limiting.clone();
        let connect: remote::Connector = Box::new(move |url: &str| -> Arc<dyn IServerApi> {
            let mut server_config = server_config.clone();
            server_config.api_url = url.to_string();
            Arc::new(ApiClient::from_config(&server_config, &rate_limiting))
        });
        let server = Remote::connecting(connect(&api_url), connect);

        Ok(Self::assemble(config, server, metadata, content))
    }

    /// Like [`Strongbox::open`], talking to `server` instead of the network
    ///
    /// Accounts created or imported through this handle use `server`
    /// whatever their URL.
    pub async fn open_with_server(
        config: Config,
        server: Arc<dyn IServerApi>,
    ) -> Result<Self, InitError> {
        let (metadata, content) = open_stores(&config).await?;
        Ok(Self::from_parts(config, server, metadata, content))
    }

    /// A handle over existing stores that always talks to `server`
    pub fn from_parts(
        config: Config,
        server: Arc<dyn IServerApi>,
        metadata: Arc<dyn IMetadataStore>,
        content: Arc<dyn IContentStore>,
    ) -> Self {
        Self::assemble(config, Remote::fixed(server), metadata, content)
    }

    fn assemble(
        config: Config,
        server: Remote,
        metadata: Arc<dyn IMetadataStore>,
        content: Arc<dyn IContentStore>,
    ) -> Self {
        let server = Arc::new(server);
        let tree_lock = Arc::new(Mutex::new(()));
        let engine = SyncEngine::new(server.clone(), metadata.clone(), content.clone(), &config)
            .with_tree_lock(tree_lock.clone());

        info!(data_dir = %config.storage.data_dir.display(), "Strongbox opened");
        Self {
            config,
            server,
            metadata,
            content,
            engine: Arc::new(engine),
            tree_lock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The sync engine, e.g. to drive a [`strongbox_sync::SyncScheduler`]
    pub fn engine(&self) -> Arc<SyncEngine> {
        self.engine.clone()
    }

    // ========================================================================
    // Local tree access
    // ========================================================================

    async fn account(&self) -> Result<Account, FileError> {
        self.metadata
            .get_account()
            .await
            .map_err(unexpected)?
            .ok_or(FileError::NoAccount)
    }

    /// The local tree; callers hold `tree_lock`
    async fn load_tree(&self) -> Result<LazyTree, FileError> {
        let account = self.account().await?;
        let snapshot = Snapshot::load(self.metadata.as_ref())
            .await
            .map_err(unexpected)?;
        Ok(snapshot.local_tree(&account))
    }

    /// Persists staged files and their change records; callers hold `tree_lock`
    async fn save_tree(&self, tree: &mut LazyTree) -> Result<(), FileError> {
        let staged = tree.staged();
        let changes = tree.take_changes();
        if staged.is_empty() {
            return Ok(());
        }
        self.metadata
            .stage_local(&staged, &changes)
            .await
            .map_err(unexpected)
    }

    /// Runs a read-only query against the local tree
    async fn read<T>(
        &self,
        query: impl FnOnce(&mut LazyTree) -> Result<T, FileError>,
    ) -> Result<T, FileError> {
        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        query(&mut tree)
    }

    /// Applies a mutation to the local tree and stages it
    ///
    /// Nothing is written if `mutation` fails.
    async fn mutate<T>(
        &self,
        mutation: impl FnOnce(&mut LazyTree) -> Result<T, FileError>,
    ) -> Result<T, FileError> {
        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        let out = mutation(&mut tree)?;
        self.save_tree(&mut tree).await?;
        Ok(out)
    }
}

async fn open_stores(
    config: &Config,
) -> Result<(Arc<dyn IMetadataStore>, Arc<dyn IContentStore>), InitError> {
    let db = DatabasePool::open(&config.storage)
        .await
        .map_err(|e| InitError::Storage(e.to_string()))?;
    let metadata = Arc::new(SqliteMetadataStore::new(db.pool().clone()));
    let content = Arc::new(SqliteContentStore::new(db.pool().clone()));
    Ok((metadata, content))
}

pub(crate) fn unexpected(err: impl Into<anyhow::Error>) -> FileError {
    FileError::Unexpected(format!("{:#}", err.into()))
}
