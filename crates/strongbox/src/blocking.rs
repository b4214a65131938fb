//! Synchronous wrapper around [`crate::Strongbox`]
//!
//! Owns a tokio runtime and blocks the calling thread for every operation.
//! Meant for callers without an async runtime of their own; do not use it
//! from inside one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use strongbox_core::config::Config;
use strongbox_core::domain::{Account, ChangeRecord};
use strongbox_core::ports::IServerApi;
use tokio::runtime::Runtime;

use crate::{
    AccountError, CreateAccountError, DocumentError, DocumentHash, Drawing, DrawingFormat,
    ExportProgress, File, FileError, FileId, FileType, ImportAccountError, ImportExportError,
    ImportStatus, InitError, PathFilter, ProgressCallback, SearchError, SearchResults, ShareError,
    ShareMode, SyncError, SyncResult, SyncStatus, UncompressedUsage, UsageError, UsageMetrics,
};

pub struct Strongbox {
    // dropped before the runtime it was created on
    inner: crate::Strongbox,
    rt: Runtime,
}

macro_rules! blocking {
    ($(
        $(#[$doc:meta])*
        fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;
    )*) => {
        $(
            $(#[$doc])*
            pub fn $name(&self $(, $arg: $ty)*) -> $ret {
                self.rt.block_on(self.inner.$name($($arg),*))
            }
        )*
    };
}

impl Strongbox {
    pub fn open(config: Config) -> Result<Self, InitError> {
        let rt = runtime()?;
        let inner = rt.block_on(crate::Strongbox::open(config))?;
        Ok(Self { inner, rt })
    }

    pub fn open_with_server(
        config: Config,
        server: Arc<dyn IServerApi>,
    ) -> Result<Self, InitError> {
        let rt = runtime()?;
        let inner = rt.block_on(crate::Strongbox::open_with_server(config, server))?;
        Ok(Self { inner, rt })
    }

    /// The async handle, for operations not wrapped here
    pub fn inner(&self) -> &crate::Strongbox {
        &self.inner
    }

    pub fn logout_and_exit(self) -> Result<(), AccountError> {
        self.rt.block_on(self.inner.logout_and_exit())
    }

    pub fn import_files(
        &self,
        sources: &[PathBuf],
        dest: FileId,
        progress: Option<&(dyn Fn(ImportStatus) + Send + Sync)>,
    ) -> Result<Vec<File>, ImportExportError> {
        self.rt.block_on(self.inner.import_files(sources, dest, progress))
    }

    pub fn export_file(
        &self,
        id: FileId,
        dest_dir: &Path,
        edit: bool,
        progress: Option<&(dyn Fn(ExportProgress) + Send + Sync)>,
    ) -> Result<(), ImportExportError> {
        self.rt.block_on(self.inner.export_file(id, dest_dir, edit, progress))
    }

    blocking! {
        fn create_account(&self, username: &str, api_url: &str, welcome_doc: bool) -> Result<Account, CreateAccountError>;
        fn import_account(&self, account_string: &str, api_url: Option<&str>) -> Result<Account, ImportAccountError>;
        fn get_account(&self) -> Result<Account, AccountError>;
        fn export_account_string(&self) -> Result<String, AccountError>;
        fn export_account_private_key(&self) -> Result<String, AccountError>;
        fn delete_account(&self) -> Result<(), AccountError>;

        fn get_root(&self) -> Result<File, FileError>;
        fn get_children(&self, id: FileId) -> Result<Vec<File>, FileError>;
        fn get_and_get_children_recursively(&self, id: FileId) -> Result<Vec<File>, FileError>;
        fn get_file_by_id(&self, id: FileId) -> Result<File, FileError>;
        fn list_metadatas(&self) -> Result<Vec<File>, FileError>;
        fn create_file(&self, name: &str, parent: FileId, file_type: FileType) -> Result<File, FileError>;
        fn rename_file(&self, id: FileId, new_name: &str) -> Result<(), FileError>;
        fn move_file(&self, id: FileId, new_parent: FileId) -> Result<(), FileError>;
        fn delete_file(&self, id: FileId) -> Result<(), FileError>;
        fn create_at_path(&self, path: &str) -> Result<File, FileError>;
        fn create_link_at_path(&self, path: &str, target: FileId) -> Result<File, FileError>;
        fn get_by_path(&self, path: &str) -> Result<File, FileError>;
        fn get_path_by_id(&self, id: FileId) -> Result<String, FileError>;
        fn list_paths(&self, filter: Option<PathFilter>) -> Result<Vec<String>, FileError>;
        fn list_folder_paths(&self) -> Result<Vec<String>, FileError>;

        fn read_document(&self, id: FileId) -> Result<Vec<u8>, DocumentError>;
        fn write_document(&self, id: FileId, content: &[u8]) -> Result<(), DocumentError>;
        fn read_document_with_hash(&self, id: FileId) -> Result<(Option<DocumentHash>, Vec<u8>), DocumentError>;
        fn safe_write(&self, id: FileId, old_hash: Option<DocumentHash>, content: &[u8]) -> Result<DocumentHash, DocumentError>;
        fn read_drawing(&self, id: FileId) -> Result<Drawing, DocumentError>;
        fn write_drawing(&self, id: FileId, drawing: &Drawing) -> Result<(), DocumentError>;
        fn export_drawing(&self, id: FileId, format: DrawingFormat) -> Result<Vec<u8>, DocumentError>;

        fn share_file(&self, id: FileId, username: &str, mode: ShareMode) -> Result<(), ShareError>;
        fn get_pending_shares(&self) -> Result<Vec<File>, FileError>;
        fn delete_pending_share(&self, id: FileId) -> Result<(), ShareError>;
        fn create_link(&self, name: &str, parent: FileId, target: FileId) -> Result<File, FileError>;

        /// Runs one sync on this thread
        fn sync(&self, progress: Option<ProgressCallback>) -> Result<SyncResult, SyncError>;
        fn calculate_work(&self) -> Result<SyncStatus, SyncError>;
        fn get_local_changes(&self) -> Result<Vec<ChangeRecord>, FileError>;
        fn get_last_synced(&self) -> Result<i64, AccountError>;
        fn get_last_synced_human_string(&self) -> Result<String, AccountError>;

        fn get_usage(&self) -> Result<UsageMetrics, UsageError>;
        fn get_uncompressed_usage(&self) -> Result<UncompressedUsage, UsageError>;

        fn search(&self, query: &str, search_paths: bool, search_docs: bool) -> Result<SearchResults, SearchError>;
    }
}

fn runtime() -> Result<Runtime, InitError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| InitError::Unexpected(e.to_string()))
}
