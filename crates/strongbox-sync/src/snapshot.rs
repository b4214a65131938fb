//! Base and local metadata as read from the store at one point in time

use std::collections::HashMap;

use anyhow::Context;
use strongbox_core::domain::{
    Account, ChangeRecord, DocumentHash, FileId, FileMetadata, FileTree, LazyTree, ServerMeta,
};
use strongbox_core::ports::IMetadataStore;

/// The persisted view of the tree: last synced copies, local edits on top
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub base: HashMap<FileId, ServerMeta>,
    pub local: HashMap<FileId, FileMetadata>,
    /// Change log in append order
    pub changes: Vec<ChangeRecord>,
    pub cursor: u64,
}

impl Snapshot {
    pub async fn load(store: &dyn IMetadataStore) -> anyhow::Result<Self> {
        let base = store
            .get_base()
            .await
            .context("Failed to read base metadata")?
            .into_iter()
            .map(|meta| (meta.id(), meta))
            .collect();
        let local = store
            .get_local()
            .await
            .context("Failed to read local metadata")?
            .into_iter()
            .map(|meta| (meta.id, meta))
            .collect();
        let changes = store
            .get_changes()
            .await
            .context("Failed to read change log")?;
        let cursor = store.get_cursor().await.context("Failed to read cursor")?;

        Ok(Self {
            base,
            local,
            changes,
            cursor,
        })
    }

    /// (metadata version, content version) of every base file
    pub fn versions(&self) -> HashMap<FileId, (u64, u64)> {
        self.base
            .values()
            .map(|meta| (meta.id(), (meta.metadata_version, meta.content_version)))
            .collect()
    }

    /// The last synced tree
    pub fn base_tree(&self, account: &Account) -> LazyTree {
        let tree = FileTree::new(self.base.values().map(|meta| meta.meta().clone()));
        LazyTree::new(account.clone(), tree).with_versions(self.versions())
    }

    /// The tree as this device sees it, local edits applied
    pub fn local_tree(&self, account: &Account) -> LazyTree {
        let mut files: HashMap<FileId, FileMetadata> = self
            .base
            .values()
            .map(|meta| (meta.id(), meta.meta().clone()))
            .collect();
        files.extend(self.local.iter().map(|(id, meta)| (*id, meta.clone())));
        LazyTree::new(account.clone(), FileTree::new(files.into_values()))
            .with_versions(self.versions())
    }

    /// Document versions still needed locally, for garbage collection
    pub fn referenced_documents(&self) -> Vec<(FileId, DocumentHash)> {
        let base = self.base.values().map(|meta| meta.meta());
        base.chain(self.local.values())
            .filter(|meta| !meta.deleted)
            .filter_map(|meta| meta.document_hash.clone().map(|hash| (meta.id, hash)))
            .collect()
    }

    pub fn has_local_changes(&self) -> bool {
        !self.local.is_empty()
    }
}
