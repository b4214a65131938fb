//! Server-side storage and the rules applied to every change

use std::collections::{HashMap, HashSet};

use strongbox_core::domain::{
    AccessMode, Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId, FileMetadata, FileTree,
    FileUsage, ServerMeta, SignedMeta, Username,
};
use strongbox_core::ports::{DocumentUpload, EndpointError, FileDiff, ServerError, UpdatesResponse};
use strongbox_crypto::PublicKeys;
use tracing::debug;

use crate::server::METADATA_FEE;

#[derive(Debug, Default)]
pub(crate) struct ServerState {
    users: HashMap<Username, PublicKeys>,
    files: HashMap<FileId, ServerMeta>,
    manifests: HashMap<(FileId, DocumentHash), DocumentManifest>,
    chunks: HashMap<ChunkHash, Chunk>,
    version: u64,
}

fn validation(msg: impl Into<String>) -> ServerError {
    ServerError::Endpoint(EndpointError::Validation(msg.into()))
}

fn endpoint(e: EndpointError) -> ServerError {
    ServerError::Endpoint(e)
}

impl ServerState {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn tree(&self) -> FileTree {
        self.files.values().map(|f| f.meta().clone()).collect()
    }

    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Checks that `username` is registered under `keys`
    pub fn authenticate(&self, username: &Username, keys: &PublicKeys) -> Result<(), ServerError> {
        match self.users.get(username) {
            Some(registered) if registered == keys => Ok(()),
            _ => Err(ServerError::InvalidAuth),
        }
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub fn new_account(
        &mut self,
        username: &Username,
        keys: PublicKeys,
        root: SignedMeta,
    ) -> Result<ServerMeta, ServerError> {
        if self.users.contains_key(username) {
            return Err(endpoint(EndpointError::UsernameTaken));
        }
        root.verify().map_err(|_| ServerError::InvalidAuth)?;
        if root.public_key != keys {
            return Err(ServerError::InvalidAuth);
        }
        let meta = &root.meta;
        if !meta.is_root() || !meta.is_folder() || &meta.owner != username || meta.owner_key != keys
        {
            return Err(validation("root folder is malformed"));
        }
        if self.files.contains_key(&meta.id) {
            return Err(validation("root id already in use"));
        }

        let version = self.next_version();
        let accepted = ServerMeta {
            file: root,
            metadata_version: version,
            content_version: version,
        };
        self.users.insert(username.clone(), keys);
        self.files.insert(accepted.id(), accepted.clone());
        Ok(accepted)
    }

    pub fn public_key(&self, username: &Username) -> Result<PublicKeys, ServerError> {
        self.users
            .get(username)
            .copied()
            .ok_or(endpoint(EndpointError::UserNotFound))
    }

    /// Removes the user, everything they own, and links pointing at it
    pub fn delete_account(&mut self, username: &Username) {
        self.users.remove(username);

        let owned: HashSet<FileId> = self
            .files
            .values()
            .filter(|f| &f.meta().owner == username)
            .map(ServerMeta::id)
            .collect();
        self.files.retain(|id, f| {
            !owned.contains(id)
                && !f
                    .meta()
                    .link_target()
                    .is_some_and(|target| owned.contains(&target))
        });
        let files = &self.files;
        self.manifests.retain(|(id, _), _| files.contains_key(id));

        let referenced: HashSet<&ChunkHash> = self
            .manifests
            .values()
            .flat_map(|m| m.chunks.iter())
            .collect();
        let before = self.chunks.len();
        let orphaned: Vec<ChunkHash> = self
            .chunks
            .keys()
            .filter(|h| !referenced.contains(h))
            .cloned()
            .collect();
        for hash in orphaned {
            self.chunks.remove(&hash);
        }
        debug!(
            %username,
            files = owned.len(),
            chunks = before - self.chunks.len(),
            "Deleted account"
        );
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// True if a live grant for `user` on `id` or an ancestor was changed after `since`
    fn granted_since(&self, tree: &FileTree, user: &Username, id: &FileId, since: u64) -> bool {
        std::iter::once(*id)
            .chain(tree.ancestors(id))
            .filter_map(|a| self.files.get(&a))
            .any(|f| f.metadata_version > since && f.meta().access_key_for(user).is_some())
    }

    pub fn updates(&self, user: &Username, since: u64) -> UpdatesResponse {
        let tree = self.tree();
        let mut files: Vec<ServerMeta> = self
            .files
            .values()
            .filter(|f| tree.access_mode(user, &f.id()).is_some())
            .filter(|f| {
                f.metadata_version > since
                    || (&f.meta().owner != user && self.granted_since(&tree, user, &f.id(), since))
            })
            .cloned()
            .collect();
        files.sort_by_key(|f| (f.metadata_version, f.id()));

        UpdatesResponse {
            as_of: self.version,
            files,
        }
    }

    pub fn file_ids(&self, user: &Username) -> Vec<FileId> {
        let tree = self.tree();
        let mut ids: Vec<FileId> = tree
            .ids()
            .filter(|id| tree.access_mode(user, id).is_some())
            .collect();
        ids.sort();
        ids
    }

    pub fn document(
        &self,
        user: &Username,
        id: FileId,
        hash: &DocumentHash,
    ) -> Result<DocumentManifest, ServerError> {
        let tree = self.tree();
        if !tree.contains(&id) {
            return Err(endpoint(EndpointError::FileNotFound));
        }
        if tree.access_mode(user, &id).is_none() {
            return Err(endpoint(EndpointError::NotPermissioned));
        }
        self.manifests
            .get(&(id, hash.clone()))
            .cloned()
            .ok_or(endpoint(EndpointError::DocumentNotFound))
    }

    // ========================================================================
    // Chunks
    // ========================================================================

    pub fn missing_chunks(&self, hashes: Vec<ChunkHash>) -> Vec<ChunkHash> {
        let mut seen = HashSet::new();
        hashes
            .into_iter()
            .filter(|h| !self.chunks.contains_key(h) && seen.insert(h.clone()))
            .collect()
    }

    pub fn put_chunks(&mut self, chunks: Vec<Chunk>) -> Result<(), ServerError> {
        if let Some(bad) = chunks.iter().find(|c| !c.is_intact()) {
            return Err(validation(format!("chunk {} does not match its hash", bad.hash)));
        }
        for chunk in chunks {
            self.chunks.entry(chunk.hash.clone()).or_insert(chunk);
        }
        Ok(())
    }

    pub fn get_chunks(&self, hashes: Vec<ChunkHash>) -> Vec<Chunk> {
        hashes
            .iter()
            .filter_map(|h| self.chunks.get(h).cloned())
            .collect()
    }

    // ========================================================================
    // Usage
    // ========================================================================

    fn content_bytes(&self, manifest: &DocumentManifest) -> u64 {
        let unique: HashSet<&ChunkHash> = manifest.chunks.iter().collect();
        unique
            .into_iter()
            .filter_map(|h| self.chunks.get(h))
            .map(Chunk::stored_size)
            .sum()
    }

    /// Usage of every live file `owner` owns in `tree`
    fn usage_in(
        &self,
        tree: &FileTree,
        owner: &Username,
        uploads: &HashMap<(FileId, DocumentHash), &DocumentManifest>,
    ) -> Vec<FileUsage> {
        let mut usages: Vec<FileUsage> = tree
            .all()
            .filter(|f| &f.owner == owner && !tree.is_deleted(&f.id))
            .map(|f| {
                let content = f
                    .document_hash
                    .as_ref()
                    .and_then(|hash| {
                        let key = (f.id, hash.clone());
                        uploads
                            .get(&key)
                            .copied()
                            .or_else(|| self.manifests.get(&key))
                    })
                    .map(|m| self.content_bytes(m))
                    .unwrap_or(0);
                FileUsage {
                    file_id: f.id,
                    size_bytes: METADATA_FEE + content,
                }
            })
            .collect();
        usages.sort_by_key(|u| u.file_id);
        usages
    }

    pub fn usage(&self, owner: &Username) -> Vec<FileUsage> {
        self.usage_in(&self.tree(), owner, &HashMap::new())
    }

    // ========================================================================
    // Upsert
    // ========================================================================

    pub fn upsert(
        &mut self,
        caller: &Username,
        caller_keys: &PublicKeys,
        updates: Vec<FileDiff>,
        documents: Vec<DocumentUpload>,
        data_cap: u64,
    ) -> Result<Vec<ServerMeta>, ServerError> {
        if updates.is_empty() && documents.is_empty() {
            return Ok(Vec::new());
        }

        let before = self.tree();
        let mut after = before.clone();
        let mut ids = HashSet::new();

        for diff in &updates {
            diff.new.verify().map_err(|_| ServerError::InvalidAuth)?;
            if &diff.new.public_key != caller_keys {
                return Err(ServerError::InvalidAuth);
            }
            let id = diff.new.id();
            if !ids.insert(id) {
                return Err(validation(format!("file {id} appears twice")));
            }
            match (diff.base_version, self.files.get(&id)) {
                (None, None) => {}
                (Some(base), Some(current)) if base == current.metadata_version => {}
                (Some(_), None) => return Err(endpoint(EndpointError::FileNotFound)),
                _ => return Err(endpoint(EndpointError::OldVersionIncorrect)),
            }
            after.insert(diff.new.meta.clone());
        }

        for diff in &updates {
            self.authorize(caller, &before, &after, &diff.new.meta)?;
        }

        after
            .validate()
            .map_err(|failure| validation(failure.to_string()))?;

        let uploads = self.check_documents(&updates, &documents)?;

        let owners: HashSet<&Username> = updates.iter().map(|d| &d.new.meta.owner).collect();
        for owner in owners {
            let total = |usages: Vec<FileUsage>| usages.iter().map(|u| u.size_bytes).sum::<u64>();
            let was = total(self.usage_in(&before, owner, &HashMap::new()));
            let will_be = total(self.usage_in(&after, owner, &uploads));
            if will_be > data_cap && will_be > was {
                return Err(endpoint(EndpointError::UsageIsOverDataCap));
            }
        }

        // accepted
        let mut accepted = Vec::with_capacity(updates.len());
        for diff in updates {
            let version = self.next_version();
            let id = diff.new.id();
            let content_version = match self.files.get(&id) {
                Some(old) if old.meta().document_hash == diff.new.meta.document_hash => {
                    old.content_version
                }
                _ => version,
            };
            let meta = ServerMeta {
                file: diff.new,
                metadata_version: version,
                content_version,
            };
            self.files.insert(id, meta.clone());
            accepted.push(meta);
        }
        for doc in documents {
            self.manifests.insert((doc.id, doc.hash), doc.manifest);
        }
        let files = &self.files;
        self.manifests.retain(|(id, hash), _| {
            files
                .get(id)
                .is_some_and(|f| f.meta().document_hash.as_ref() == Some(hash))
        });

        debug!(%caller, accepted = accepted.len(), version = self.version, "Upsert accepted");
        Ok(accepted)
    }

    fn authorize(
        &self,
        caller: &Username,
        before: &FileTree,
        after: &FileTree,
        new: &FileMetadata,
    ) -> Result<(), ServerError> {
        let can_write =
            |tree: &FileTree, id: &FileId| tree.access_mode(caller, id) >= Some(AccessMode::Write);

        let Some(old) = before.maybe_find(&new.id) else {
            if new.is_root() {
                return Err(validation("roots are created with the account"));
            }
            if !can_write(after, &new.parent) {
                return Err(endpoint(EndpointError::NotPermissioned));
            }
            return Ok(());
        };

        if old.is_root() {
            return Err(validation("roots cannot be modified"));
        }
        if old.owner != new.owner || old.owner_key != new.owner_key {
            return Err(endpoint(EndpointError::NotPermissioned));
        }
        if old.file_type != new.file_type {
            return Err(validation("file type cannot change"));
        }

        if can_write(before, &new.id) {
            if old.parent != new.parent && !can_write(after, &new.parent) {
                return Err(endpoint(EndpointError::NotPermissioned));
            }
            return Ok(());
        }

        if drops_own_grant(caller, old, new) {
            return Ok(());
        }
        Err(endpoint(EndpointError::NotPermissioned))
    }

    /// Manifests referenced by the batch, checked against the new metadata
    fn check_documents<'a>(
        &self,
        updates: &[FileDiff],
        documents: &'a [DocumentUpload],
    ) -> Result<HashMap<(FileId, DocumentHash), &'a DocumentManifest>, ServerError> {
        let mut uploads = HashMap::new();
        for doc in documents {
            let claimed = updates
                .iter()
                .find(|d| d.new.id() == doc.id)
                .and_then(|d| d.new.meta.document_hash.as_ref());
            if claimed != Some(&doc.hash) {
                return Err(validation(format!(
                    "document for {} does not match its metadata",
                    doc.id
                )));
            }
            if doc.manifest.hash() != doc.hash {
                return Err(validation(format!("manifest for {} is corrupted", doc.id)));
            }
            if let Some(missing) = doc.manifest.chunks.iter().find(|h| !self.chunks.contains_key(h)) {
                return Err(validation(format!("chunk {missing} was never uploaded")));
            }
            uploads.insert((doc.id, doc.hash.clone()), &doc.manifest);
        }

        for diff in updates {
            let new = &diff.new.meta;
            let Some(hash) = &new.document_hash else {
                continue;
            };
            let unchanged = self
                .files
                .get(&new.id)
                .is_some_and(|old| old.meta().document_hash.as_ref() == Some(hash));
            if !unchanged && !uploads.contains_key(&(new.id, hash.clone())) {
                return Err(endpoint(EndpointError::DocumentNotFound));
            }
        }
        Ok(uploads)
    }
}

/// True if the only change is `caller` revoking their own grant
fn drops_own_grant(caller: &Username, old: &FileMetadata, new: &FileMetadata) -> bool {
    if old.user_access_keys.len() != new.user_access_keys.len() {
        return false;
    }
    let keys_ok = old
        .user_access_keys
        .iter()
        .zip(&new.user_access_keys)
        .all(|(was, now)| {
            was == now
                || (&was.encrypted_for == caller && now.deleted && {
                    let mut revoked = was.clone();
                    revoked.deleted = true;
                    &revoked == now
                })
        });

    let mut normalized = new.clone();
    normalized.user_access_keys = old.user_access_keys.clone();
    normalized.last_modified = old.last_modified;
    normalized.last_modified_by = old.last_modified_by.clone();
    keys_ok && &normalized == old
}
