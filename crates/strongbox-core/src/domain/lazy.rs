//! Decrypting view of a file tree with validated mutations
//!
//! [`LazyTree`] wraps a [`FileTree`] together with the account that reads
//! it. Keys and names are decrypted on demand and memoized. Mutators come in
//! two flavors: the plain ones check permissions and validate the resulting
//! tree (rolling back on failure), the `_unvalidated` ones only apply the
//! change and are used by the sync merge, which validates once at the end.
//!
//! Files shared with the account appear in listings only once accepted,
//! i.e. once a link to them exists. They then show up at the link's
//! location under the link's name.

use std::collections::{HashMap, HashSet};

use strongbox_crypto::{generate_key, keyed_hmac, PublicKeys, SymmetricKey};

use super::account::Account;
use super::change::{ChangeKind, ChangeRecord};
use super::errors::{FileError, ValidationFailure};
use super::file::{
    AccessMode, File, FileMetadata, FileType, SecretFileName, Share, ShareMode, UserAccessKey,
};
use super::newtypes::{DocumentHash, FileId, Username};
use super::tree::FileTree;

/// Tree plus decryption and mutation state for one account
#[derive(Debug, Clone)]
pub struct LazyTree {
    tree: FileTree,
    account: Account,
    keys: HashMap<FileId, SymmetricKey>,
    names: HashMap<FileId, String>,
    /// (metadata version, content version) of the last synced copies
    versions: HashMap<FileId, (u64, u64)>,
    staged: HashSet<FileId>,
    changes: Vec<ChangeRecord>,
}

impl LazyTree {
    pub fn new(account: Account, tree: FileTree) -> Self {
        Self {
            tree,
            account,
            keys: HashMap::new(),
            names: HashMap::new(),
            versions: HashMap::new(),
            staged: HashSet::new(),
            changes: Vec::new(),
        }
    }

    pub fn with_versions(mut self, versions: HashMap<FileId, (u64, u64)>) -> Self {
        self.versions = versions;
        self
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    fn me(&self) -> &Username {
        self.account.username()
    }

    pub fn version_of(&self, id: &FileId) -> (u64, u64) {
        self.versions.get(id).copied().unwrap_or((0, 0))
    }

    /// Records changed since this tree was built or last drained
    pub fn staged(&self) -> Vec<FileMetadata> {
        let mut ids: Vec<&FileId> = self.staged.iter().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| self.tree.maybe_find(id).cloned())
            .collect()
    }

    pub fn staged_ids(&self) -> &HashSet<FileId> {
        &self.staged
    }

    /// Drains the change records produced by mutators
    pub fn take_changes(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.changes)
    }

    pub fn validate(&self) -> Result<(), ValidationFailure> {
        self.tree.validate()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn find(&self, id: &FileId) -> Result<&FileMetadata, FileError> {
        self.tree.maybe_find(id).ok_or(FileError::FileNonexistent)
    }

    pub fn maybe_find(&self, id: &FileId) -> Option<&FileMetadata> {
        self.tree.maybe_find(id)
    }

    /// Id of this account's root folder
    pub fn root(&self) -> Result<FileId, FileError> {
        self.tree
            .root_of(self.me())
            .map(|f| f.id)
            .ok_or(FileError::RootNonexistent)
    }

    pub fn is_deleted(&self, id: &FileId) -> bool {
        self.tree.is_deleted(id)
    }

    pub fn access_mode(&self, id: &FileId) -> Option<AccessMode> {
        self.tree.access_mode(self.me(), id)
    }

    /// A live link of this account pointing at `target`
    pub fn link_for(&self, target: &FileId) -> Option<FileId> {
        let me = self.me();
        self.tree
            .all()
            .filter(|f| f.link_target() == Some(*target) && &f.owner == me)
            .map(|f| f.id)
            .find(|id| !self.tree.is_deleted(id))
    }

    /// True for a file shared with this account whose parent is not visible
    pub fn is_share_root(&self, id: &FileId) -> bool {
        match self.tree.maybe_find(id) {
            Some(file) => {
                &file.owner != self.me()
                    && !file.is_root()
                    && !self.tree.contains(&file.parent)
            }
            None => false,
        }
    }

    /// The target of a link, or the id itself
    pub fn resolve_link(&self, id: &FileId) -> FileId {
        self.tree
            .maybe_find(id)
            .and_then(FileMetadata::link_target)
            .unwrap_or(*id)
    }

    /// For an accepted share root, the link representing it
    fn redirect_to_link(&self, id: &FileId) -> FileId {
        if self.is_share_root(id) {
            self.link_for(id).unwrap_or(*id)
        } else {
            *id
        }
    }

    /// Parent as presented to the account
    ///
    /// Share roots hang under the folder that holds their link.
    pub fn resolved_parent(&self, id: &FileId) -> Option<FileId> {
        let file = self.tree.maybe_find(id)?;
        if file.is_root() {
            return None;
        }
        if self.tree.contains(&file.parent) {
            return Some(file.parent);
        }
        self.link_for(id)
            .and_then(|link| self.tree.maybe_find(&link))
            .map(|link| link.parent)
    }

    /// Reachable from this account's root through live, non-link files
    pub fn is_visible(&self, id: &FileId) -> bool {
        let mut seen = HashSet::new();
        let mut current = *id;
        loop {
            if !seen.insert(current) {
                return false;
            }
            let file = match self.tree.maybe_find(&current) {
                Some(file) => file,
                None => return false,
            };
            if file.deleted || file.is_link() {
                return false;
            }
            if file.is_root() {
                return &file.owner == self.me();
            }
            match self.resolved_parent(&current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn visible_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.tree.ids().filter(|id| self.is_visible(id)).collect();
        ids.sort();
        ids
    }

    /// Visible files whose presented parent is `id` (links are followed)
    pub fn visible_children(&self, id: &FileId) -> Vec<FileId> {
        let id = self.resolve_link(id);
        self.visible_ids()
            .into_iter()
            .filter(|child| child != &id && self.resolved_parent(child) == Some(id))
            .collect()
    }

    /// Shared roots this account can read but has neither linked nor rejected
    pub fn pending_shares(&self) -> Vec<FileId> {
        let me = self.me();
        let mut ids: Vec<FileId> = self
            .tree
            .all()
            .filter(|f| self.is_share_root(&f.id))
            .filter(|f| f.access_key_for(me).is_some())
            .filter(|f| !self.tree.is_deleted(&f.id))
            .filter(|f| self.link_for(&f.id).is_none())
            .map(|f| f.id)
            .collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // Decryption
    // ========================================================================

    /// The symmetric key of `id`
    ///
    /// Walks up until a cached key or a key wrapped for this account is
    /// found, then unwraps back down, caching every key on the way.
    pub fn decrypt_key(&mut self, id: &FileId) -> Result<SymmetricKey, FileError> {
        let me = self.account.username().clone();
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = *id;

        let mut key = loop {
            if let Some(key) = self.keys.get(&current) {
                break key.clone();
            }
            if !visited.insert(current) {
                return Err(FileError::Unexpected(format!("cycle above {id}")));
            }
            let file = self.tree.maybe_find(&current).ok_or(FileError::FileNonexistent)?;
            if let Some(access) = file.access_key_for(&me) {
                let key = self
                    .account
                    .key()
                    .shared_key(&access.encrypted_by_key)
                    .unwrap_key(&access.encrypted_key)?;
                self.keys.insert(current, key.clone());
                break key;
            }
            if file.is_root() || !self.tree.contains(&file.parent) {
                return Err(FileError::FileParentNonexistent);
            }
            chain.push(current);
            current = file.parent;
        };

        for child in chain.into_iter().rev() {
            let file = self.tree.maybe_find(&child).ok_or(FileError::FileNonexistent)?;
            key = key.unwrap_key(&file.folder_access_key)?;
            self.keys.insert(child, key.clone());
        }
        Ok(key)
    }

    /// Decrypted name of `id`
    pub fn name(&mut self, id: &FileId) -> Result<String, FileError> {
        if let Some(name) = self.names.get(id) {
            return Ok(name.clone());
        }
        let key = self.decrypt_key(id)?;
        let encrypted = self.find(id)?.name.encrypted.clone();
        let name = String::from_utf8(key.decrypt(&encrypted)?)
            .map_err(|e| FileError::Unexpected(format!("file name is not utf-8: {e}")))?;
        self.names.insert(*id, name.clone());
        Ok(name)
    }

    /// Name as presented to the account: accepted shares use their link's name
    pub fn display_name(&mut self, id: &FileId) -> Result<String, FileError> {
        let shown = self.redirect_to_link(id);
        self.name(&shown)
    }

    pub fn to_file(&mut self, id: &FileId) -> Result<File, FileError> {
        let name = self.display_name(id)?;
        let meta = self.find(id)?;
        let parent = if meta.is_root() {
            *id
        } else {
            self.resolved_parent(id).unwrap_or(meta.parent)
        };
        let shares = meta
            .user_access_keys
            .iter()
            .filter(|k| !k.deleted && k.encrypted_for != meta.owner)
            .map(|k| Share {
                shared_by: k.encrypted_by.clone(),
                shared_with: k.encrypted_for.clone(),
                mode: match k.mode {
                    AccessMode::Read => ShareMode::Read,
                    AccessMode::Write | AccessMode::Owner => ShareMode::Write,
                },
            })
            .collect();
        let (metadata_version, content_version) = self.version_of(id);

        Ok(File {
            id: *id,
            parent,
            name,
            file_type: meta.file_type,
            owner: meta.owner.clone(),
            last_modified: meta.last_modified,
            last_modified_by: meta.last_modified_by.clone(),
            shares,
            metadata_version,
            content_version,
            size: meta.document_size,
        })
    }

    /// Every visible file, decrypted
    pub fn list_files(&mut self) -> Result<Vec<File>, FileError> {
        self.visible_ids()
            .iter()
            .map(|id| self.to_file(id))
            .collect()
    }

    /// Visible child of `parent` named `name`
    pub fn child_named(&mut self, parent: &FileId, name: &str) -> Result<Option<FileId>, FileError> {
        for child in self.visible_children(parent) {
            if self.display_name(&child)? == name {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Account root
    // ========================================================================

    /// A new root folder for `account`, keyed to itself
    pub fn create_root(account: &Account) -> Result<FileMetadata, FileError> {
        let id = FileId::new();
        let key = generate_key();
        let me = account.username().clone();
        let name = me.as_str().as_bytes();
        let access = UserAccessKey {
            encrypted_by: me.clone(),
            encrypted_by_key: account.public_keys(),
            encrypted_for: me.clone(),
            encrypted_for_key: account.public_keys(),
            mode: AccessMode::Owner,
            encrypted_key: account.key().shared_key(&account.public_keys()).wrap(&key)?,
            deleted: false,
        };
        Ok(FileMetadata {
            id,
            parent: id,
            file_type: FileType::Folder,
            name: SecretFileName {
                encrypted: key.encrypt(name)?,
                hmac: keyed_hmac(&key, name),
            },
            owner: me.clone(),
            owner_key: account.public_keys(),
            deleted: false,
            document_hash: None,
            document_size: None,
            user_access_keys: vec![access],
            folder_access_key: key.wrap(&key)?,
            last_modified: chrono::Utc::now().timestamp_millis(),
            last_modified_by: me,
        })
    }

    // ========================================================================
    // Validated mutators
    // ========================================================================

    fn require_live(&self, id: &FileId) -> Result<&FileMetadata, FileError> {
        if self.tree.is_deleted(id) {
            return Err(FileError::FileNonexistent);
        }
        self.find(id)
    }

    fn require_write(&self, id: &FileId) -> Result<(), FileError> {
        if self.access_mode(id) < Some(AccessMode::Write) {
            return Err(FileError::InsufficientPermission);
        }
        Ok(())
    }

    /// Runs `op`, validates, and restores the previous state on any failure
    fn validated<T>(
        &mut self,
        map_failure: fn(ValidationFailure) -> FileError,
        op: impl FnOnce(&mut Self) -> Result<T, FileError>,
    ) -> Result<T, FileError> {
        let tree = self.tree.clone();
        let names = self.names.clone();
        let staged = self.staged.clone();
        let changes = self.changes.len();

        let result = op(self).and_then(|value| match self.tree.validate() {
            Ok(()) => Ok(value),
            Err(failure) => Err(map_failure(failure)),
        });

        if result.is_err() {
            self.tree = tree;
            self.names = names;
            self.staged = staged;
            self.changes.truncate(changes);
        }
        result
    }

    /// Creates a document, folder or link under `parent`
    pub fn create(
        &mut self,
        name: &str,
        parent: &FileId,
        file_type: FileType,
    ) -> Result<FileId, FileError> {
        super::filename::validate_name(name)?;
        let parent = self.resolve_link(parent);
        let parent_meta = self
            .require_live(&parent)
            .map_err(|_| FileError::FileParentNonexistent)?;
        if !parent_meta.is_folder() {
            return Err(FileError::FileNotFolder);
        }
        self.require_write(&parent)?;
        if let FileType::Link { target } = file_type {
            if !self.tree.contains(&target) {
                return Err(FileError::LinkTargetNonexistent);
            }
        }

        let id = FileId::new();
        self.validated(FileError::from_naming_failure, |tree| {
            tree.create_unvalidated(id, name, &parent, file_type)
        })
    }

    pub fn rename(&mut self, id: &FileId, name: &str) -> Result<(), FileError> {
        super::filename::validate_name(name)?;
        let id = self.redirect_to_link(id);
        if self.require_live(&id)?.is_root() {
            return Err(FileError::RootModificationInvalid);
        }
        self.require_write(&id)?;
        self.validated(FileError::from_naming_failure, |tree| {
            tree.rename_unvalidated(&id, name)
        })
    }

    pub fn move_file(&mut self, id: &FileId, new_parent: &FileId) -> Result<(), FileError> {
        let id = self.redirect_to_link(id);
        let new_parent = self.resolve_link(new_parent);
        let file = self.require_live(&id)?;
        if file.is_root() {
            return Err(FileError::RootModificationInvalid);
        }
        let owner = file.owner.clone();
        let parent_meta = self
            .require_live(&new_parent)
            .map_err(|_| FileError::FileParentNonexistent)?;
        if !parent_meta.is_folder() {
            return Err(FileError::FileNotFolder);
        }
        if parent_meta.owner != owner {
            return Err(FileError::InsufficientPermission);
        }
        if self.tree.is_self_or_descendant(&new_parent, &id) {
            return Err(FileError::FolderMovedIntoItself);
        }
        self.require_write(&id)?;
        self.require_write(&new_parent)?;

        self.validated(FileError::from_move_failure, |tree| {
            tree.move_unvalidated(&id, &new_parent)
        })
    }

    /// Tombstones `id` and every descendant
    pub fn delete(&mut self, id: &FileId) -> Result<(), FileError> {
        let id = self.redirect_to_link(id);
        if self.require_live(&id)?.is_root() {
            return Err(FileError::RootModificationInvalid);
        }
        // removing one's own link never needs write access to the target
        if !self.find(&id)?.is_link() {
            self.require_write(&id)?;
        }
        self.validated(FileError::from, |tree| tree.delete_unvalidated(&id))
    }

    /// Grants `username` access to `id`
    pub fn add_share(
        &mut self,
        id: &FileId,
        username: &Username,
        their_keys: PublicKeys,
        mode: ShareMode,
    ) -> Result<(), FileError> {
        let file = self.require_live(id)?;
        if file.is_root() {
            return Err(FileError::RootModificationInvalid);
        }
        if file.is_link() {
            return Err(FileError::LinkInSharedFolder);
        }
        if username == &file.owner || username == self.me() {
            return Err(FileError::ShareAlreadyExists);
        }
        let held = self.access_mode(id);
        if held < Some(AccessMode::Write) || held < Some(AccessMode::from(mode)) {
            return Err(FileError::InsufficientPermission);
        }
        if let Some(existing) = file.access_key_for(username) {
            if existing.mode >= AccessMode::from(mode) {
                return Err(FileError::ShareAlreadyExists);
            }
        }

        let id = *id;
        let username = username.clone();
        self.validated(FileError::from, |tree| {
            tree.add_share_unvalidated(&id, &username, their_keys, mode)
        })
    }

    /// Revokes a share; `None` drops this account's own grant (rejecting it)
    pub fn delete_share(&mut self, id: &FileId, username: Option<&Username>) -> Result<(), FileError> {
        let target = username.unwrap_or(self.me()).clone();
        let file = self.find(id)?;
        if file.access_key_for(&target).is_none() {
            return Err(FileError::ShareNonexistent);
        }
        if &target != self.me() {
            self.require_write(id)?;
        }
        let id = *id;
        self.validated(FileError::from, |tree| {
            tree.delete_share_unvalidated(&id, &target)
        })
    }

    /// Points a document at new content
    pub fn update_document(
        &mut self,
        id: &FileId,
        hash: DocumentHash,
        size: u64,
    ) -> Result<(), FileError> {
        if !self.require_live(id)?.is_document() {
            return Err(FileError::FileNotDocument);
        }
        self.require_write(id)?;
        self.update_document_unvalidated(id, hash, size)
    }

    // ========================================================================
    // Unvalidated mutators
    // ========================================================================

    fn touch(&mut self, id: &FileId) {
        let me = self.account.username().clone();
        if let Some(file) = self.tree.maybe_find_mut(id) {
            let now = chrono::Utc::now().timestamp_millis();
            file.last_modified = now.max(file.last_modified + 1);
            file.last_modified_by = me;
        }
        self.staged.insert(*id);
    }

    fn record(&mut self, id: &FileId, kind: ChangeKind) {
        let base_version = self.version_of(id).0;
        self.changes.push(ChangeRecord::new(*id, kind, base_version));
    }

    /// Inserts a record as-is, e.g. one received from the server
    pub fn insert_unvalidated(&mut self, meta: FileMetadata) {
        self.names.remove(&meta.id);
        self.tree.insert(meta);
    }

    /// Inserts a local record and marks it staged
    pub fn stage_unvalidated(&mut self, meta: FileMetadata) {
        self.staged.insert(meta.id);
        self.insert_unvalidated(meta);
    }

    /// Forgets a file entirely
    pub fn remove_unvalidated(&mut self, id: &FileId) -> Option<FileMetadata> {
        self.names.remove(id);
        self.keys.remove(id);
        self.staged.remove(id);
        self.tree.remove(id)
    }

    pub fn create_unvalidated(
        &mut self,
        id: FileId,
        name: &str,
        parent: &FileId,
        file_type: FileType,
    ) -> Result<FileId, FileError> {
        let parent_key = self.decrypt_key(parent)?;
        let parent_meta = self.find(parent)?;
        let owner = parent_meta.owner.clone();
        let owner_key = parent_meta.owner_key;
        let key = generate_key();

        let meta = FileMetadata {
            id,
            parent: *parent,
            file_type,
            name: SecretFileName {
                encrypted: key.encrypt(name.as_bytes())?,
                hmac: keyed_hmac(&parent_key, name.as_bytes()),
            },
            owner,
            owner_key,
            deleted: false,
            document_hash: None,
            document_size: None,
            user_access_keys: Vec::new(),
            folder_access_key: parent_key.wrap(&key)?,
            last_modified: 0,
            last_modified_by: self.me().clone(),
        };

        self.tree.insert(meta);
        self.keys.insert(id, key);
        self.names.insert(id, name.to_string());
        self.touch(&id);
        self.record(&id, ChangeKind::Create);
        Ok(id)
    }

    pub fn rename_unvalidated(&mut self, id: &FileId, name: &str) -> Result<(), FileError> {
        let key = self.decrypt_key(id)?;
        let file = self.find(id)?;
        let hmac_key = if file.is_root() {
            key.clone()
        } else {
            let parent = file.parent;
            self.decrypt_key(&parent)?
        };
        let encrypted = key.encrypt(name.as_bytes())?;

        if let Some(file) = self.tree.maybe_find_mut(id) {
            file.name = SecretFileName {
                encrypted,
                hmac: keyed_hmac(&hmac_key, name.as_bytes()),
            };
        }
        self.names.insert(*id, name.to_string());
        self.touch(id);
        self.record(id, ChangeKind::Rename);
        Ok(())
    }

    pub fn move_unvalidated(&mut self, id: &FileId, new_parent: &FileId) -> Result<(), FileError> {
        let key = self.decrypt_key(id)?;
        let name = self.name(id)?;
        let parent_key = self.decrypt_key(new_parent)?;
        let folder_access_key = parent_key.wrap(&key)?;

        if let Some(file) = self.tree.maybe_find_mut(id) {
            file.parent = *new_parent;
            file.folder_access_key = folder_access_key;
            file.name.hmac = keyed_hmac(&parent_key, name.as_bytes());
        }
        self.touch(id);
        self.record(id, ChangeKind::Move);
        Ok(())
    }

    pub fn delete_unvalidated(&mut self, id: &FileId) -> Result<(), FileError> {
        let mut targets = vec![*id];
        targets.extend(self.tree.descendants(id));
        for target in targets {
            let already = self.find(&target)?.deleted;
            if already {
                continue;
            }
            if let Some(file) = self.tree.maybe_find_mut(&target) {
                file.deleted = true;
            }
            self.touch(&target);
            self.record(&target, ChangeKind::Delete);
        }
        Ok(())
    }

    /// Clears the tombstone of `id` and of every deleted ancestor
    pub fn undelete_unvalidated(&mut self, id: &FileId) -> Result<(), FileError> {
        let mut targets = vec![*id];
        targets.extend(self.tree.ancestors(id));
        for target in targets {
            if self.find(&target)?.deleted {
                if let Some(file) = self.tree.maybe_find_mut(&target) {
                    file.deleted = false;
                }
                self.touch(&target);
            }
        }
        Ok(())
    }

    pub fn add_share_unvalidated(
        &mut self,
        id: &FileId,
        username: &Username,
        their_keys: PublicKeys,
        mode: ShareMode,
    ) -> Result<(), FileError> {
        let key = self.decrypt_key(id)?;
        let access = UserAccessKey {
            encrypted_by: self.me().clone(),
            encrypted_by_key: self.account.public_keys(),
            encrypted_for: username.clone(),
            encrypted_for_key: their_keys,
            mode: AccessMode::from(mode),
            encrypted_key: self.account.key().shared_key(&their_keys).wrap(&key)?,
            deleted: false,
        };

        if let Some(file) = self.tree.maybe_find_mut(id) {
            for existing in file
                .user_access_keys
                .iter_mut()
                .filter(|k| !k.deleted && &k.encrypted_for == username)
            {
                existing.deleted = true;
            }
            file.user_access_keys.push(access);
        }
        self.touch(id);
        self.record(id, ChangeKind::ShareGrant);
        Ok(())
    }

    pub fn delete_share_unvalidated(
        &mut self,
        id: &FileId,
        username: &Username,
    ) -> Result<(), FileError> {
        let file = self.tree.maybe_find_mut(id).ok_or(FileError::FileNonexistent)?;
        for key in file
            .user_access_keys
            .iter_mut()
            .filter(|k| !k.deleted && &k.encrypted_for == username)
        {
            key.deleted = true;
        }
        self.touch(id);
        self.record(id, ChangeKind::ShareRevoke);
        Ok(())
    }

    pub fn update_document_unvalidated(
        &mut self,
        id: &FileId,
        hash: DocumentHash,
        size: u64,
    ) -> Result<(), FileError> {
        let file = self.tree.maybe_find_mut(id).ok_or(FileError::FileNonexistent)?;
        file.document_hash = Some(hash);
        file.document_size = Some(size);
        self.touch(id);
        self.record(id, ChangeKind::Edit);
        Ok(())
    }
}
