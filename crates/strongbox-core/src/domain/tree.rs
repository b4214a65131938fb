//! Structural view over a set of file metadata
//!
//! [`FileTree`] works purely on the server-visible fields of
//! [`FileMetadata`], so both clients and the server use it to answer
//! structural questions and to validate a tree after a change.

use std::collections::{HashMap, HashSet};

use super::errors::ValidationFailure;
use super::file::{AccessMode, FileMetadata};
use super::newtypes::{FileId, Username};

/// A set of files indexed by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    files: HashMap<FileId, FileMetadata>,
}

impl FileTree {
    pub fn new(files: impl IntoIterator<Item = FileMetadata>) -> Self {
        Self {
            files: files.into_iter().map(|f| (f.id, f)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.keys().copied()
    }

    pub fn all(&self) -> impl Iterator<Item = &FileMetadata> {
        self.files.values()
    }

    pub fn maybe_find(&self, id: &FileId) -> Option<&FileMetadata> {
        self.files.get(id)
    }

    pub fn maybe_find_mut(&mut self, id: &FileId) -> Option<&mut FileMetadata> {
        self.files.get_mut(id)
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.files.contains_key(id)
    }

    /// Inserts or replaces a file, returning the previous record
    pub fn insert(&mut self, file: FileMetadata) -> Option<FileMetadata> {
        self.files.insert(file.id, file)
    }

    pub fn remove(&mut self, id: &FileId) -> Option<FileMetadata> {
        self.files.remove(id)
    }

    /// Parent record of `file`, unless it is a root or the parent is unknown
    pub fn maybe_find_parent(&self, file: &FileMetadata) -> Option<&FileMetadata> {
        if file.is_root() {
            None
        } else {
            self.files.get(&file.parent)
        }
    }

    /// The root owned by `owner`
    pub fn root_of(&self, owner: &Username) -> Option<&FileMetadata> {
        self.files
            .values()
            .find(|f| f.is_root() && &f.owner == owner)
    }

    /// Direct children of `id`, deleted ones included
    pub fn children(&self, id: &FileId) -> Vec<FileId> {
        self.files
            .values()
            .filter(|f| !f.is_root() && &f.parent == id)
            .map(|f| f.id)
            .collect()
    }

    /// Every file below `id`, breadth first
    pub fn descendants(&self, id: &FileId) -> Vec<FileId> {
        let mut by_parent: HashMap<FileId, Vec<FileId>> = HashMap::new();
        for file in self.files.values().filter(|f| !f.is_root()) {
            by_parent.entry(file.parent).or_default().push(file.id);
        }

        let mut result = Vec::new();
        let mut seen = HashSet::from([*id]);
        let mut frontier = vec![*id];
        while let Some(current) = frontier.pop() {
            for child in by_parent.get(&current).into_iter().flatten() {
                if seen.insert(*child) {
                    result.push(*child);
                    frontier.push(*child);
                }
            }
        }
        result
    }

    /// Ancestors of `id` from its parent upwards
    ///
    /// Stops at a root, at an unknown parent, or when a cycle closes.
    pub fn ancestors(&self, id: &FileId) -> Vec<FileId> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([*id]);
        let mut current = match self.files.get(id) {
            Some(file) => file,
            None => return result,
        };
        while let Some(parent) = self.maybe_find_parent(current) {
            if !seen.insert(parent.id) {
                break;
            }
            result.push(parent.id);
            current = parent;
        }
        result
    }

    /// True if `candidate` is `id` or one of its descendants
    pub fn is_self_or_descendant(&self, candidate: &FileId, id: &FileId) -> bool {
        candidate == id || self.ancestors(candidate).contains(id)
    }

    /// Deleted explicitly, or implicitly through a deleted ancestor
    pub fn is_deleted(&self, id: &FileId) -> bool {
        match self.files.get(id) {
            Some(file) if file.deleted => true,
            Some(_) => self
                .ancestors(id)
                .iter()
                .filter_map(|a| self.files.get(a))
                .any(|f| f.deleted),
            None => false,
        }
    }

    /// Strongest access `user` holds on `id`
    ///
    /// Owners have [`AccessMode::Owner`]. Otherwise the strongest live grant
    /// on the file or any ancestor applies.
    pub fn access_mode(&self, user: &Username, id: &FileId) -> Option<AccessMode> {
        let file = self.files.get(id)?;
        if &file.owner == user {
            return Some(AccessMode::Owner);
        }

        std::iter::once(*id)
            .chain(self.ancestors(id))
            .filter_map(|a| self.files.get(&a))
            .flat_map(|f| f.user_access_keys.iter())
            .filter(|k| !k.deleted && &k.encrypted_for == user)
            .map(|k| k.mode)
            .max()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks every structural rule, returning the first violation found
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        self.assert_no_orphans()?;
        self.assert_only_folders_have_children()?;
        self.assert_all_files_same_owner_as_parent()?;
        self.assert_no_cycles()?;
        self.assert_no_path_conflicts()?;
        self.assert_no_shared_links()?;
        self.assert_no_duplicate_links()?;
        self.assert_no_broken_links()?;
        self.assert_no_owned_links()?;
        Ok(())
    }

    fn sorted_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.files.keys().copied().collect();
        ids.sort();
        ids
    }

    // Files shared directly with someone may arrive without their parent.
    fn assert_no_orphans(&self) -> Result<(), ValidationFailure> {
        for id in self.sorted_ids() {
            let file = &self.files[&id];
            if !file.is_root()
                && !self.files.contains_key(&file.parent)
                && file.user_access_keys.is_empty()
            {
                return Err(ValidationFailure::Orphan(id));
            }
        }
        Ok(())
    }

    fn assert_only_folders_have_children(&self) -> Result<(), ValidationFailure> {
        for id in self.sorted_ids() {
            let file = &self.files[&id];
            if let Some(parent) = self.maybe_find_parent(file) {
                if !parent.is_folder() {
                    return Err(ValidationFailure::NonFolderWithChildren(parent.id));
                }
            }
        }
        Ok(())
    }

    // Deleted files are exempt so moving a folder that holds tombstones
    // between owners does not require touching them.
    fn assert_all_files_same_owner_as_parent(&self) -> Result<(), ValidationFailure> {
        for id in self.sorted_ids() {
            if self.is_deleted(&id) {
                continue;
            }
            let file = &self.files[&id];
            if let Some(parent) = self.maybe_find_parent(file) {
                if parent.owner != file.owner {
                    return Err(ValidationFailure::FileWithDifferentOwnerParent(id));
                }
            }
        }
        Ok(())
    }

    fn assert_no_cycles(&self) -> Result<(), ValidationFailure> {
        let mut roots_by_owner: HashSet<&Username> = HashSet::new();
        for file in self.files.values().filter(|f| f.is_root()) {
            if !roots_by_owner.insert(&file.owner) {
                return Err(ValidationFailure::Cycle(HashSet::from([file.id])));
            }
        }

        let mut known_acyclic: HashSet<FileId> = HashSet::new();
        for id in self.sorted_ids() {
            let mut path = HashSet::new();
            let mut current = &self.files[&id];
            loop {
                if current.is_root() || known_acyclic.contains(&current.id) {
                    break;
                }
                if !path.insert(current.id) {
                    return Err(ValidationFailure::Cycle(path));
                }
                match self.files.get(&current.parent) {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            known_acyclic.extend(path);
        }
        Ok(())
    }

    fn assert_no_path_conflicts(&self) -> Result<(), ValidationFailure> {
        let mut by_name: HashMap<(FileId, [u8; 32]), FileId> = HashMap::new();
        for id in self.sorted_ids() {
            let file = &self.files[&id];
            if file.is_root() || self.is_deleted(&id) {
                continue;
            }
            if let Some(existing) = by_name.insert((file.parent, file.name.hmac), id) {
                return Err(ValidationFailure::PathConflict(HashSet::from([existing, id])));
            }
        }
        Ok(())
    }

    fn assert_no_shared_links(&self) -> Result<(), ValidationFailure> {
        for id in self.sorted_ids() {
            let file = &self.files[&id];
            if !file.is_link() || self.is_deleted(&id) {
                continue;
            }
            if file.is_shared() {
                return Err(ValidationFailure::SharedLink {
                    link: id,
                    shared_ancestor: id,
                });
            }
            for ancestor in self.ancestors(&id) {
                if self.files[&ancestor].is_shared() {
                    return Err(ValidationFailure::SharedLink {
                        link: id,
                        shared_ancestor: ancestor,
                    });
                }
            }
        }
        Ok(())
    }

    fn assert_no_duplicate_links(&self) -> Result<(), ValidationFailure> {
        let mut linked: HashSet<(&Username, FileId)> = HashSet::new();
        for id in self.sorted_ids() {
            if self.is_deleted(&id) {
                continue;
            }
            let file = &self.files[&id];
            if let Some(target) = file.link_target() {
                if !linked.insert((&file.owner, target)) {
                    return Err(ValidationFailure::DuplicateLink { target });
                }
            }
        }
        Ok(())
    }

    // A link to a deleted target is not broken, or no one could delete a
    // file that another user has linked.
    fn assert_no_broken_links(&self) -> Result<(), ValidationFailure> {
        for id in self.sorted_ids() {
            let file = &self.files[&id];
            if let Some(target) = file.link_target() {
                if !self.is_deleted(&id) && !self.files.contains_key(&target) {
                    return Err(ValidationFailure::BrokenLink(id));
                }
            }
        }
        Ok(())
    }

    fn assert_no_owned_links(&self) -> Result<(), ValidationFailure> {
        for id in self.sorted_ids() {
            let file = &self.files[&id];
            if let Some(target) = file.link_target().and_then(|t| self.files.get(&t)) {
                if !self.is_deleted(&id) && target.owner == file.owner {
                    return Err(ValidationFailure::OwnedLink(id));
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<FileMetadata> for FileTree {
    fn from_iter<I: IntoIterator<Item = FileMetadata>>(iter: I) -> Self {
        Self::new(iter)
    }
}
