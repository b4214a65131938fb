//! File tree operations
//!
//! Every mutation is validated against the whole tree and staged locally
//! with its change record; the server sees it on the next sync.

use std::collections::VecDeque;

use strongbox_core::domain::{File, FileError, FileId, FileType, PathFilter};
use tracing::debug;

use crate::Strongbox;

impl Strongbox {
    pub async fn get_root(&self) -> Result<File, FileError> {
        self.read(|tree| {
            let root = tree.root()?;
            tree.to_file(&root)
        })
        .await
    }

    /// Visible children of a folder (or of a link's target)
    pub async fn get_children(&self, id: FileId) -> Result<Vec<File>, FileError> {
        self.read(|tree| {
            if tree.is_deleted(&id) {
                return Err(FileError::FileNonexistent);
            }
            tree.visible_children(&id)
                .iter()
                .map(|child| tree.to_file(child))
                .collect()
        })
        .await
    }

    /// `id` followed by all of its visible descendants, breadth first
    pub async fn get_and_get_children_recursively(&self, id: FileId) -> Result<Vec<File>, FileError> {
        self.read(|tree| {
            if tree.is_deleted(&id) {
                return Err(FileError::FileNonexistent);
            }
            let mut files = vec![tree.to_file(&id)?];
            let mut queue = VecDeque::from([id]);
            while let Some(next) = queue.pop_front() {
                for child in tree.visible_children(&next) {
                    files.push(tree.to_file(&child)?);
                    queue.push_back(child);
                }
            }
            Ok(files)
        })
        .await
    }

    pub async fn get_file_by_id(&self, id: FileId) -> Result<File, FileError> {
        self.read(|tree| {
            if tree.is_deleted(&id) {
                return Err(FileError::FileNonexistent);
            }
            tree.to_file(&id)
        })
        .await
    }

    /// Every visible file
    pub async fn list_metadatas(&self) -> Result<Vec<File>, FileError> {
        self.read(|tree| tree.list_files()).await
    }

    pub async fn create_file(
        &self,
        name: &str,
        parent: FileId,
        file_type: FileType,
    ) -> Result<File, FileError> {
        let file = self
            .mutate(|tree| {
                let id = tree.create(name, &parent, file_type)?;
                tree.to_file(&id)
            })
            .await?;
        debug!(id = %file.id, file_type = file_type.name(), "File created");
        Ok(file)
    }

    pub async fn rename_file(&self, id: FileId, new_name: &str) -> Result<(), FileError> {
        self.mutate(|tree| tree.rename(&id, new_name)).await?;
        debug!(%id, "File renamed");
        Ok(())
    }

    pub async fn move_file(&self, id: FileId, new_parent: FileId) -> Result<(), FileError> {
        self.mutate(|tree| tree.move_file(&id, &new_parent)).await?;
        debug!(%id, %new_parent, "File moved");
        Ok(())
    }

    /// Deletes a file; folders take all their descendants with them
    pub async fn delete_file(&self, id: FileId) -> Result<(), FileError> {
        self.mutate(|tree| tree.delete(&id)).await?;
        debug!(%id, "File deleted");
        Ok(())
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Creates the file at `path` and any missing folders above it
    ///
    /// A trailing `/` creates a folder.
    pub async fn create_at_path(&self, path: &str) -> Result<File, FileError> {
        self.mutate(|tree| {
            let id = tree.create_at_path(path)?;
            tree.to_file(&id)
        })
        .await
    }

    /// Creates a link to `target` at `path` and any missing folders above it
    ///
    /// Linking a pending share accepts it, as with [`Strongbox::create_link`].
    pub async fn create_link_at_path(&self, path: &str, target: FileId) -> Result<File, FileError> {
        self.mutate(|tree| {
            let id = tree.create_link_at_path(path, target)?;
            tree.to_file(&id)
        })
        .await
    }

    pub async fn get_by_path(&self, path: &str) -> Result<File, FileError> {
        self.read(|tree| {
            let id = tree.get_by_path(path)?;
            tree.to_file(&id)
        })
        .await
    }

    pub async fn get_path_by_id(&self, id: FileId) -> Result<String, FileError> {
        self.read(|tree| tree.path_of(&id)).await
    }

    /// Sorted paths of visible files; folders end in `/`
    pub async fn list_paths(&self, filter: Option<PathFilter>) -> Result<Vec<String>, FileError> {
        self.read(|tree| tree.list_paths(filter)).await
    }

    pub async fn list_folder_paths(&self) -> Result<Vec<String>, FileError> {
        self.list_paths(Some(PathFilter::FoldersOnly)).await
    }
}
