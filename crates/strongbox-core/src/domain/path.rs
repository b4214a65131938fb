//! Slash-separated paths over the visible tree
//!
//! The root is `/`. Folder paths end with `/`, document paths do not, so
//! `/Notes/` is a folder and `/Notes/todo.md` a document inside it.

use serde::{Deserialize, Serialize};

use super::errors::FileError;
use super::file::FileType;
use super::lazy::LazyTree;
use super::newtypes::FileId;

/// Subset of paths to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathFilter {
    DocumentsOnly,
    FoldersOnly,
    LeafNodesOnly,
}

fn components(path: &str) -> Result<Vec<&str>, FileError> {
    if path.is_empty() || path.contains("//") {
        return Err(FileError::PathContainsEmptyFileName);
    }
    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

impl LazyTree {
    /// Path of a visible file
    pub fn path_of(&mut self, id: &FileId) -> Result<String, FileError> {
        if !self.is_visible(id) {
            return Err(FileError::FileNonexistent);
        }

        let mut names = Vec::new();
        let mut current = *id;
        while let Some(parent) = self.resolved_parent(&current) {
            names.push(self.display_name(&current)?);
            current = parent;
        }
        names.reverse();

        let mut path = String::from("/");
        path.push_str(&names.join("/"));
        if self.find(id)?.is_folder() && !names.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    /// Visible file at `path`; a trailing `/` is optional
    pub fn get_by_path(&mut self, path: &str) -> Result<FileId, FileError> {
        let mut current = self.root()?;
        for name in components(path)? {
            current = self
                .child_named(&current, name)?
                .ok_or(FileError::FileNonexistent)?;
        }
        Ok(current)
    }

    /// Creates the file at `path` along with any missing folders
    ///
    /// A trailing `/` creates a folder, anything else a document.
    pub fn create_at_path(&mut self, path: &str) -> Result<FileId, FileError> {
        let file_type = if path.ends_with('/') {
            FileType::Folder
        } else {
            FileType::Document
        };
        self.create_along_path(path, file_type)
    }

    /// Creates a link to `target` at `path`, with any missing folders
    ///
    /// A trailing `/` is ignored; the link takes the type of its target.
    pub fn create_link_at_path(&mut self, path: &str, target: FileId) -> Result<FileId, FileError> {
        self.create_along_path(path, FileType::Link { target })
    }

    fn create_along_path(&mut self, path: &str, file_type: FileType) -> Result<FileId, FileError> {
        let names = components(path)?;
        let (last, intermediate) = names
            .split_last()
            .ok_or(FileError::PathTaken)?;

        let mut current = self.root()?;
        for name in intermediate {
            current = match self.child_named(&current, name)? {
                Some(existing) => {
                    if !self.find(&existing)?.is_folder() {
                        return Err(FileError::FileNotFolder);
                    }
                    existing
                }
                None => self.create(name, &current, FileType::Folder)?,
            };
        }

        if self.child_named(&current, last)?.is_some() {
            return Err(FileError::PathTaken);
        }
        self.create(last, &current, file_type)
    }

    /// Paths of visible files, sorted
    pub fn list_paths(&mut self, filter: Option<PathFilter>) -> Result<Vec<String>, FileError> {
        let mut paths = Vec::new();
        for id in self.visible_ids() {
            let file = self.find(&id)?;
            let keep = match filter {
                None => true,
                Some(PathFilter::DocumentsOnly) => file.is_document(),
                Some(PathFilter::FoldersOnly) => file.is_folder(),
                Some(PathFilter::LeafNodesOnly) => {
                    file.is_document() || self.visible_children(&id).is_empty()
                }
            };
            if keep {
                paths.push(self.path_of(&id)?);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Account;
    use crate::domain::newtypes::Username;
    use crate::domain::tree::FileTree;

    fn fresh() -> LazyTree {
        let account = Account::generate(Username::new("alice").unwrap(), "http://localhost");
        let root = LazyTree::create_root(&account).unwrap();
        LazyTree::new(account, FileTree::new([root]))
    }

    #[test]
    fn test_create_at_path_builds_folders() {
        let mut tree = fresh();
        let doc = tree.create_at_path("/Notes/2024/todo.md").unwrap();
        assert_eq!(tree.path_of(&doc).unwrap(), "/Notes/2024/todo.md");

        let folder = tree.get_by_path("/Notes/2024").unwrap();
        assert_eq!(tree.path_of(&folder).unwrap(), "/Notes/2024/");
        assert_eq!(tree.get_by_path("/Notes/2024/").unwrap(), folder);

        let created = tree.create_at_path("/Empty/").unwrap();
        assert!(tree.find(&created).unwrap().is_folder());
    }

    #[test]
    fn test_path_errors() {
        let mut tree = fresh();
        tree.create_at_path("/a.md").unwrap();
        assert_eq!(tree.create_at_path("/a.md"), Err(FileError::PathTaken));
        assert_eq!(
            tree.create_at_path("/a.md/b.md"),
            Err(FileError::FileNotFolder)
        );
        assert_eq!(
            tree.create_at_path("/x//y"),
            Err(FileError::PathContainsEmptyFileName)
        );
        assert_eq!(tree.get_by_path("/missing"), Err(FileError::FileNonexistent));
    }

    #[test]
    fn test_create_link_at_path_checks_target() {
        let mut tree = fresh();
        let own = tree.create_at_path("/mine.md").unwrap();
        assert_eq!(
            tree.create_link_at_path("/links/mine.md", own),
            Err(FileError::LinkTargetIsOwned)
        );
        assert_eq!(
            tree.create_link_at_path("/links/gone.md", FileId::new()),
            Err(FileError::LinkTargetNonexistent)
        );
        assert_eq!(
            tree.create_link_at_path("/mine.md", FileId::new()),
            Err(FileError::PathTaken)
        );
    }

    #[test]
    fn test_root_path() {
        let mut tree = fresh();
        let root = tree.root().unwrap();
        assert_eq!(tree.path_of(&root).unwrap(), "/");
        assert_eq!(tree.get_by_path("/").unwrap(), root);
    }

    #[test]
    fn test_list_paths_round_trip() {
        let mut tree = fresh();
        for path in ["/a/b/c.md", "/a/d.md", "/e/", "/f.txt"] {
            tree.create_at_path(path).unwrap();
        }

        let all = tree.list_paths(None).unwrap();
        assert_eq!(all.len(), 7);
        for path in &all {
            let id = tree.get_by_path(path).unwrap();
            assert_eq!(&tree.path_of(&id).unwrap(), path);
        }

        assert_eq!(
            tree.list_paths(Some(PathFilter::FoldersOnly)).unwrap(),
            vec!["/", "/a/", "/a/b/", "/e/"]
        );
        assert_eq!(
            tree.list_paths(Some(PathFilter::DocumentsOnly)).unwrap(),
            vec!["/a/b/c.md", "/a/d.md", "/f.txt"]
        );
        assert_eq!(
            tree.list_paths(Some(PathFilter::LeafNodesOnly)).unwrap(),
            vec!["/a/b/c.md", "/a/d.md", "/e/", "/f.txt"]
        );
    }
}
