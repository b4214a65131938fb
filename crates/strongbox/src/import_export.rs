//! Copying between the local disk and the tree
//!
//! Imports take files and folders from disk recursively; a name already
//! used in the destination gets the next free `-N` variant. Exports write a
//! file or folder tree to disk and refuse to overwrite unless editing.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use strongbox_core::domain::{File, FileError, FileId, FileType, LazyTree, NameComponents};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::errors::ImportExportError;
use crate::Strongbox;

/// Import progress, in order: one total, then a start and finish per item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    /// Files and folders that will be imported
    CalculatedTotal(usize),
    StartingItem(PathBuf),
    FinishedItem(File),
}

/// One file or folder written by an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportProgress {
    pub disk_path: PathBuf,
    pub file: File,
}

impl Strongbox {
    /// Imports `sources` into the folder `dest`
    ///
    /// Returns the top-level files created, one per source.
    #[instrument(skip(self, progress))]
    pub async fn import_files(
        &self,
        sources: &[PathBuf],
        dest: FileId,
        progress: Option<&(dyn Fn(ImportStatus) + Send + Sync)>,
    ) -> Result<Vec<File>, ImportExportError> {
        let report = |status| {
            if let Some(progress) = progress {
                progress(status);
            }
        };

        self.read(|tree| {
            let dest = tree.resolve_link(&dest);
            if tree.is_deleted(&dest) || !tree.find(&dest)?.is_folder() {
                return Err(FileError::FileNotFolder);
            }
            Ok(())
        })
        .await?;

        let mut total = 0;
        for source in sources {
            total += count_entries(source).await?;
        }
        report(ImportStatus::CalculatedTotal(total));

        let mut imported = Vec::with_capacity(sources.len());
        let mut queue: VecDeque<(PathBuf, FileId, bool)> =
            sources.iter().map(|s| (s.clone(), dest, true)).collect();

        while let Some((disk_path, parent, top_level)) = queue.pop_front() {
            report(ImportStatus::StartingItem(disk_path.clone()));
            let name = disk_name(&disk_path)?;
            let meta = fs::metadata(&disk_path).await.map_err(|e| disk_invalid(&disk_path, e))?;

            let file = if meta.is_dir() {
                let folder = self
                    .mutate(|tree| {
                        let name = available_name(tree, &parent, &name)?;
                        let id = tree.create(&name, &parent, FileType::Folder)?;
                        tree.to_file(&id)
                    })
                    .await?;
                for child in sorted_dir(&disk_path).await? {
                    queue.push_back((child, folder.id, false));
                }
                folder
            } else {
                let content = fs::read(&disk_path)
                    .await
                    .map_err(|e| disk_invalid(&disk_path, e))?;
                self.import_document(&parent, &name, &content).await?
            };

            debug!(path = %disk_path.display(), id = %file.id, "Imported");
            report(ImportStatus::FinishedItem(file.clone()));
            if top_level {
                imported.push(file);
            }
        }

        info!(total, "Import finished");
        Ok(imported)
    }

    /// Writes `id`, and its descendants for a folder, into `dest_dir`
    ///
    /// With `edit`, existing disk files are overwritten and existing folders
    /// reused; otherwise any collision fails with `DiskPathTaken`.
    #[instrument(skip(self, progress))]
    pub async fn export_file(
        &self,
        id: FileId,
        dest_dir: &Path,
        edit: bool,
        progress: Option<&(dyn Fn(ExportProgress) + Send + Sync)>,
    ) -> Result<(), ImportExportError> {
        let dest_meta = fs::metadata(dest_dir)
            .await
            .map_err(|e| disk_invalid(dest_dir, e))?;
        if !dest_meta.is_dir() {
            return Err(ImportExportError::DiskPathInvalid(format!(
                "{} is not a directory",
                dest_dir.display()
            )));
        }

        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        let id = tree.resolve_link(&id);
        if tree.is_deleted(&id) {
            return Err(ImportExportError::FileNonexistent);
        }

        let mut written = 0;
        let mut queue = VecDeque::from([(tree.to_file(&id)?, dest_dir.to_path_buf())]);
        while let Some((file, parent_dir)) = queue.pop_front() {
            if file.name == "." || file.name == ".." {
                return Err(ImportExportError::DiskPathInvalid(file.name));
            }
            let disk_path = parent_dir.join(&file.name);
            let existing = fs::symlink_metadata(&disk_path).await.ok();

            if file.file_type == FileType::Folder {
                match existing {
                    Some(meta) if !edit || !meta.is_dir() => return Err(taken(&disk_path)),
                    Some(_) => {}
                    None => fs::create_dir(&disk_path)
                        .await
                        .map_err(|e| disk_invalid(&disk_path, e))?,
                }
                for child in tree.visible_children(&file.id) {
                    queue.push_back((tree.to_file(&child)?, disk_path.clone()));
                }
            } else {
                if existing.is_some() && !edit {
                    return Err(taken(&disk_path));
                }
                let content = self.read_content(&mut tree, &file.id).await?;
                fs::write(&disk_path, content)
                    .await
                    .map_err(|e| disk_invalid(&disk_path, e))?;
            }

            written += 1;
            if let Some(progress) = progress {
                progress(ExportProgress { disk_path, file });
            }
        }

        info!(written, dest = %dest_dir.display(), "Export finished");
        Ok(())
    }

    /// Creates one document and its content in a single staged change
    async fn import_document(
        &self,
        parent: &FileId,
        name: &str,
        content: &[u8],
    ) -> Result<File, ImportExportError> {
        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        let name = available_name(&mut tree, parent, name)?;
        let id = tree.create(&name, parent, FileType::Document)?;
        self.write_content(&mut tree, &id, content).await?;
        self.save_tree(&mut tree).await?;
        Ok(tree.to_file(&id)?)
    }
}

/// `name`, or its next `-N` variant not used by a child of `parent`
fn available_name(tree: &mut LazyTree, parent: &FileId, name: &str) -> Result<String, FileError> {
    if tree.child_named(parent, name)?.is_none() {
        return Ok(name.to_string());
    }
    let mut taken = HashSet::new();
    for child in tree.visible_children(parent) {
        taken.insert(tree.display_name(&child)?);
    }
    Ok(NameComponents::from(name).next_in(|candidate| taken.contains(candidate)))
}

fn disk_name(path: &Path) -> Result<String, ImportExportError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ImportExportError::DiskPathInvalid(path.display().to_string()))
}

fn disk_invalid(path: &Path, err: std::io::Error) -> ImportExportError {
    ImportExportError::DiskPathInvalid(format!("{}: {err}", path.display()))
}

fn taken(path: &Path) -> ImportExportError {
    ImportExportError::DiskPathTaken(path.display().to_string())
}

/// Entries of a directory, sorted by name
async fn sorted_dir(dir: &Path) -> Result<Vec<PathBuf>, ImportExportError> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| disk_invalid(dir, e))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| disk_invalid(dir, e))? {
        let path = entry.path();
        match entry.file_type().await {
            Ok(t) if t.is_dir() || t.is_file() => paths.push(path),
            _ => warn!(path = %path.display(), "Skipping special file"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Files and folders under `path`, itself included
async fn count_entries(path: &Path) -> Result<usize, ImportExportError> {
    let meta = fs::metadata(path).await.map_err(|e| disk_invalid(path, e))?;
    if !meta.is_dir() {
        return Ok(1);
    }
    let mut count = 0;
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        count += 1;
        for child in sorted_dir(&dir).await? {
            if fs::metadata(&child).await.map(|m| m.is_dir()).unwrap_or(false) {
                pending.push(child);
            } else {
                count += 1;
            }
        }
    }
    Ok(count)
}
