//! Document content and drawings
//!
//! Content is chunked, encrypted under the file's key and stored in the
//! local content store; the metadata then points at the new document hash.
//! Links are followed, so a link to a shared document reads the target.

use std::collections::HashMap;

use strongbox_core::domain::{
    decrypt_document, encrypt_document, Chunk, ChunkHash, DocumentHash, Drawing, DrawingFormat,
    FileError, FileId, LazyTree,
};
use tracing::debug;

use crate::errors::DocumentError;
use crate::{unexpected, Strongbox};

impl Strongbox {
    /// Plaintext of a document; empty if nothing was ever written
    pub async fn read_document(&self, id: FileId) -> Result<Vec<u8>, DocumentError> {
        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        self.read_content(&mut tree, &id).await
    }

    /// Plaintext of a document with the hash of the version read
    ///
    /// The hash is `None` if nothing was ever written. Pass it to
    /// [`Strongbox::safe_write`] to write only over this version.
    pub async fn read_document_with_hash(
        &self,
        id: FileId,
    ) -> Result<(Option<DocumentHash>, Vec<u8>), DocumentError> {
        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        let content = self.read_content(&mut tree, &id).await?;
        let hash = Self::current_hash(&tree, &id)?;
        Ok((hash, content))
    }

    /// Replaces the content of a document
    pub async fn write_document(&self, id: FileId, content: &[u8]) -> Result<(), DocumentError> {
        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        self.write_content(&mut tree, &id, content).await?;
        self.save_tree(&mut tree).await?;
        Ok(())
    }

    /// Replaces the content of a document if it is still at `old_hash`
    ///
    /// Returns the hash of the new version.
    ///
    /// # Errors
    /// [`DocumentError::ReReadRequired`] if another write or a sync changed
    /// the document since `old_hash` was read.
    pub async fn safe_write(
        &self,
        id: FileId,
        old_hash: Option<DocumentHash>,
        content: &[u8],
    ) -> Result<DocumentHash, DocumentError> {
        let _guard = self.tree_lock.lock().await;
        let mut tree = self.load_tree().await?;
        let current = Self::current_hash(&tree, &id)?;
        if current != old_hash {
            debug!(%id, "Document changed since it was read");
            return Err(DocumentError::ReReadRequired);
        }

        self.write_content(&mut tree, &id, content).await?;
        self.save_tree(&mut tree).await?;
        Self::current_hash(&tree, &id)?
            .ok_or_else(|| DocumentError::Unexpected(format!("{id} has no content after writing")))
    }

    pub async fn read_drawing(&self, id: FileId) -> Result<Drawing, DocumentError> {
        let bytes = self.read_document(id).await?;
        Ok(Drawing::parse(&bytes)?)
    }

    pub async fn write_drawing(&self, id: FileId, drawing: &Drawing) -> Result<(), DocumentError> {
        let bytes = drawing.to_bytes()?;
        self.write_document(id, &bytes).await
    }

    /// Renders a drawing, e.g. as SVG
    pub async fn export_drawing(
        &self,
        id: FileId,
        format: DrawingFormat,
    ) -> Result<Vec<u8>, DocumentError> {
        Ok(self.read_drawing(id).await?.export(format)?)
    }

    // ========================================================================
    // Helpers; callers hold `tree_lock`
    // ========================================================================

    /// Resolves links and checks that `id` is a live document
    fn document_id(tree: &LazyTree, id: &FileId) -> Result<FileId, FileError> {
        let id = tree.resolve_link(id);
        let meta = tree.find(&id)?;
        if tree.is_deleted(&id) {
            return Err(FileError::FileNonexistent);
        }
        if !meta.is_document() {
            return Err(FileError::FileNotDocument);
        }
        Ok(id)
    }

    fn current_hash(tree: &LazyTree, id: &FileId) -> Result<Option<DocumentHash>, FileError> {
        let id = Self::document_id(tree, id)?;
        Ok(tree.find(&id)?.document_hash.clone())
    }

    pub(crate) async fn read_content(
        &self,
        tree: &mut LazyTree,
        id: &FileId,
    ) -> Result<Vec<u8>, DocumentError> {
        let id = Self::document_id(tree, id)?;
        let hash = match tree.find(&id)?.document_hash.clone() {
            Some(hash) => hash,
            None => return Ok(Vec::new()),
        };
        let key = tree.decrypt_key(&id)?;

        let manifest = self
            .content
            .get_manifest(id, &hash)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| {
                DocumentError::Unexpected(format!("content of {id} is not stored locally"))
            })?;
        let chunks: HashMap<ChunkHash, Chunk> = self
            .content
            .get_chunks(&manifest.chunks)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(|chunk| (chunk.hash.clone(), chunk))
            .collect();

        decrypt_document(&key, &manifest, &chunks)
            .map_err(|e| DocumentError::Unexpected(e.to_string()))
    }

    /// Stores `content` and points the document at it in `tree`
    ///
    /// Content equal to the current version is not staged again.
    pub(crate) async fn write_content(
        &self,
        tree: &mut LazyTree,
        id: &FileId,
        content: &[u8],
    ) -> Result<(), DocumentError> {
        let id = Self::document_id(tree, id)?;
        let key = tree.decrypt_key(&id)?;
        let encrypted = encrypt_document(&key, content, &self.config.storage.chunker())
            .map_err(|e| DocumentError::Unexpected(e.to_string()))?;
        let hash = encrypted.hash();
        if tree.find(&id)?.document_hash.as_ref() == Some(&hash) {
            debug!(%id, "Document unchanged");
            return Ok(());
        }

        self.content
            .put_chunks(&encrypted.chunks)
            .await
            .map_err(unexpected)?;
        self.content
            .put_manifest(id, &hash, &encrypted.manifest)
            .await
            .map_err(unexpected)?;
        tree.update_document(&id, hash, encrypted.manifest.size)?;

        debug!(%id, size = encrypted.manifest.size, chunks = encrypted.chunks.len(), "Document written");
        Ok(())
    }
}
