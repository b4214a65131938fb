//! Server API port (driven/secondary port)
//!
//! This module defines the interface to the remote service that stores
//! signed metadata and encrypted chunks, assigns versions and enforces
//! quotas.
//!
//! ## Design Notes
//!
//! - Unlike the storage ports, errors here are typed: callers branch on
//!   [`ServerError`] to tell an unreachable server from a rejected request.
//! - Every call is made on behalf of an [`Account`], which adapters use to
//!   sign the request.
//! - Request and response bodies are plain serde types so the HTTP adapter
//!   can send them as JSON unchanged.

use serde::{Deserialize, Serialize};
use strongbox_crypto::PublicKeys;
use thiserror::Error;

use crate::domain::{
    Account, Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId, FileUsage, ServerMeta,
    SignedMeta, Username,
};

// ============================================================================
// Errors
// ============================================================================

/// Application-level rejections returned by an endpoint
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointError {
    #[error("username is taken")]
    UsernameTaken,
    #[error("username is invalid")]
    UsernameInvalid,
    #[error("user not found")]
    UserNotFound,
    #[error("file changed on the server since it was read")]
    OldVersionIncorrect,
    #[error("usage is over the data cap")]
    UsageIsOverDataCap,
    #[error("not permitted")]
    NotPermissioned,
    #[error("file not found")]
    FileNotFound,
    #[error("document not found")]
    DocumentNotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("the server is not accepting new accounts")]
    Disabled,
}

/// Failure of a server call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Transport failure: connect error, timeout or no server
    #[error("server unreachable")]
    Unreachable,

    /// The server no longer accepts this client version
    #[error("client update required")]
    ClientUpdateRequired,

    /// The request signature or timestamp was rejected
    #[error("invalid authentication")]
    InvalidAuth,

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("unexpected server error: {0}")]
    Unexpected(String),
}

impl ServerError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ServerError::Unreachable)
    }

    pub fn endpoint(&self) -> Option<&EndpointError> {
        match self {
            ServerError::Endpoint(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// A metadata change proposed to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Version the change was made against; `None` creates the file
    pub base_version: Option<u64>,
    pub new: SignedMeta,
}

/// A document body referenced by an upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub id: FileId,
    pub hash: DocumentHash,
    pub manifest: DocumentManifest,
}

/// Changes visible to the caller since a cursor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatesResponse {
    /// Cursor to pass on the next call
    pub as_of: u64,
    pub files: Vec<ServerMeta>,
}

/// Server usage of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerUsage {
    pub usages: Vec<FileUsage>,
    pub cap: u64,
}

// ============================================================================
// IServerApi trait
// ============================================================================

/// Remote service holding metadata and content
#[async_trait::async_trait]
pub trait IServerApi: Send + Sync {
    /// Registers `account` with its root folder
    async fn new_account(&self, account: &Account, root: SignedMeta)
        -> Result<ServerMeta, ServerError>;

    /// Public keys registered for `username`
    async fn get_public_key(
        &self,
        account: &Account,
        username: &Username,
    ) -> Result<PublicKeys, ServerError>;

    /// Every accessible file whose version is greater than `since`
    async fn get_updates(&self, account: &Account, since: u64)
        -> Result<UpdatesResponse, ServerError>;

    /// Ids of every file the account can currently access
    async fn get_file_ids(&self, account: &Account) -> Result<Vec<FileId>, ServerError>;

    /// Manifest of a document version
    async fn get_document(
        &self,
        account: &Account,
        id: FileId,
        hash: &DocumentHash,
    ) -> Result<DocumentManifest, ServerError>;

    /// The subset of `hashes` the server does not hold
    async fn missing_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<ChunkHash>, ServerError>;

    async fn put_chunks(&self, account: &Account, chunks: Vec<Chunk>) -> Result<(), ServerError>;

    async fn get_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<Chunk>, ServerError>;

    /// Applies metadata changes and document versions atomically
    ///
    /// Returns the accepted records with their new versions.
    async fn upsert(
        &self,
        account: &Account,
        updates: Vec<FileDiff>,
        documents: Vec<DocumentUpload>,
    ) -> Result<Vec<ServerMeta>, ServerError>;

    async fn get_usage(&self, account: &Account) -> Result<ServerUsage, ServerError>;

    async fn delete_account(&self, account: &Account) -> Result<(), ServerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_converts() {
        let err: ServerError = EndpointError::UsernameTaken.into();
        assert_eq!(err.endpoint(), Some(&EndpointError::UsernameTaken));
        assert!(!err.is_unreachable());
        assert_eq!(err.to_string(), "username is taken");
    }

    #[test]
    fn test_endpoint_error_serde() {
        let json = serde_json::to_string(&EndpointError::Validation("cycle".into())).unwrap();
        let back: EndpointError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EndpointError::Validation("cycle".into()));
    }
}
