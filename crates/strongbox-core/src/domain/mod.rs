//! Domain entities and business logic
//!
//! This module contains the core domain types for Strongbox:
//! - Newtypes for type-safe identifiers and validated values
//! - The account and its key material
//! - Encrypted file metadata and the decrypted client view
//! - Tree structure, validation and decrypting mutations
//! - Paths, file names, documents and drawings
//! - The local change log and sync state machine
//! - Domain-specific error types

pub mod account;
pub mod change;
pub mod document;
pub mod drawing;
pub mod errors;
pub mod file;
pub mod filename;
pub mod lazy;
pub mod newtypes;
pub mod path;
pub mod sync_state;
pub mod tree;
pub mod usage;

// Re-export commonly used types
pub use account::Account;
pub use change::{ChangeKind, ChangeLog, ChangeRecord};
pub use document::{
    chunk_boundaries, decrypt_document, encrypt_document, Chunk, ChunkerConfig, DocumentManifest,
    EncryptedDocument,
};
pub use drawing::{ColorAlias, Drawing, DrawingError, DrawingFormat, Stroke};
pub use errors::{DomainError, FileError, ValidationFailure};
pub use file::{
    AccessMode, File, FileMetadata, FileType, SecretFileName, ServerMeta, Share, ShareMode,
    SignedMeta, UserAccessKey,
};
pub use filename::{validate_name, DocumentType, NameComponents, MAX_FILENAME_LENGTH};
pub use lazy::LazyTree;
pub use newtypes::*;
pub use path::PathFilter;
pub use sync_state::{SyncProgress, SyncState, SyncStatus, WorkUnit};
pub use tree::FileTree;
pub use usage::{bytes_to_human, FileUsage, UncompressedUsage, UsageItemMetric, UsageMetrics};
