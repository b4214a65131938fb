//! File metadata entities
//!
//! Three views of the same file exist:
//!
//! - [`FileMetadata`] is the encrypted record the server stores. Names and
//!   keys are ciphertext; structure (parent, type, tombstone, shares) is
//!   plain so the server can validate the tree.
//! - [`SignedMeta`] is a metadata record signed by the account that last
//!   changed it, and [`ServerMeta`] adds the versions the server assigned.
//! - [`File`] is the decrypted view handed to callers.

use serde::{Deserialize, Serialize};
use strongbox_crypto::{verify_signature, CryptoError, EncryptedData, Hmac, PublicKeys};

use super::account::Account;
use super::newtypes::{DocumentHash, FileId, Username};

// ============================================================================
// File type and access
// ============================================================================

/// Kind of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Document,
    Folder,
    /// Weak reference to another user's file, resolved at read time
    Link { target: FileId },
}

impl FileType {
    pub fn name(&self) -> &'static str {
        match self {
            FileType::Document => "document",
            FileType::Folder => "folder",
            FileType::Link { .. } => "link",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Mode a share grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareMode {
    Read,
    Write,
}

impl std::str::FromStr for ShareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(ShareMode::Read),
            "write" => Ok(ShareMode::Write),
            other => Err(format!("unknown share mode: {other}")),
        }
    }
}

/// Effective access of a user to a file, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
    Owner,
}

impl From<ShareMode> for AccessMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Read => AccessMode::Read,
            ShareMode::Write => AccessMode::Write,
        }
    }
}

/// A file key wrapped for one user
///
/// The owner holds one of these on their root (wrapped to themselves); every
/// share adds one for the recipient, wrapped under the key agreed between
/// sharer and recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccessKey {
    pub encrypted_by: Username,
    pub encrypted_by_key: PublicKeys,
    pub encrypted_for: Username,
    pub encrypted_for_key: PublicKeys,
    pub mode: AccessMode,
    pub encrypted_key: EncryptedData,
    /// Revoked or rejected grants stay as tombstones so the change syncs
    pub deleted: bool,
}

/// Encrypted file name
///
/// The name is encrypted under the file's own key. The HMAC is keyed with
/// the parent folder's key, so two siblings with the same name have the
/// same HMAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretFileName {
    pub encrypted: EncryptedData,
    #[serde(with = "strongbox_crypto::hex_serde")]
    pub hmac: Hmac,
}

// ============================================================================
// FileMetadata
// ============================================================================

/// The encrypted, server-visible record of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: FileId,
    /// Containing folder; the root is its own parent
    pub parent: FileId,
    pub file_type: FileType,
    pub name: SecretFileName,
    pub owner: Username,
    pub owner_key: PublicKeys,
    /// Tombstone
    pub deleted: bool,
    pub document_hash: Option<DocumentHash>,
    /// Plaintext size of the document body in bytes
    pub document_size: Option<u64>,
    pub user_access_keys: Vec<UserAccessKey>,
    /// This file's key wrapped under the parent's key
    pub folder_access_key: EncryptedData,
    /// Milliseconds since the Unix epoch of the last local change
    pub last_modified: i64,
    pub last_modified_by: Username,
}

impl FileMetadata {
    pub fn is_root(&self) -> bool {
        self.id == self.parent
    }

    pub fn is_folder(&self) -> bool {
        self.file_type == FileType::Folder
    }

    pub fn is_document(&self) -> bool {
        self.file_type == FileType::Document
    }

    pub fn is_link(&self) -> bool {
        matches!(self.file_type, FileType::Link { .. })
    }

    pub fn link_target(&self) -> Option<FileId> {
        match self.file_type {
            FileType::Link { target } => Some(target),
            _ => None,
        }
    }

    /// True if a live grant exists for anyone other than the owner
    pub fn is_shared(&self) -> bool {
        self.user_access_keys
            .iter()
            .any(|k| !k.deleted && k.encrypted_for != self.owner)
    }

    /// The live grant addressed to `user`, if any
    pub fn access_key_for(&self, user: &Username) -> Option<&UserAccessKey> {
        self.user_access_keys
            .iter()
            .find(|k| !k.deleted && &k.encrypted_for == user)
    }

    /// Signs this record as `account`
    pub fn sign(self, account: &Account) -> SignedMeta {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = account.sign(&SignedMeta::signing_bytes(&self, timestamp));
        SignedMeta {
            meta: self,
            timestamp,
            public_key: account.public_keys(),
            signature,
        }
    }
}

// ============================================================================
// Signed and server views
// ============================================================================

/// Metadata record signed by the account that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMeta {
    pub meta: FileMetadata,
    pub timestamp: i64,
    pub public_key: PublicKeys,
    #[serde(with = "strongbox_crypto::hex_serde")]
    pub signature: [u8; strongbox_crypto::SIGNATURE_SIZE],
}

impl SignedMeta {
    fn signing_bytes(meta: &FileMetadata, timestamp: i64) -> Vec<u8> {
        // Struct field order is fixed, so the JSON encoding is canonical.
        serde_json::to_vec(&(meta, timestamp)).unwrap_or_default()
    }

    /// Checks the signature against the embedded public key
    pub fn verify(&self) -> Result<(), CryptoError> {
        verify_signature(
            &self.public_key,
            &Self::signing_bytes(&self.meta, self.timestamp),
            &self.signature,
        )
    }

    pub fn id(&self) -> FileId {
        self.meta.id
    }
}

/// A signed record plus the versions the server assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMeta {
    pub file: SignedMeta,
    /// Monotonic server counter bumped on every accepted change
    pub metadata_version: u64,
    /// Bumped only when the document body changes
    pub content_version: u64,
}

impl ServerMeta {
    pub fn id(&self) -> FileId {
        self.file.meta.id
    }

    pub fn meta(&self) -> &FileMetadata {
        &self.file.meta
    }
}

// ============================================================================
// Decrypted view
// ============================================================================

/// A share as presented to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub shared_by: Username,
    pub shared_with: Username,
    pub mode: ShareMode,
}

/// Decrypted file as returned by the public API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub parent: FileId,
    pub name: String,
    pub file_type: FileType,
    pub owner: Username,
    pub last_modified: i64,
    pub last_modified_by: Username,
    pub shares: Vec<Share>,
    /// 0 until the file has reached the server
    pub metadata_version: u64,
    pub content_version: u64,
    pub size: Option<u64>,
}

impl File {
    pub fn is_root(&self) -> bool {
        self.id == self.parent
    }

    pub fn is_folder(&self) -> bool {
        self.file_type == FileType::Folder
    }

    pub fn is_document(&self) -> bool {
        self.file_type == FileType::Document
    }
}
