//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// File identifier
// ============================================================================

/// Stable identifier of a file, assigned at creation and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Create a new random FileId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a FileId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Create a nil (all zeros) FileId
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid FileId: {e}")))
    }
}

impl From<Uuid> for FileId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Username
// ============================================================================

/// Maximum username length in characters
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Account username
///
/// Usernames are case-insensitive: input is lowercased, then must be
/// 1-32 ASCII alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Create a new Username
    ///
    /// # Errors
    /// Returns error if the normalized name is empty, too long, or contains
    /// anything but ASCII letters and digits
    pub fn new(username: impl AsRef<str>) -> Result<Self, DomainError> {
        let normalized = username.as_ref().trim().to_lowercase();

        if normalized.is_empty() {
            return Err(DomainError::InvalidUsername(
                "Username cannot be empty".to_string(),
            ));
        }

        if normalized.len() > MAX_USERNAME_LENGTH {
            return Err(DomainError::InvalidUsername(format!(
                "Username longer than {MAX_USERNAME_LENGTH} characters"
            )));
        }

        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidUsername(username.as_ref().to_string()));
        }

        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Username {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Username {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

// ============================================================================
// Content hashes
// ============================================================================

fn validate_sha256_hex(hash: &str) -> Result<(), DomainError> {
    if hash.len() != 64 {
        return Err(DomainError::InvalidHash(format!(
            "expected 64 hex characters, got {}",
            hash.len()
        )));
    }
    if !hash.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
        return Err(DomainError::InvalidHash(format!(
            "not lowercase hex: {hash}"
        )));
    }
    Ok(())
}

/// Address of an encrypted chunk (SHA-256 of `nonce || ciphertext`, hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkHash(String);

impl ChunkHash {
    /// # Errors
    /// Returns error if the hash is not 64 lowercase hex characters
    pub fn new(hash: String) -> Result<Self, DomainError> {
        validate_sha256_hex(&hash)?;
        Ok(Self(hash))
    }

    /// Hash of the given encrypted chunk bytes
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(strongbox_crypto::sha256_hex(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChunkHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChunkHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ChunkHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ChunkHash> for String {
    fn from(hash: ChunkHash) -> Self {
        hash.0
    }
}

/// Version identifier of a document body
///
/// SHA-256 over the ordered chunk addresses of the document's manifest, so
/// two devices encrypting the same bytes under the same file key agree on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentHash(String);

impl DocumentHash {
    /// # Errors
    /// Returns error if the hash is not 64 lowercase hex characters
    pub fn new(hash: String) -> Result<Self, DomainError> {
        validate_sha256_hex(&hash)?;
        Ok(Self(hash))
    }

    /// Hash of a manifest's chunk list
    #[must_use]
    pub fn of_chunks(chunks: &[ChunkHash]) -> Self {
        let joined: String = chunks.iter().map(ChunkHash::as_str).collect();
        Self(strongbox_crypto::sha256_hex(joined.as_bytes()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for DocumentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DocumentHash> for String {
    fn from(hash: DocumentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Tests
// ============================================================================
