//! Hashing helpers.

use sha2::{Digest, Sha256};

use crate::symkey::SymmetricKey;

/// A 32-byte keyed BLAKE3 digest.
pub type Hmac = [u8; 32];

/// Keyed BLAKE3 hash of `data`.
///
/// File names are HMAC'd under their parent folder's key so that sibling
/// uniqueness can be checked by anyone holding the metadata, without being
/// able to read the names.
pub fn keyed_hmac(key: &SymmetricKey, data: &[u8]) -> Hmac {
    *blake3::keyed_hash(key.as_bytes(), data).as_bytes()
}

/// Lowercase hex SHA-256 of `data`, the address of a content chunk.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
