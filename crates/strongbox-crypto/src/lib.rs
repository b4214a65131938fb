//! Strongbox Crypto - cryptographic primitives for the encrypted file tree
//!
//! Every file in a Strongbox tree carries its own symmetric data key. Keys are
//! wrapped either under the parent folder's key or, at share boundaries, under
//! a key agreed between two accounts. This crate provides the pieces:
//!
//! - [`symkey`] - ChaCha20-Poly1305 authenticated encryption with random or
//!   convergent nonces
//! - [`account_key`] - the account secret, its Ed25519 signing key and X25519
//!   key-exchange secret, signatures and key agreement
//! - [`hash`] - keyed BLAKE3 HMACs and SHA-256 content addressing
//! - [`hex_serde`] - serde helpers for fixed-size byte arrays

pub mod account_key;
pub mod error;
pub mod hash;
pub mod hex_serde;
pub mod symkey;

pub use account_key::{verify_signature, AccountKey, PublicKeys, SIGNATURE_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use hash::{keyed_hmac, sha256_hex, Hmac};
pub use symkey::{generate_key, EncryptedData, SymmetricKey, KEY_SIZE, NONCE_SIZE};
