//! Error types for the crypto layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key bytes.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A signature did not verify against the claimed public key.
    #[error("signature verification failed")]
    BadSignature,

    /// Input could not be decoded (base64, hex, or length mismatch).
    #[error("decoding failed: {0}")]
    Decoding(String),
}
