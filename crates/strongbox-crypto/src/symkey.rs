//! Symmetric authenticated encryption using ChaCha20-Poly1305.
//!
//! Two nonce strategies are offered:
//!
//! - [`SymmetricKey::encrypt`] draws a random nonce from the OS RNG. Used for
//!   file names and wrapped keys.
//! - [`SymmetricKey::encrypt_convergent`] derives the nonce from a keyed BLAKE3
//!   hash of the plaintext, so the same chunk under the same file key always
//!   produces the same ciphertext. Content-addressed document chunks rely on
//!   this to deduplicate unchanged chunks between versions.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Size of symmetric keys in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A 256-bit symmetric key, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        self.encrypt_with_nonce(nonce, plaintext)
    }

    /// Encrypts `plaintext` deterministically.
    ///
    /// The nonce is the first 12 bytes of `BLAKE3-keyed(key, plaintext)`; a
    /// nonce is therefore only ever reused for an identical plaintext.
    pub fn encrypt_convergent(&self, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
        let digest = blake3::keyed_hash(&self.bytes, plaintext);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&digest.as_bytes()[..NONCE_SIZE]);
        self.encrypt_with_nonce(nonce, plaintext)
    }

    fn encrypt_with_nonce(
        &self,
        nonce: [u8; NONCE_SIZE],
        plaintext: &[u8],
    ) -> CryptoResult<EncryptedData> {
        let cipher = ChaCha20Poly1305::new((&self.bytes).into());
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        Ok(EncryptedData { nonce, ciphertext })
    }

    /// Decrypts data produced by either encryption mode.
    pub fn decrypt(&self, encrypted: &EncryptedData) -> CryptoResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new((&self.bytes).into());
        cipher
            .decrypt(
                Nonce::from_slice(&encrypted.nonce),
                encrypted.ciphertext.as_ref(),
            )
            .map_err(|_| {
                CryptoError::Decryption("wrong key or tampered data".to_string())
            })
    }

    /// Wraps another key under this one.
    pub fn wrap(&self, key: &SymmetricKey) -> CryptoResult<EncryptedData> {
        self.encrypt(key.as_bytes())
    }

    /// Recovers a key previously wrapped with [`SymmetricKey::wrap`].
    pub fn unwrap_key(&self, wrapped: &EncryptedData) -> CryptoResult<SymmetricKey> {
        let bytes = self.decrypt(wrapped)?;
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            CryptoError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", b.len()))
        })?;
        Ok(SymmetricKey::from_bytes(bytes))
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generates a random symmetric key.
pub fn generate_key() -> SymmetricKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SymmetricKey::from_bytes(bytes)
}

/// Ciphertext together with the nonce needed to decrypt it.
///
/// Serializes as a single base64 string of `nonce || ciphertext`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    /// The encrypted ciphertext (includes auth tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Total size of nonce plus ciphertext.
    pub fn len(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }

    /// `nonce || ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Decoding("data too short".to_string()));
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_SIZE..].to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine};
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Decoding(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for EncryptedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for EncryptedData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let encrypted = key.encrypt(b"buy milk").unwrap();
        assert_eq!(key.decrypt(&encrypted).unwrap(), b"buy milk");
    }

    #[test]
    fn random_nonces_differ() {
        let key = generate_key();
        let a = key.encrypt(b"same").unwrap();
        let b = key.encrypt(b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn convergent_encryption_is_deterministic_per_key() {
        let key = generate_key();
        let a = key.encrypt_convergent(b"chunk").unwrap();
        let b = key.encrypt_convergent(b"chunk").unwrap();
        assert_eq!(a, b);

        let other = generate_key();
        assert_ne!(other.encrypt_convergent(b"chunk").unwrap(), a);
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = generate_key().encrypt(b"secret").unwrap();
        assert!(generate_key().decrypt(&encrypted).is_err());
    }

    #[test]
    fn wrap_and_unwrap_key() {
        let parent = generate_key();
        let child = generate_key();
        let wrapped = parent.wrap(&child).unwrap();
        assert_eq!(parent.unwrap_key(&wrapped).unwrap(), child);
    }

    #[test]
    fn serde_uses_base64_string() {
        let encrypted = generate_key().encrypt(b"x").unwrap();
        let json = serde_json::to_string(&encrypted).unwrap();
        assert!(json.starts_with('"'));
        let back: EncryptedData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encrypted);
    }

    #[test]
    fn debug_redacts_key() {
        let key = generate_key();
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
