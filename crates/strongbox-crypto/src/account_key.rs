//! Account identity keys.
//!
//! An account is a single 32-byte secret seed. Two keys are derived from it
//! with distinct BLAKE3 contexts:
//!
//! - an Ed25519 signing key, which signs file metadata and API requests
//! - an X25519 static secret, which agrees share keys with other accounts
//!
//! Losing the seed makes every file owned by the account unrecoverable.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as ExchangePublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};
use crate::symkey::SymmetricKey;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

const KDF_CONTEXT_SIGNING: &str = "strongbox 2024-06 account signing key";
const KDF_CONTEXT_EXCHANGE: &str = "strongbox 2024-06 account exchange key";
const KDF_CONTEXT_SHARE: &str = "strongbox 2024-06 share wrapping key";

/// The secret seed of an account.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct AccountKey {
    #[serde(with = "crate::hex_serde")]
    seed: [u8; 32],
}

/// Public half of an account, published to the server and embedded in
/// file metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeys {
    /// Ed25519 verifying key.
    #[serde(with = "crate::hex_serde")]
    pub signing: [u8; 32],
    /// X25519 public key.
    #[serde(with = "crate::hex_serde")]
    pub exchange: [u8; 32],
}

impl AccountKey {
    /// Generates a new random account secret.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self { seed }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    /// Parses the hex form produced by [`AccountKey::to_hex`].
    pub fn from_hex(encoded: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| CryptoError::Decoding(format!("invalid hex: {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::Decoding("expected 32 bytes".to_string()))?;
        Ok(Self { seed })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.seed)
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&blake3::derive_key(KDF_CONTEXT_SIGNING, &self.seed))
    }

    fn exchange_secret(&self) -> StaticSecret {
        StaticSecret::from(blake3::derive_key(KDF_CONTEXT_EXCHANGE, &self.seed))
    }

    pub fn public_keys(&self) -> PublicKeys {
        PublicKeys {
            signing: self.signing_key().verifying_key().to_bytes(),
            exchange: ExchangePublicKey::from(&self.exchange_secret()).to_bytes(),
        }
    }

    /// Signs `message` with the account's Ed25519 key.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing_key().sign(message).to_bytes()
    }

    /// Derives the symmetric key shared between this account and `other`.
    ///
    /// `a.shared_key(b.exchange) == b.shared_key(a.exchange)`, and an account
    /// may agree a key with itself, which is how the owner's root key is
    /// wrapped.
    pub fn shared_key(&self, other: &PublicKeys) -> SymmetricKey {
        let shared = self
            .exchange_secret()
            .diffie_hellman(&ExchangePublicKey::from(other.exchange));
        SymmetricKey::from_bytes(blake3::derive_key(KDF_CONTEXT_SHARE, shared.as_bytes()))
    }
}

impl std::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKey")
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

/// Verifies an Ed25519 signature against a public key.
pub fn verify_signature(
    public: &PublicKeys,
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> CryptoResult<()> {
    let verifying_key = VerifyingKey::from_bytes(&public.signing)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    verifying_key
        .verify(message, &Signature::from_bytes(signature))
        .map_err(|_| CryptoError::BadSignature)
}
