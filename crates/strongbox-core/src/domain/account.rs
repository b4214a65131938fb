//! Account domain entity
//!
//! An account is a username, the server it lives on, and the secret seed
//! from which its signing and key-exchange keys derive. The account string
//! is the portable export form used to add a second device.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use strongbox_crypto::{AccountKey, PublicKeys, SIGNATURE_SIZE};

use super::{errors::DomainError, newtypes::Username};

/// A user's account on one device
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    username: Username,
    api_url: String,
    key: AccountKey,
}

impl Account {
    /// Creates an account with a freshly generated secret
    pub fn generate(username: Username, api_url: impl Into<String>) -> Self {
        Self {
            username,
            api_url: api_url.into(),
            key: AccountKey::generate(),
        }
    }

    /// Reconstructs an account from its parts (used by imports and tests)
    pub fn from_parts(username: Username, api_url: impl Into<String>, key: AccountKey) -> Self {
        Self {
            username,
            api_url: api_url.into(),
            key,
        }
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn public_keys(&self) -> PublicKeys {
        self.key.public_keys()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.key.sign(message)
    }

    /// Hex form of the secret seed
    pub fn private_key_hex(&self) -> String {
        self.key.to_hex()
    }

    /// Encodes the account as a single base64 string
    pub fn to_account_string(&self) -> Result<String, DomainError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| DomainError::AccountStringCorrupted(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Decodes an account string produced by [`Account::to_account_string`]
    ///
    /// # Errors
    /// Returns [`DomainError::AccountStringCorrupted`] for anything that is
    /// not valid base64-encoded account JSON
    pub fn from_account_string(account_string: &str) -> Result<Self, DomainError> {
        let bytes = STANDARD
            .decode(account_string.trim())
            .map_err(|e| DomainError::AccountStringCorrupted(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| DomainError::AccountStringCorrupted(e.to_string()))
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
