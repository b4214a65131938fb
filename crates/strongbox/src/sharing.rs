//! Sharing with other users
//!
//! A share grants another user a key to a file or folder. The recipient
//! sees it as pending until they accept it by creating a link to it, or
//! reject it by dropping their own grant.

use strongbox_core::domain::{File, FileError, FileId, FileType, ShareMode, Username};
use strongbox_core::ports::IServerApi;
use strongbox_crypto::PublicKeys;
use tracing::{debug, info, instrument};

use crate::errors::ShareError;
use crate::{unexpected, Strongbox};

impl Strongbox {
    /// Grants `username` access to `id`; takes effect on the next sync
    #[instrument(skip(self))]
    pub async fn share_file(
        &self,
        id: FileId,
        username: &str,
        mode: ShareMode,
    ) -> Result<(), ShareError> {
        let username = Username::new(username).map_err(|_| ShareError::UsernameInvalid)?;
        let keys = self.public_keys_of(&username).await?;
        self.mutate(|tree| tree.add_share(&id, &username, keys, mode))
            .await?;
        info!(%id, %username, ?mode, "File shared");
        Ok(())
    }

    /// Files shared with this account that are neither accepted nor rejected
    pub async fn get_pending_shares(&self) -> Result<Vec<File>, FileError> {
        self.read(|tree| {
            tree.pending_shares()
                .iter()
                .map(|id| tree.to_file(id))
                .collect()
        })
        .await
    }

    /// Rejects a pending share
    pub async fn delete_pending_share(&self, id: FileId) -> Result<(), ShareError> {
        self.mutate(|tree| tree.delete_share(&id, None)).await?;
        info!(%id, "Pending share rejected");
        Ok(())
    }

    /// Creates a link named `name` in `parent` pointing at `target`
    ///
    /// Linking a pending share accepts it.
    pub async fn create_link(
        &self,
        name: &str,
        parent: FileId,
        target: FileId,
    ) -> Result<File, FileError> {
        self.create_file(name, parent, FileType::Link { target })
            .await
    }

    /// Public keys of another user, from the local cache or the server
    async fn public_keys_of(&self, username: &Username) -> Result<PublicKeys, ShareError> {
        if let Some(keys) = self
            .metadata
            .get_cached_public_key(username)
            .await
            .map_err(unexpected)?
        {
            return Ok(keys);
        }

        let account = self.account().await?;
        let keys = self.server.get_public_key(&account, username).await?;
        self.metadata
            .cache_public_key(username, &keys)
            .await
            .map_err(unexpected)?;
        debug!(%username, "Cached public key");
        Ok(keys)
    }
}
