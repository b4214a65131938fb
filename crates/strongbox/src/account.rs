//! Account lifecycle: creation, import, export and removal

use strongbox_core::domain::{Account, FileError, LazyTree, Username};
use strongbox_core::ports::{IServerApi, SyncCommit};
use tracing::{info, instrument, warn};

use crate::errors::{AccountError, CreateAccountError, ImportAccountError};
use crate::{unexpected, Strongbox};

const WELCOME_PATH: &str = "/welcome.md";

const WELCOME_TEXT: &str = "# Welcome to Strongbox

Everything you put here is encrypted on this device before it is synced.
Nobody without your key can read it, the server included.

Keep your account string somewhere safe. It is the only way to sign in on
another device, and it cannot be recovered if lost.
";

impl Strongbox {
    /// Registers a new account and makes it the account of this device
    ///
    /// The root folder is created and accepted by the server before anything
    /// is stored locally. With `welcome_doc`, a `welcome.md` is staged for the
    /// next sync.
    #[instrument(skip(self))]
    pub async fn create_account(
        &self,
        username: &str,
        api_url: &str,
        welcome_doc: bool,
    ) -> Result<Account, CreateAccountError> {
        let username = Username::new(username).map_err(|_| CreateAccountError::UsernameInvalid)?;
        if self.current_account().await?.is_some() {
            return Err(CreateAccountError::AccountExists);
        }

        let account = Account::generate(username, api_url);
        let root = LazyTree::create_root(&account)?;
        let root_id = root.id;
        let server = self.server.at(account.api_url());
        let accepted = server.new_account(&account, root.sign(&account)).await?;

        {
            let _guard = self.tree_lock.lock().await;
            self.metadata
                .save_account(&account)
                .await
                .map_err(|e| CreateAccountError::Unexpected(format!("{e:#}")))?;
            self.metadata
                .set_root(root_id)
                .await
                .map_err(|e| CreateAccountError::Unexpected(format!("{e:#}")))?;
            self.metadata
                .commit_sync(SyncCommit {
                    base_upserts: vec![accepted],
                    last_synced: Some(chrono::Utc::now().timestamp_millis()),
                    ..SyncCommit::default()
                })
                .await
                .map_err(|e| CreateAccountError::Unexpected(format!("{e:#}")))?;
            self.server.switch_to(server);
        }
        info!(username = %account.username(), api_url = account.api_url(), "Account created");

        if welcome_doc {
            let welcome = self.create_at_path(WELCOME_PATH).await?;
            self.write_document(welcome.id, WELCOME_TEXT.as_bytes())
                .await
                .map_err(|e| CreateAccountError::Unexpected(e.to_string()))?;
        }

        Ok(account)
    }

    /// Signs this device in with an exported account string
    ///
    /// `api_url` replaces the server URL carried by the account string. The
    /// files arrive with the first sync.
    #[instrument(skip(self, account_string))]
    pub async fn import_account(
        &self,
        account_string: &str,
        api_url: Option<&str>,
    ) -> Result<Account, ImportAccountError> {
        if self
            .current_account()
            .await
            .map_err(|e| ImportAccountError::Unexpected(e.to_string()))?
            .is_some()
        {
            return Err(ImportAccountError::AccountExists);
        }

        let mut account = Account::from_account_string(account_string)?;
        if let Some(api_url) = api_url {
            let key = account.key().clone();
            account = Account::from_parts(account.username().clone(), api_url, key);
        }

        let server = self.server.at(account.api_url());
        let registered = server.get_public_key(&account, account.username()).await?;
        if registered != account.public_keys() {
            warn!(username = %account.username(), "Imported key does not match the server");
            return Err(ImportAccountError::UsernamePublicKeyMismatch);
        }

        self.metadata
            .save_account(&account)
            .await
            .map_err(|e| ImportAccountError::Unexpected(format!("{e:#}")))?;
        self.server.switch_to(server);
        info!(username = %account.username(), api_url = account.api_url(), "Account imported");
        Ok(account)
    }

    pub async fn get_account(&self) -> Result<Account, AccountError> {
        Ok(self.account().await?)
    }

    /// The account as a string that [`Strongbox::import_account`] accepts
    pub async fn export_account_string(&self) -> Result<String, AccountError> {
        let account = self.account().await?;
        account
            .to_account_string()
            .map_err(|e| AccountError::Unexpected(e.to_string()))
    }

    /// Hex encoding of the account's secret key
    pub async fn export_account_private_key(&self) -> Result<String, AccountError> {
        Ok(self.account().await?.private_key_hex())
    }

    /// Deletes the account on the server, then every local trace of it
    #[instrument(skip(self))]
    pub async fn delete_account(&self) -> Result<(), AccountError> {
        let account = self.account().await?;
        self.server.delete_account(&account).await?;
        self.wipe_local().await?;
        info!(username = %account.username(), "Account deleted");
        Ok(())
    }

    /// Removes the account and all data from this device and closes the handle
    ///
    /// Unsynced changes are lost. The account itself stays on the server.
    #[instrument(skip(self))]
    pub async fn logout_and_exit(self) -> Result<(), AccountError> {
        self.wipe_local().await?;
        info!("Logged out");
        Ok(())
    }

    async fn current_account(&self) -> Result<Option<Account>, FileError> {
        self.metadata.get_account().await.map_err(unexpected)
    }

    async fn wipe_local(&self) -> Result<(), AccountError> {
        let _guard = self.tree_lock.lock().await;
        self.metadata.clear().await.map_err(unexpected)?;
        self.content.clear().await.map_err(unexpected)?;
        Ok(())
    }
}
