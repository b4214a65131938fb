//! Account command - Create, import and export the account on this device

use std::io::Read;

use anyhow::{Context, Result};
use clap::Subcommand;
use strongbox_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Create a new account on the server
    New {
        username: String,
        /// Server to register with (defaults to server.api_url)
        #[arg(long)]
        api_url: Option<String>,
        /// Skip the welcome document
        #[arg(long)]
        no_welcome: bool,
    },
    /// Add an existing account to this device
    Import {
        /// Account string; read from stdin when omitted
        account_string: Option<String>,
        /// Server to sign in with instead of the one in the account string
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Print the account string (or the raw private key) for another device
    Export {
        #[arg(long)]
        private_key: bool,
    },
    /// Show the account on this device
    Whoami,
}

impl AccountCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = super::open(config).await?;

        match self {
            AccountCommand::New {
                username,
                api_url,
                no_welcome,
            } => {
                let api_url = api_url.as_deref().unwrap_or(&config.server.api_url);
                let account = sb
                    .create_account(username, api_url, !no_welcome)
                    .await
                    .context("Failed to create account")?;
                info!(username = %account.username(), "Account created");

                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "username": account.username().as_str(),
                        "api_url": account.api_url(),
                    }));
                } else {
                    formatter.success(&format!("Created account {}", account.username()));
                    formatter.info(&format!("Server: {}", account.api_url()));
                    formatter.info("Run 'strongbox account export' to add it to another device.");
                }
            }
            AccountCommand::Import {
                account_string,
                api_url,
            } => {
                let account_string = match account_string {
                    Some(s) => s.clone(),
                    None => {
                        let mut s = String::new();
                        std::io::stdin()
                            .read_to_string(&mut s)
                            .context("Failed to read account string from stdin")?;
                        s
                    }
                };
                let account = sb
                    .import_account(account_string.trim(), api_url.as_deref())
                    .await
                    .context("Failed to import account")?;

                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "username": account.username().as_str(),
                        "api_url": account.api_url(),
                    }));
                } else {
                    formatter.success(&format!("Imported account {}", account.username()));
                    formatter.info("Run 'strongbox sync' to download your files.");
                }
            }
            AccountCommand::Export { private_key } => {
                let exported = if *private_key {
                    sb.export_account_private_key().await?
                } else {
                    sb.export_account_string().await?
                };
                if format.is_json() {
                    let json = if *private_key {
                        serde_json::json!({ "private_key": exported })
                    } else {
                        serde_json::json!({ "account_string": exported })
                    };
                    formatter.print_json(&json);
                } else {
                    formatter.warn("Anyone with this can read and change all of your files.");
                    formatter.line(&exported);
                }
            }
            AccountCommand::Whoami => {
                let account = sb.get_account().await?;
                let last_synced = sb.get_last_synced_human_string().await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "username": account.username().as_str(),
                        "api_url": account.api_url(),
                        "last_synced": last_synced,
                    }));
                } else {
                    formatter.line(account.username().as_str());
                    formatter.info(&format!("Server:      {}", account.api_url()));
                    formatter.info(&format!("Last synced: {last_synced}"));
                }
            }
        }

        Ok(())
    }
}
