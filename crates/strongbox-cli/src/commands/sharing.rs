//! Sharing commands - Share files and answer shares from others

use anyhow::{bail, Context, Result};
use clap::Args;
use strongbox::{File, FileId, ShareMode, Strongbox};
use strongbox_core::config::Config;

use super::{open, resolve};
use crate::output::{get_formatter, print_serialized, OutputFormat};

/// Grant another user access to a file or folder
#[derive(Debug, Args)]
pub struct ShareCommand {
    pub target: String,
    pub username: String,
    /// read or write
    #[arg(long, default_value = "read")]
    pub mode: ShareMode,
}

impl ShareCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let file = resolve(&sb, &self.target).await?;
        sb.share_file(file.id, &self.username, self.mode)
            .await
            .with_context(|| format!("Failed to share {} with {}", file.name, self.username))?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "id": file.id,
                "username": self.username,
                "mode": self.mode,
            }));
        } else {
            formatter.success(&format!(
                "Shared {} with {} ({:?})",
                file.name, self.username, self.mode
            ));
            formatter.info("The share takes effect on the next sync.");
        }
        Ok(())
    }
}

/// List shares waiting to be accepted or rejected
#[derive(Debug, Args)]
pub struct PendingCommand {}

impl PendingCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let pending = sb.get_pending_shares().await?;

        if format.is_json() {
            print_serialized(formatter.as_ref(), &pending);
            return Ok(());
        }
        if pending.is_empty() {
            formatter.success("No pending shares");
            return Ok(());
        }
        for file in &pending {
            formatter.line(&format!(
                "{}  {:<8} {} (from {})",
                file.id,
                file.file_type.name(),
                file.name,
                file.owner
            ));
        }
        Ok(())
    }
}

/// Accept a pending share by linking it into a folder
#[derive(Debug, Args)]
pub struct AcceptCommand {
    /// Id or name of the pending share
    pub share: String,
    /// Folder to place the link in
    #[arg(long, default_value = "/")]
    pub into: String,
    /// Name of the link; defaults to the shared file's name
    #[arg(long)]
    pub name: Option<String>,
}

impl AcceptCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let share = pending_share(&sb, &self.share).await?;
        let folder = resolve(&sb, &self.into).await?;
        let name = self.name.as_deref().unwrap_or(&share.name);

        let link = sb
            .create_link(name, folder.id, share.id)
            .await
            .with_context(|| format!("Failed to accept {}", share.name))?;
        let path = sb.get_path_by_id(share.id).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "link": link.id,
                "target": share.id,
                "path": path,
            }));
        } else {
            formatter.success(&format!("Accepted {} at {path}", share.name));
        }
        Ok(())
    }
}

/// Decline a pending share
#[derive(Debug, Args)]
pub struct RejectCommand {
    /// Id or name of the pending share
    pub share: String,
}

impl RejectCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let share = pending_share(&sb, &self.share).await?;
        sb.delete_pending_share(share.id).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "id": share.id, "rejected": true }));
        } else {
            formatter.success(&format!("Rejected {} from {}", share.name, share.owner));
        }
        Ok(())
    }
}

/// The pending share with id or name `query`
async fn pending_share(sb: &Strongbox, query: &str) -> Result<File> {
    let pending = sb.get_pending_shares().await?;
    if let Ok(id) = query.parse::<FileId>() {
        if let Some(file) = pending.iter().find(|f| f.id == id) {
            return Ok(file.clone());
        }
    }

    let mut named = pending.into_iter().filter(|f| f.name == query);
    match (named.next(), named.next()) {
        (Some(file), None) => Ok(file),
        (Some(_), Some(_)) => bail!("Several pending shares are named '{query}'; use the id"),
        (None, _) => bail!("No pending share matches '{query}'"),
    }
}
