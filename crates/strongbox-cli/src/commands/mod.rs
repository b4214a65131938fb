//! Subcommands and the helpers they share

pub mod account;
pub mod config;
pub mod files;
pub mod sharing;
pub mod sync;
pub mod transfer;
pub mod usage;

use anyhow::{Context, Result};
use strongbox::{File, FileId, Strongbox};
use strongbox_core::config::Config;

/// Opens the local data directory named by `config`
pub async fn open(config: &Config) -> Result<Strongbox> {
    Strongbox::open(config.clone())
        .await
        .with_context(|| {
            format!(
                "Failed to open data directory {}",
                config.storage.data_dir.display()
            )
        })
}

/// Looks a file up by tree path or, failing that, by id
///
/// Paths start with `/`; anything else is parsed as a file id.
pub async fn resolve(sb: &Strongbox, target: &str) -> Result<File> {
    if target.starts_with('/') {
        return sb
            .get_by_path(target)
            .await
            .with_context(|| format!("No file at {target}"));
    }
    let id: FileId = target
        .parse()
        .with_context(|| format!("'{target}' is neither a path nor a file id"))?;
    sb.get_file_by_id(id)
        .await
        .with_context(|| format!("No file with id {id}"))
}
