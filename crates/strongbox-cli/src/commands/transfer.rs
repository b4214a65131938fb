//! Import and export commands - Copy between the local disk and the tree

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use strongbox::{ExportProgress, ImportStatus};
use strongbox_core::config::Config;

use super::{open, resolve};
use crate::output::{get_formatter, print_serialized, OutputFormat};

/// Copy local files and folders into the tree
#[derive(Debug, Args)]
pub struct ImportCommand {
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
    /// Destination folder
    #[arg(long, default_value = "/")]
    pub into: String,
}

impl ImportCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let dest = resolve(&sb, &self.into).await?;

        let human = !format.is_json();
        let report = move |status: ImportStatus| {
            if !human {
                return;
            }
            match status {
                ImportStatus::CalculatedTotal(total) => println!("  Importing {total} items"),
                ImportStatus::StartingItem(_) => {}
                ImportStatus::FinishedItem(file) => println!("  + {}", file.name),
            }
        };
        let imported = sb
            .import_files(&self.sources, dest.id, Some(&report))
            .await
            .context("Import failed")?;

        if format.is_json() {
            print_serialized(formatter.as_ref(), &imported);
        } else {
            formatter.success(&format!(
                "Imported {} item{} into {}",
                imported.len(),
                if imported.len() == 1 { "" } else { "s" },
                self.into
            ));
        }
        Ok(())
    }
}

/// Write a file or folder from the tree to disk
#[derive(Debug, Args)]
pub struct ExportCommand {
    pub target: String,
    /// Existing local directory to write into
    #[arg(default_value = ".")]
    pub dest: PathBuf,
    /// Overwrite files that already exist on disk
    #[arg(long)]
    pub edit: bool,
}

impl ExportCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let file = resolve(&sb, &self.target).await?;

        let human = !format.is_json();
        let report = move |progress: ExportProgress| {
            if human {
                println!("  > {}", progress.disk_path.display());
            }
        };
        sb.export_file(file.id, &self.dest, self.edit, Some(&report))
            .await
            .with_context(|| format!("Failed to export {}", self.target))?;

        let written = self.dest.join(&file.name);
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "id": file.id,
                "path": written.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Exported to {}", written.display()));
        }
        Ok(())
    }
}
