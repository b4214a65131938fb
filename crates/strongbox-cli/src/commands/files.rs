//! File commands - Browse and edit the file tree
//!
//! Files are addressed by tree path (`/notes/todo.md`) or by id. Changes are
//! staged locally and reach the server on the next `strongbox sync`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use strongbox::{File, FileId, FileType};
use strongbox_core::config::Config;
use strongbox_core::domain::bytes_to_human;

use super::{open, resolve};
use crate::output::{get_formatter, print_serialized, OutputFormat};

/// List a folder
#[derive(Debug, Args)]
pub struct LsCommand {
    #[arg(default_value = "/")]
    pub target: String,
    /// Show type, size and modification time
    #[arg(short, long)]
    pub long: bool,
}

impl LsCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let folder = resolve(&sb, &self.target).await?;

        let mut children = sb.get_children(folder.id).await?;
        children.sort_by(|a, b| a.name.cmp(&b.name));

        if format.is_json() {
            print_serialized(formatter.as_ref(), &children);
            return Ok(());
        }
        for file in &children {
            if self.long {
                formatter.line(&long_row(file));
            } else {
                formatter.line(&display_name(file));
            }
        }
        Ok(())
    }
}

/// Show a folder and everything below it
#[derive(Debug, Args)]
pub struct TreeCommand {
    #[arg(default_value = "/")]
    pub target: String,
}

impl TreeCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let top = resolve(&sb, &self.target).await?;
        let files = sb.get_and_get_children_recursively(top.id).await?;

        if format.is_json() {
            print_serialized(formatter.as_ref(), &files);
            return Ok(());
        }
        for line in render_tree(&files) {
            formatter.line(&line);
        }
        Ok(())
    }
}

/// Create a folder, along with any missing parents
#[derive(Debug, Args)]
pub struct MkdirCommand {
    pub path: String,
}

impl MkdirCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let path = format!("{}/", self.path.trim_end_matches('/'));
        create(config, format, &path).await
    }
}

/// Create an empty document, along with any missing parent folders
#[derive(Debug, Args)]
pub struct NewCommand {
    pub path: String,
}

impl NewCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        if self.path.ends_with('/') {
            bail!("Document paths cannot end in '/'; use 'strongbox mkdir' for folders");
        }
        create(config, format, &self.path).await
    }
}

async fn create(config: &Config, format: OutputFormat, path: &str) -> Result<()> {
    let formatter = get_formatter(format);
    let sb = open(config).await?;
    let file = sb
        .create_at_path(path)
        .await
        .with_context(|| format!("Failed to create {path}"))?;

    if format.is_json() {
        print_serialized(formatter.as_ref(), &file);
    } else {
        formatter.success(&format!("Created {path}"));
        formatter.info(&format!("id: {}", file.id));
    }
    Ok(())
}

/// Print a document
#[derive(Debug, Args)]
pub struct CatCommand {
    pub target: String,
}

impl CatCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let file = resolve(&sb, &self.target).await?;
        let content = sb.read_document(file.id).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "id": file.id,
                "content": String::from_utf8_lossy(&content),
            }));
        } else {
            std::io::stdout()
                .write_all(&content)
                .context("Failed to write to stdout")?;
        }
        Ok(())
    }
}

/// Replace a document's content
#[derive(Debug, Args)]
pub struct WriteCommand {
    pub target: String,
    /// New content; stdin is read when neither this nor --from is given
    #[arg(long, conflicts_with = "from")]
    pub content: Option<String>,
    /// Read the new content from a local file
    #[arg(long)]
    pub from: Option<PathBuf>,
}

impl WriteCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let content = match (&self.content, &self.from) {
            (Some(text), _) => text.clone().into_bytes(),
            (None, Some(path)) => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            (None, None) => {
                let mut buf = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .context("Failed to read stdin")?;
                buf
            }
        };

        let sb = open(config).await?;
        let file = resolve(&sb, &self.target).await?;
        sb.write_document(file.id, &content).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "id": file.id,
                "size": content.len(),
            }));
        } else {
            formatter.success(&format!(
                "Wrote {} to {}",
                bytes_to_human(content.len() as u64),
                self.target
            ));
        }
        Ok(())
    }
}

/// Move a file into another folder
#[derive(Debug, Args)]
pub struct MvCommand {
    pub target: String,
    pub destination: String,
}

impl MvCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let file = resolve(&sb, &self.target).await?;
        let folder = resolve(&sb, &self.destination).await?;
        sb.move_file(file.id, folder.id).await?;

        let path = sb.get_path_by_id(file.id).await?;
        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "id": file.id, "path": path }));
        } else {
            formatter.success(&format!("Moved to {path}"));
        }
        Ok(())
    }
}

/// Rename a file in place
#[derive(Debug, Args)]
pub struct RenameCommand {
    pub target: String,
    pub new_name: String,
}

impl RenameCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let file = resolve(&sb, &self.target).await?;
        sb.rename_file(file.id, &self.new_name).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "id": file.id, "name": self.new_name }));
        } else {
            formatter.success(&format!("Renamed {} to {}", file.name, self.new_name));
        }
        Ok(())
    }
}

/// Delete a file; folders are deleted with their contents
#[derive(Debug, Args)]
pub struct RmCommand {
    pub target: String,
}

impl RmCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let file = resolve(&sb, &self.target).await?;
        sb.delete_file(file.id).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({ "id": file.id, "deleted": true }));
        } else {
            formatter.success(&format!("Deleted {}", display_name(&file)));
        }
        Ok(())
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn display_name(file: &File) -> String {
    match file.file_type {
        FileType::Folder => format!("{}/", file.name),
        _ => file.name.clone(),
    }
}

fn long_row(file: &File) -> String {
    let size = file.size.map(bytes_to_human).unwrap_or_else(|| "-".into());
    let modified = chrono::DateTime::from_timestamp_millis(file.last_modified)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!(
        "{:<8} {:>10}  {}  {}",
        file.file_type.name(),
        size,
        modified,
        display_name(file)
    )
}

/// Box-drawing tree of `files`, whose first entry is the top folder
fn render_tree(files: &[File]) -> Vec<String> {
    let Some(top) = files.first() else {
        return Vec::new();
    };
    let mut children: HashMap<FileId, Vec<&File>> = HashMap::new();
    for file in &files[1..] {
        children.entry(file.parent).or_default().push(file);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let mut lines = vec![if top.id == top.parent {
        "/".to_string()
    } else {
        display_name(top)
    }];
    let mut stack: Vec<(&File, String, bool)> = children
        .get(&top.id)
        .map(|c| {
            let last = c.len().saturating_sub(1);
            c.iter()
                .enumerate()
                .rev()
                .map(|(i, f)| (*f, String::new(), i == last))
                .collect()
        })
        .unwrap_or_default();

    while let Some((file, prefix, last)) = stack.pop() {
        let branch = if last { "\u{2514}\u{2500}\u{2500} " } else { "\u{251c}\u{2500}\u{2500} " };
        lines.push(format!("{prefix}{branch}{}", display_name(file)));

        if let Some(kids) = children.get(&file.id) {
            let nested = format!("{prefix}{}", if last { "    " } else { "\u{2502}   " });
            let last_kid = kids.len().saturating_sub(1);
            for (i, kid) in kids.iter().enumerate().rev() {
                stack.push((*kid, nested.clone(), i == last_kid));
            }
        }
    }
    lines
}
