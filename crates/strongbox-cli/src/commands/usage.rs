//! Usage and search commands

use anyhow::Result;
use clap::Args;
use strongbox_core::config::Config;

use super::open;
use crate::output::{get_formatter, print_serialized, OutputFormat};

/// Show storage used on the server and the data cap
#[derive(Debug, Args)]
pub struct UsageCommand {
    /// Print byte counts instead of rounded sizes
    #[arg(long)]
    pub exact: bool,
}

impl UsageCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let usage = sb.get_usage().await?;
        let uncompressed = sb.get_uncompressed_usage().await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "server_usage": usage.server_usage,
                "data_cap": usage.data_cap,
                "uncompressed": uncompressed,
                "fraction_used": usage.fraction_used(),
            }));
            return Ok(());
        }

        let show = |exact: u64, readable: &str| {
            if self.exact {
                format!("{exact} B")
            } else {
                readable.to_string()
            }
        };
        formatter.line(&format!(
            "Server usage:   {}",
            show(usage.server_usage.exact, &usage.server_usage.readable)
        ));
        formatter.line(&format!(
            "Data cap:       {}",
            show(usage.data_cap.exact, &usage.data_cap.readable)
        ));
        formatter.line(&format!(
            "Uncompressed:   {}",
            show(uncompressed.exact, &uncompressed.readable)
        ));
        formatter.line(&format!("Used:           {:.1}%", usage.fraction_used() * 100.0));
        if usage.fraction_used() >= 0.9 {
            formatter.warn("You are close to your data cap");
        }
        Ok(())
    }
}

/// Find files by path or content
#[derive(Debug, Args)]
pub struct SearchCommand {
    pub query: String,
    /// Only match file paths
    #[arg(long, conflicts_with = "content_only")]
    pub paths_only: bool,
    /// Only match text document content
    #[arg(long)]
    pub content_only: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;
        let results = sb
            .search(&self.query, !self.content_only, !self.paths_only)
            .await?;

        if format.is_json() {
            print_serialized(formatter.as_ref(), &results);
            return Ok(());
        }
        if results.paths.is_empty() && results.contents.is_empty() {
            formatter.info(&format!("Nothing matches '{}'", self.query));
            return Ok(());
        }

        for hit in &results.paths {
            formatter.line(&hit.path);
        }
        for hit in &results.contents {
            formatter.line(&format!(
                "{} ({} match{})",
                hit.path,
                hit.matches,
                if hit.matches == 1 { "" } else { "es" }
            ));
            for snippet in &hit.snippets {
                formatter.info(snippet);
            }
        }
        Ok(())
    }
}
