//! Sync command - Exchange changes with the server
//!
//! Provides the `strongbox sync` and `strongbox status` CLI commands:
//! 1. `sync` runs one cycle and prints progress and a summary
//! 2. `sync --watch` keeps syncing on the configured interval until Ctrl-C
//! 3. `status` shows pending local and server work without syncing

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use strongbox::{ProgressCallback, SyncProgress, SyncResult};
use strongbox_core::config::Config;
use strongbox_core::domain::WorkUnit;
use tracing::info;

use super::open;
use crate::output::{get_formatter, print_serialized, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Keep running and sync every `sync.auto_sync_interval_secs`
    #[arg(long)]
    pub watch: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;

        if self.watch {
            return self.watch(&sb, formatter.as_ref(), format.is_json()).await;
        }

        let progress: Option<ProgressCallback> = (!format.is_json()).then(|| {
            Arc::new(|p: SyncProgress| println!("  [{}/{}] {}", p.progress, p.total, p.msg))
                as ProgressCallback
        });
        let result = sb.sync(progress).await.context("Sync failed")?;

        if format.is_json() {
            print_serialized(formatter.as_ref(), &result);
        } else {
            print_summary(formatter.as_ref(), &result);
        }
        Ok(())
    }

    async fn watch(
        &self,
        sb: &strongbox::Strongbox,
        formatter: &dyn OutputFormatter,
        json: bool,
    ) -> Result<()> {
        if sb.config().sync.auto_sync_interval_secs == 0 {
            formatter.warn("sync.auto_sync_interval_secs is 0; only the initial sync will run");
        }

        let (scheduler, handle) = sb.scheduler();
        let running = tokio::spawn(scheduler.run());
        handle.request_sync();
        formatter.success("Watching for changes, press Ctrl-C to stop");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        handle.shutdown();
        let stats = running.await.context("Scheduler task failed")?;

        info!(syncs = stats.syncs, failures = stats.failures, "Stopped watching");
        if json {
            formatter.print_json(&serde_json::json!({
                "syncs": stats.syncs,
                "failures": stats.failures,
            }));
            return Ok(());
        }
        formatter.success(&format!(
            "Stopped after {} sync{} ({} failed)",
            stats.syncs,
            if stats.syncs == 1 { "" } else { "s" },
            stats.failures
        ));
        Ok(())
    }
}

fn print_summary(formatter: &dyn OutputFormatter, result: &SyncResult) {
    formatter.success(&format!("Sync completed in {} ms", result.duration_ms));
    formatter.info(&format!("Pulled:     {}", result.files_pulled));
    formatter.info(&format!("Pushed:     {}", result.files_pushed));
    formatter.info(&format!("Downloaded: {}", result.documents_downloaded));
    if result.conflicts_resolved > 0 {
        formatter.warn(&format!(
            "{} conflict{} resolved; look for conflicted copies",
            result.conflicts_resolved,
            if result.conflicts_resolved == 1 { "" } else { "s" }
        ));
    }
    if result.files_pruned > 0 {
        formatter.info(&format!("No longer shared with you: {}", result.files_pruned));
    }
}

/// Show pending work without syncing
#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sb = open(config).await?;

        let last_synced = sb.get_last_synced_human_string().await?;
        let changes = sb.get_local_changes().await?;
        let work = sb.calculate_work().await.context("Failed to reach the server")?;
        let server_changes = work
            .work_units
            .iter()
            .filter(|w| matches!(w, WorkUnit::ServerChange(_)))
            .count();

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "last_synced": last_synced,
                "local_changes": changes,
                "server_changes": server_changes,
                "work_units": work.work_units,
            }));
            return Ok(());
        }

        formatter.line(&format!("Last synced: {last_synced}"));
        if work.is_empty() {
            formatter.success("Everything is up to date");
            return Ok(());
        }

        formatter.line(&format!("Local changes: {}", changes.len()));
        for change in &changes {
            let path = sb
                .get_path_by_id(change.file_id)
                .await
                .unwrap_or_else(|_| change.file_id.to_string());
            formatter.info(&format!("{:<12} {}", change.kind.as_str(), path));
        }
        formatter.line(&format!("Server changes: {server_changes}"));
        Ok(())
    }
}
