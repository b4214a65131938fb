//! Config command - View and manage strongbox configuration
//!
//! Provides the `strongbox config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use strongbox_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("server.api_url", "Base URL of the strongbox server"),
    ("server.request_timeout_secs", "Per-request timeout"),
    ("server.max_retries", "Retries for transient failures"),
    ("server.retry_base_delay_ms", "First retry delay, doubled each attempt"),
    ("sync.auto_sync_interval_secs", "Seconds between syncs in watch mode, 0 = off"),
    ("sync.max_merge_attempts", "Push attempts before a sync gives up"),
    ("sync.parallel_transfers", "Concurrent document transfers"),
    ("storage.data_dir", "Local database and blob directory"),
    ("storage.chunk_min_bytes", "Smallest content chunk"),
    ("storage.chunk_avg_bytes", "Target content chunk, a power of two"),
    ("storage.chunk_max_bytes", "Largest content chunk"),
    ("rate_limiting.requests_per_second", "Steady request rate"),
    ("rate_limiting.burst", "Requests allowed in a burst"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.file", "Log file path"),
    ("logging.max_size_mb", "Max log file size (MiB)"),
    ("logging.max_files", "Max rotated log files"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.auto_sync_interval_secs")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Set { key, value } => execute_set(config_path, key, value, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = Config::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.line(line);
        }
    }
    Ok(())
}

fn execute_set(config_path: &Path, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = Config::load_or_default(config_path);

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{key}': {e:#}"));
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {name:<36} - {help}"));
            }
        }
        return Ok(());
    }

    let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{key}': {}", errors.join("; ")));
        }
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    std::fs::write(config_path, yaml).context("Failed to write configuration file")?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {key} = {value}"));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    if !config_path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": config_path.display().to_string(),
                "errors": ["Configuration file not found. Using defaults."],
            }));
        } else {
            formatter.info(&format!(
                "Configuration file not found at {}",
                config_path.display()
            ));
            formatter.info(
                "Using default configuration. Run 'strongbox config set <key> <value>' to create one.",
            );
        }
        return Ok(());
    }

    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {e:#}")],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {e:#}"));
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Expected a positive integer for {key}"))
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- server ---
        "server.api_url" => config.server.api_url = value.trim_end_matches('/').to_string(),
        "server.request_timeout_secs" => config.server.request_timeout_secs = parse(key, value)?,
        "server.max_retries" => config.server.max_retries = parse(key, value)?,
        "server.retry_base_delay_ms" => config.server.retry_base_delay_ms = parse(key, value)?,

        // --- sync ---
        "sync.auto_sync_interval_secs" => config.sync.auto_sync_interval_secs = parse(key, value)?,
        "sync.max_merge_attempts" => config.sync.max_merge_attempts = parse(key, value)?,
        "sync.parallel_transfers" => config.sync.parallel_transfers = parse(key, value)?,

        // --- storage ---
        "storage.data_dir" => config.storage.data_dir = PathBuf::from(value),
        "storage.chunk_min_bytes" => config.storage.chunk_min_bytes = parse(key, value)?,
        "storage.chunk_avg_bytes" => config.storage.chunk_avg_bytes = parse(key, value)?,
        "storage.chunk_max_bytes" => config.storage.chunk_max_bytes = parse(key, value)?,

        // --- rate_limiting ---
        "rate_limiting.requests_per_second" => {
            config.rate_limiting.requests_per_second = parse(key, value)?
        }
        "rate_limiting.burst" => config.rate_limiting.burst = parse(key, value)?,

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),
        "logging.file" => config.logging.file = PathBuf::from(value),
        "logging.max_size_mb" => config.logging.max_size_mb = parse(key, value)?,
        "logging.max_files" => config.logging.max_files = parse(key, value)?,

        _ => anyhow::bail!("Unknown configuration key: '{key}'"),
    }
    Ok(())
}
