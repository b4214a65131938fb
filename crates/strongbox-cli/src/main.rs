//! strongbox - Command-line client for an encrypted, synced file tree
//!
//! Provides commands for:
//! - Creating and moving accounts between devices
//! - Browsing and editing files
//! - Syncing with the server
//! - Sharing files with other users
//! - Importing from and exporting to the local disk

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use strongbox_core::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

mod commands;
mod log_file;
mod output;

use log_file::RotatingFile;

use commands::{
    account::AccountCommand,
    config::ConfigCommand,
    files::{
        CatCommand, LsCommand, MkdirCommand, MvCommand, NewCommand, RenameCommand, RmCommand,
        TreeCommand, WriteCommand,
    },
    sharing::{AcceptCommand, PendingCommand, RejectCommand, ShareCommand},
    sync::{StatusCommand, SyncCommand},
    transfer::{ExportCommand, ImportCommand},
    usage::{SearchCommand, UsageCommand},
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "strongbox", version, about = "End-to-end encrypted file sync")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Account management
    #[command(subcommand)]
    Account(AccountCommand),
    /// List a folder
    Ls(LsCommand),
    /// Show a folder tree
    Tree(TreeCommand),
    /// Create a folder
    Mkdir(MkdirCommand),
    /// Create an empty document
    New(NewCommand),
    /// Print a document
    Cat(CatCommand),
    /// Replace a document's content
    Write(WriteCommand),
    /// Move a file into another folder
    Mv(MvCommand),
    /// Rename a file
    Rename(RenameCommand),
    /// Delete a file or folder
    Rm(RmCommand),
    /// Synchronize with the server
    Sync(SyncCommand),
    /// Show pending changes
    Status(StatusCommand),
    /// Share a file with another user
    Share(ShareCommand),
    /// List shares waiting for an answer
    Pending(PendingCommand),
    /// Accept a pending share
    Accept(AcceptCommand),
    /// Reject a pending share
    Reject(RejectCommand),
    /// Show storage usage
    Usage(UsageCommand),
    /// Search paths and document content
    Search(SearchCommand),
    /// Copy local files into the tree
    Import(ImportCommand),
    /// Copy a file or folder out to disk
    Export(ExportCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    fn log_filter(&self, config: &Config) -> EnvFilter {
        let level = if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => config.logging.level.as_str(),
                1 => "debug",
                _ => "trace",
            }
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };
    let (log_file, log_file_error) = match RotatingFile::from_config(&config.logging) {
        Ok(file) => (
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)).boxed()),
            None,
        ),
        Err(e) => (None, Some(e)),
    };
    tracing_subscriber::registry()
        .with(cli.log_filter(&config))
        .with(console)
        .with(log_file)
        .init();
    if let Some(e) = log_file_error {
        tracing::warn!(file = %config.logging.file.display(), error = %e, "Log file unavailable");
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Account(cmd) => cmd.execute(&config, format).await,
        Commands::Ls(cmd) => cmd.execute(&config, format).await,
        Commands::Tree(cmd) => cmd.execute(&config, format).await,
        Commands::Mkdir(cmd) => cmd.execute(&config, format).await,
        Commands::New(cmd) => cmd.execute(&config, format).await,
        Commands::Cat(cmd) => cmd.execute(&config, format).await,
        Commands::Write(cmd) => cmd.execute(&config, format).await,
        Commands::Mv(cmd) => cmd.execute(&config, format).await,
        Commands::Rename(cmd) => cmd.execute(&config, format).await,
        Commands::Rm(cmd) => cmd.execute(&config, format).await,
        Commands::Sync(cmd) => cmd.execute(&config, format).await,
        Commands::Status(cmd) => cmd.execute(&config, format).await,
        Commands::Share(cmd) => cmd.execute(&config, format).await,
        Commands::Pending(cmd) => cmd.execute(&config, format).await,
        Commands::Accept(cmd) => cmd.execute(&config, format).await,
        Commands::Reject(cmd) => cmd.execute(&config, format).await,
        Commands::Usage(cmd) => cmd.execute(&config, format).await,
        Commands::Search(cmd) => cmd.execute(&config, format).await,
        Commands::Import(cmd) => cmd.execute(&config, format).await,
        Commands::Export(cmd) => cmd.execute(&config, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}
