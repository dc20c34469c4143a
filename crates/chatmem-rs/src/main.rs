//! Command-line host for the chatmem archive.

mod input;

use anyhow::{Context, bail};
use chatmem_rs::config::{ChatmemConfig, LayeredConfigOptions};
use chatmem_rs::memory::{
    FileHandlePersistence, HandleState, LocalResolver, MemoryArchive, PathPicker,
};
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line options for the archive host.
#[derive(Parser)]
#[command(name = "chatmem", version)]
struct Cli {
    /// Optional chatmem.json5 layered on top of user and cwd config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Restore the saved directory and report its state
    Status,
    /// Choose the archive directory and remember it
    Select {
        /// Directory to archive into; defaults to archive.directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Re-grant access to the remembered directory
    Reconnect,
    /// Backfill every conversation from an export file
    Sync {
        /// JSON export, keyed by conversation id or a list
        #[arg(long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatmem_rs::init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let archive = build_archive(&config)?;
    let restored = archive.init().await;
    debug!("archive initialised (restored={restored})");

    match cli.command {
        Command::Status => print_status(&archive),
        Command::Select { dir } => {
            let dir = dir.or_else(|| config.archive.directory.as_ref().map(PathBuf::from));
            let Some(dir) = dir else {
                bail!("no directory given; pass --dir or set archive.directory");
            };
            let picker = PathPicker::new(Some(dir.clone()));
            if !archive.select_directory(&picker, false).await {
                bail!("could not select {}", dir.display());
            }
            println!("archiving to {}", dir.display());
        }
        Command::Reconnect => {
            if !archive.reconnect().await {
                bail!("no remembered directory could be reconnected; run `chatmem select`");
            }
            print_status(&archive);
        }
        Command::Sync { input } => {
            if !archive.is_enabled() {
                bail!("archive is not enabled; run `chatmem select` or `chatmem reconnect`");
            }
            let conversations = input::load_conversations(&input)?;
            info!(
                "syncing export (path={}, conversations={})",
                input.display(),
                conversations.len()
            );
            let submitted = archive
                .sync_all_chats(&conversations)
                .await
                .context("sync failed")?;
            println!("submitted {submitted} messages");
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ChatmemConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = cli.config.as_ref() {
        options = options.with_runtime_path(path);
    }
    let layered = ChatmemConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

fn build_archive(config: &ChatmemConfig) -> anyhow::Result<MemoryArchive> {
    let persistence = match config.handles.path.as_ref() {
        Some(path) => FileHandlePersistence::new(path),
        None => FileHandlePersistence::load_default()
            .context("failed to resolve handle store location")?,
    };
    debug!("handle store (path={})", persistence.path().display());
    Ok(MemoryArchive::new(
        config.archive.clone(),
        Arc::new(persistence),
        Arc::new(LocalResolver),
    ))
}

fn print_status(archive: &MemoryArchive) {
    let state = match archive.handle_state() {
        HandleState::Active => "enabled",
        HandleState::Pending => "needs reconnect",
        HandleState::Missing => "not configured",
    };
    match archive.directory_name() {
        Some(name) => println!("{state} ({name})"),
        None => println!("{state}"),
    }
}
