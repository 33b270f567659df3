//! # shadowtrail CLI - checkpoints for a project directory
//!
//! Operator surface over the shadowtrail library: create the shadow store,
//! take snapshots, restore them and inspect what is recorded.
//!
//! ## Usage
//! ```bash
//! # Create the shadow store for the current directory
//! shadowtrail init
//!
//! # Snapshot before a risky change
//! shadowtrail snapshot -m "before refactor"
//!
//! # List snapshots, newest first
//! shadowtrail list
//!
//! # Put the working tree back
//! shadowtrail restore <ref>
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use shadowtrail::{abbreviate, Result, ShadowConfig, ShadowError, ShadowHistory, StoreState};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// shadowtrail - project checkpoints without touching your git history
#[derive(Parser)]
#[command(name = "shadowtrail")]
#[command(version)]
#[command(about = "Snapshot and restore a project directory through an isolated shadow store")]
#[command(long_about = None)]
struct Cli {
    /// Project directory (defaults to current)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Global root holding all shadow stores (defaults to $SHADOWTRAIL_HOME or ~/.shadowtrail)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Timeout for each git invocation, e.g. "30s" or "2m"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or refresh the shadow store
    Init,

    /// Record the current state of the project
    #[command(alias = "cp")]
    Snapshot {
        /// Snapshot message
        #[arg(short, long, default_value = "checkpoint")]
        message: String,
    },

    /// Restore the project to a snapshot
    #[command(alias = "rs")]
    Restore {
        /// Snapshot reference (a unique prefix is enough)
        reference: String,
    },

    /// Print the most recent snapshot reference
    Head,

    /// List snapshots
    #[command(alias = "ls")]
    List {
        /// Limit results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List files recorded in a snapshot
    Files {
        /// Snapshot reference (defaults to the most recent)
        reference: Option<String>,
    },

    /// Show where this project's state is kept
    Paths,

    /// Show the lifecycle state of the shadow store
    State,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("shadowtrail=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    // Run command
    if let Err(e) = run(cli).await {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Main command runner
async fn run(cli: Cli) -> Result<()> {
    let project = cli.path.clone().unwrap_or_else(|| PathBuf::from("."));
    let history = open_history(&cli, project)?;

    match cli.command {
        Commands::Init => cmd_init(&history).await,
        Commands::Snapshot { message } => cmd_snapshot(&history, &message).await,
        Commands::Restore { reference } => cmd_restore(&history, &reference).await,
        Commands::Head => {
            println!("{}", history.current_snapshot_ref().await?);
            Ok(())
        }
        Commands::List { limit, json } => cmd_list(&history, limit, json).await,
        Commands::Files { reference } => cmd_files(&history, reference.as_deref()).await,
        Commands::Paths => cmd_paths(&history).await,
        Commands::State => cmd_state(&history).await,
    }
}

/// Build the manager from the config file and command-line overrides
fn open_history(cli: &Cli, project: PathBuf) -> Result<ShadowHistory> {
    let mut config = match &cli.config {
        Some(path) => ShadowConfig::from_json_file(path)?,
        None => ShadowConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.global_root = Some(root.clone());
    }

    let mut builder = ShadowHistory::builder().config(config);
    if let Some(timeout) = cli.timeout {
        builder = builder.engine_timeout(timeout);
    }
    builder.build(project)
}

/// Create the shadow store, or refresh its config and ignore rules
async fn cmd_init(history: &ShadowHistory) -> Result<()> {
    let start = Instant::now();
    history.initialize().await?;
    let head = history.current_snapshot_ref().await?;

    println!("{} Shadow store ready", "✓".green().bold());
    println!("  Project: {}", history.identity().root_path.display().to_string().cyan());
    println!("  Store: {}", history.layout().history_dir.display().to_string().cyan());
    println!("  Head: {}", abbreviate(&head).yellow());
    println!("  Time: {}", format_duration(round_ms(start.elapsed())).to_string().cyan());
    Ok(())
}

/// Record a snapshot
async fn cmd_snapshot(history: &ShadowHistory, message: &str) -> Result<()> {
    let start = Instant::now();
    let reference = history.snapshot(message).await?;

    println!(
        "{} Created snapshot {}",
        "✓".green().bold(),
        abbreviate(&reference).yellow().bold()
    );
    println!("  Message: {}", message.cyan());
    println!("  Time: {}", format_duration(round_ms(start.elapsed())).to_string().cyan());
    Ok(())
}

/// Restore a snapshot
///
/// A unique prefix of a listed snapshot is expanded to its full reference;
/// anything else is handed to git as given.
async fn cmd_restore(history: &ShadowHistory, reference: &str) -> Result<()> {
    let snapshots = history.list_snapshots(None).await?;
    let matches: Vec<_> = snapshots
        .iter()
        .filter(|s| s.reference.starts_with(reference))
        .collect();
    let full = match matches.as_slice() {
        [only] => only.reference.clone(),
        [] => reference.to_string(),
        _ => {
            return Err(ShadowError::InvalidReference(format!(
                "{} (matches {} snapshots)",
                reference,
                matches.len()
            )))
        }
    };

    println!("{} {}", "Restoring snapshot".blue().bold(), abbreviate(&full).yellow());
    let start = Instant::now();
    history.restore(&full).await?;

    println!("{} Restore complete", "✓".green().bold());
    println!("  Time: {}", format_duration(round_ms(start.elapsed())).to_string().cyan());
    Ok(())
}

/// List snapshots, newest first
async fn cmd_list(history: &ShadowHistory, limit: Option<usize>, json: bool) -> Result<()> {
    let snapshots = history.list_snapshots(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("{}", "No snapshots".yellow());
        return Ok(());
    }

    for snapshot in &snapshots {
        println!(
            "{} {} {}",
            snapshot.short_ref().yellow(),
            snapshot
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            snapshot.message
        );
    }
    Ok(())
}

/// List files recorded in a snapshot
async fn cmd_files(history: &ShadowHistory, reference: Option<&str>) -> Result<()> {
    for path in history.tracked_files(reference).await? {
        println!("{}", path.display());
    }
    Ok(())
}

/// Show the project's storage locations
async fn cmd_paths(history: &ShadowHistory) -> Result<()> {
    let temp = history.ensure_temp_dir().await?;
    let identity = history.identity();

    println!("{}", "Project".bold());
    println!("  Root: {}", identity.root_path.display().to_string().cyan());
    println!("  Fingerprint: {}", identity.fingerprint.yellow());
    println!("{}", "Storage".bold());
    println!("  History: {}", history.layout().history_dir.display().to_string().cyan());
    println!("  Temp: {}", temp.display().to_string().cyan());
    Ok(())
}

/// Show the shadow store's lifecycle state
async fn cmd_state(history: &ShadowHistory) -> Result<()> {
    let state = history.state().await;
    let label = match state {
        StoreState::Initialized => state.to_string().green(),
        StoreState::Uninitialized | StoreState::Unchecked => state.to_string().yellow(),
        StoreState::EngineUnavailable => state.to_string().red(),
    };
    println!("{}", label);

    let engine = history.engine();
    println!(
        "  Engine: {} (timeout {})",
        engine.binary().display().to_string().cyan(),
        format_duration(engine.timeout())
    );
    Ok(())
}

/// Drop sub-millisecond noise from displayed durations
fn round_ms(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
