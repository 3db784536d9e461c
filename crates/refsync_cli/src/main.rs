//! refsync CLI
//!
//! Keeps a local SQLite copy of a paginated remote reference catalog.
//!
//! # Commands
//!
//! - `sync` - Run a full refresh for one entity type or all of them
//! - `status` - Show stored record counts and recent runs
//! - `daemon` - Startup check, then a full refresh every day
//! - `entities` - List the known entity types

mod commands;

use clap::{Parser, Subcommand};
use commands::RemoteArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Full-refresh sync of a remote reference catalog into SQLite.
#[derive(Parser)]
#[command(name = "refsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(global = true, long, env = "REFSYNC_DB", default_value = "refsync.db")]
    db: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full refresh now
    Sync {
        /// Entity type to refresh, or `all`
        #[arg(default_value = "all")]
        entity: String,

        #[command(flatten)]
        remote: RemoteArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show stored record counts and recent runs
    Status {
        /// Number of recent runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Sync empty entity types, then refresh everything daily
    Daemon {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Time of the daily refresh, HH:MM in UTC
        #[arg(long, default_value = "03:00")]
        daily_at: String,

        /// Skip the startup check for empty entity types
        #[arg(long)]
        no_startup: bool,
    },

    /// List the known entity types
    Entities,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose; logs go to stderr so stdout stays parseable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync {
            entity,
            remote,
            format,
        } => {
            let store = commands::open_store(&cli.db)?;
            commands::sync::run(&store, &remote, &entity, &format).await?;
        }
        Commands::Status { limit, format } => {
            let store = commands::open_store(&cli.db)?;
            commands::status::run(&store, &cli.db, limit, &format)?;
        }
        Commands::Daemon {
            remote,
            daily_at,
            no_startup,
        } => {
            let store = commands::open_store(&cli.db)?;
            commands::daemon::run(&store, &remote, &daily_at, !no_startup).await?;
        }
        Commands::Entities => commands::entities::run(),
    }

    Ok(())
}
