//! Outpost CLI
//!
//! Thin collaborator around outpost-core for command-line usage: it enqueues
//! mutations, inspects the published status, and triggers manual syncs.
//!
//! ## Usage
//!
//! ```bash
//! # Show queue status
//! outpost status
//!
//! # Queue a write for later delivery
//! outpost queue add /tasks --method POST --data '{"title":"water plants"}'
//!
//! # List queued mutations
//! outpost queue list
//!
//! # Discard a queued mutation
//! outpost queue drop <mutation_id>
//!
//! # Sync now against the remote service
//! outpost sync --base-url https://api.example.com
//!
//! # Force local-only operation
//! outpost offline on
//! outpost offline off
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use outpost_core::{
    ConnectivityMonitor, HttpTransport, MutationId, OutboxConfig, OutboxEngine, WriteMethod,
};

/// Outpost - Offline-First Outbox Queue
#[derive(Parser)]
#[command(name = "outpost")]
#[command(version = "0.1.0")]
#[command(about = "Outpost - Offline-First Outbox Queue")]
#[command(
    long_about = "Durable local queueing of write mutations with FIFO replay against a remote service."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.outpost/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the remote service
    #[arg(short, long, global = true, default_value = "http://127.0.0.1:8080")]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show queue status
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue management
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Run a sync pass now
    Sync,

    /// Offline mode preference
    Offline {
        #[command(subcommand)]
        action: OfflineAction,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Queue a mutation for later delivery
    Add {
        /// Target endpoint (path + optional query)
        endpoint: String,
        /// Write verb: POST, PUT, PATCH, or DELETE
        #[arg(short, long, default_value = "POST")]
        method: String,
        /// Request body
        #[arg(long, default_value = "")]
        data: String,
        /// Content tag forwarded with the body
        #[arg(long, default_value = "application/json")]
        content_kind: String,
    },
    /// List queued mutations in delivery order
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard a queued mutation without delivering it
    Drop {
        /// Mutation id (ULID)
        id: String,
    },
}

#[derive(Subcommand)]
enum OfflineAction {
    /// Enable offline mode (accumulate writes locally)
    On,
    /// Disable offline mode (resume automatic syncing)
    Off,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.outpost/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".outpost")
        .join("data")
}

/// Parse a mutation ID from ULID string
fn parse_mutation_id(s: &str) -> Result<MutationId> {
    MutationId::from_string(s).map_err(|e| anyhow::anyhow!("Invalid mutation ID '{}': {}", s, e))
}

/// Format a unix timestamp for display
fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("@{}", ts))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let transport = Arc::new(HttpTransport::new(&cli.base_url));
    // One-shot process: only the sync command presents as reachable, so no
    // other command can spawn a background pass that dies with the process.
    // The sync call's own result is authoritative anyway.
    let reachable = matches!(&cli.command, Commands::Sync);
    let monitor = Arc::new(ConnectivityMonitor::new(reachable));
    let config = OutboxConfig {
        sync_on_enqueue: false,
        ..OutboxConfig::default()
    };
    let engine = OutboxEngine::open_with_config(&data_dir, transport, monitor, config)?;

    match cli.command {
        Commands::Status { json } => {
            let status = engine.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Outpost queue status");
                println!();
                println!("  Pending: {}", status.pending_count);
                match status.last_sync_at {
                    Some(ts) => println!("  Last sync: {}", format_timestamp(ts)),
                    None => println!("  Last sync: never"),
                }
                println!(
                    "  Offline mode: {}",
                    if status.offline_mode_enabled {
                        "enabled"
                    } else {
                        "disabled"
                    }
                );
                if let Some(age) = engine.oldest_pending_age_secs()? {
                    println!("  Oldest pending: {}s ago", age);
                }
                println!();
                println!("Data directory: {}", data_dir.display());
            }
        }

        Commands::Queue { action } => match action {
            QueueAction::Add {
                endpoint,
                method,
                data,
                content_kind,
            } => {
                let method = WriteMethod::from_str(&method)
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
                let mutation =
                    engine.enqueue(&endpoint, method, data.into_bytes(), &content_kind)?;
                println!("Queued for delivery:");
                println!("  ID: {}", mutation.id.to_string_repr());
                println!("  {} {}", mutation.method, mutation.endpoint);
            }

            QueueAction::List { json } => {
                let pending = engine.list_pending()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&pending)?);
                } else if pending.is_empty() {
                    println!("Queue is empty.");
                } else {
                    println!("{} pending mutation(s):", pending.len());
                    println!();
                    for mutation in pending {
                        println!("  ID: {}", mutation.id.to_string_repr());
                        println!("    {} {}", mutation.method, mutation.endpoint);
                        println!(
                            "    enqueued {} (attempt {})",
                            format_timestamp(mutation.enqueued_at),
                            mutation.attempt
                        );
                    }
                }
            }

            QueueAction::Drop { id } => {
                let id = parse_mutation_id(&id)?;
                engine.discard(&id)?;
                println!("Dropped {}", id.to_string_repr());
            }
        },

        Commands::Sync => {
            let outcome = engine.request_sync().await?;
            println!("Sync {}", outcome);
        }

        Commands::Offline { action } => match action {
            OfflineAction::On => {
                engine.set_offline_mode_enabled(true)?;
                println!("Offline mode enabled. Writes will accumulate locally.");
            }
            OfflineAction::Off => {
                engine.set_offline_mode_enabled(false)?;
                println!("Offline mode disabled.");
            }
        },
    }

    Ok(())
}
