use anyhow::Result;
use clap::{Parser, Subcommand};

mod config;
mod device;
mod feed_cmd;
mod fetch;
mod sched_cmd;
mod setup;
mod state;
mod store_json;

use sched_cmd::{PermissionCommand, TimesCommand};

#[derive(Parser, Debug)]
#[command(name = "factcast", version, about = "Daily facts notification scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One-time interactive setup: timezone, locale, delivery times
    Setup,

    /// Reconcile the notification queue and top it up to the cap
    Sync,

    /// Tear down and rebuild the whole schedule
    Reschedule,

    /// Cancel all pending notifications
    Clear {
        /// Also wipe past scheduling state (feed history stays)
        #[arg(long)]
        include_past: bool,
    },

    /// Show or change the daily delivery times
    Times {
        #[command(subcommand)]
        command: TimesCommand,
    },

    /// Simulated device permission controls
    Permission {
        #[command(subcommand)]
        command: PermissionCommand,
    },

    /// Queue and store summary, with a schedule validity check
    Status,

    /// Download facts into the local store
    Fetch {
        /// Feed URL (default: from config)
        #[arg(long)]
        url: Option<String>,

        /// Also prefetch notification images
        #[arg(long, default_value_t = false)]
        prefetch_images: bool,
    },

    /// Show delivered facts, newest first
    Feed {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Setup => setup::run_setup().await,
        Command::Sync => sched_cmd::run_sync().await,
        Command::Reschedule => sched_cmd::run_reschedule().await,
        Command::Clear { include_past } => sched_cmd::run_clear(include_past).await,
        Command::Times { command } => sched_cmd::run_times(command).await,
        Command::Permission { command } => sched_cmd::run_permission(command).await,
        Command::Status => sched_cmd::run_status().await,
        Command::Fetch {
            url,
            prefetch_images,
        } => fetch::run_fetch(url, prefetch_images).await,
        Command::Feed { limit } => feed_cmd::run_feed(limit).await,
    }
}
