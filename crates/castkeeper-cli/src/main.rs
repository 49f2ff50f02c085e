mod cmd;
mod output;
mod root;
mod services;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, schedule::ScheduleSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "castkeeper",
    about = "Unattended live-broadcast worker and status dashboard",
    version,
    propagate_version = true
)]
struct Cli {
    /// Installation root holding config.yaml (default: search upward from cwd)
    #[arg(long, global = true, env = "CASTKEEPER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run today's broadcasts, then exit
    Worker {
        /// Do not supervise the dashboard
        #[arg(long)]
        no_watchdog: bool,
    },

    /// Serve the status dashboard
    Dashboard {
        /// Port to listen on (overrides dashboard.port; 0 = OS-assigned)
        #[arg(long)]
        port: Option<u16>,
        /// Do not supervise the worker
        #[arg(long)]
        no_watchdog: bool,
    },

    /// Show worker and dashboard health from their heartbeats
    Status,

    /// Inspect and edit the broadcast schedule
    Schedule {
        #[command(subcommand)]
        subcommand: ScheduleSubcommand,
    },

    /// Create, show and validate config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Worker { .. } | Commands::Dashboard { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Worker { no_watchdog } => cmd::worker::run(&root, no_watchdog),
        Commands::Dashboard { port, no_watchdog } => cmd::dashboard::run(&root, port, no_watchdog),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Schedule { subcommand } => cmd::schedule::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
