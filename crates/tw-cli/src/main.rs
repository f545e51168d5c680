//! CLI frontend for the tickworld simulation driver.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(
    name = "tw",
    about = "tickworld: a deterministic hourly world simulator",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log module-level detail (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a fresh simulation from a config file
    Run {
        /// Simulation config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Snapshot file written periodically and at shutdown
        #[arg(short, long, default_value = "world.json")]
        snapshot: PathBuf,

        /// Number of ticks to run (default: the config's max_ticks)
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Continue a simulation from its latest snapshot
    Resume {
        /// Snapshot file to resume from and keep writing to
        #[arg(short, long, default_value = "world.json")]
        snapshot: PathBuf,

        /// Simulation config (JSON) supplying the module settings
        #[arg(short, long)]
        config: PathBuf,

        /// Number of ticks to run (default: the config's max_ticks)
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Show the resources, modifiers and entities stored in a snapshot
    Inspect {
        /// Snapshot file to read
        #[arg(short, long, default_value = "world.json")]
        snapshot: PathBuf,

        /// Include expired and superseded modifiers
        #[arg(short, long)]
        all: bool,
    },

    /// Add a modifier to a saved world; it takes effect on resume
    AddModifier(commands::add_modifier::AddModifierArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            snapshot,
            ticks,
        } => commands::run::run(&config, &snapshot, ticks),
        Commands::Resume {
            snapshot,
            config,
            ticks,
        } => commands::resume::run(&snapshot, &config, ticks),
        Commands::Inspect { snapshot, all } => commands::inspect::run(&snapshot, all),
        Commands::AddModifier(args) => commands::add_modifier::run(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
