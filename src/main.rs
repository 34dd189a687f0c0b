//! Sprig CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "Function-level graph view of JavaScript and TypeScript projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every source file, derive the graph and exit
    Index {
        /// Print the derived graph as JSON
        #[arg(long)]
        json: bool,

        /// Save node placements to .sprig/session.json
        #[arg(long)]
        save: bool,
    },
    /// Keep the graph in sync with changes on disk
    Watch,
    /// Remove the saved session
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("sprig={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Sprig v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Project root: {}", cli.root.display());

    match cli.command {
        Commands::Index { json, save } => commands::index(cli.root, json, save),
        Commands::Watch => commands::watch(cli.root).await,
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("Sprig v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
