//! MacroSage CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Start the HTTP API gateway
//! - `chat`   — Ask the advisor a single question from the terminal
//! - `doctor` — Diagnose configuration and storage health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "macrosage",
    about = "MacroSage — Economic Decision Advisor",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API gateway
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the advisor a single question
    Chat {
        /// The question to ask
        message: String,

        /// User id for profile and history lookup
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// Diagnose configuration and storage health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { message, user } => commands::chat::run(&user, &message).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
