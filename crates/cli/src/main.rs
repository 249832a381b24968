//! Recruitr CLI, the main entry point.
//!
//! Commands:
//! - `serve` : Start the HTTP gateway
//! - `chat`  : Interactive or single-message chat with a session
//! - `tools` : List the ATS tool catalogue
//! - `reset` : Truncate a session's transcript

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "recruitr",
    about = "Recruitr: a recruiter assistant for your applicant tracking system",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.recruitr/config.toml
    #[arg(short, long, global = true, env = "RECRUITR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the assistant
    Chat {
        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Bearer token forwarded to the ATS for this session
        #[arg(short, long, env = "RECRUITR_TOKEN")]
        token: Option<String>,
    },

    /// List the tools the assistant can call
    Tools,

    /// Truncate a session's transcript to the system message
    Reset {
        /// The session to reset
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat {
            session,
            message,
            token,
        } => commands::chat::run(config_path, session, message, token).await?,
        Commands::Tools => commands::tools::run(),
        Commands::Reset { session } => commands::reset::run(config_path, &session).await?,
    }

    Ok(())
}
