mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scatterbrain::config::ScatterConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scatterbrain", version, about = "Embed a text corpus and plot it in 2D/3D")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Manage embedding models
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download a model to the local cache
    Download {
        /// Model identifier, e.g. sentence-transformers/all-MiniLM-L6-v2
        #[arg(long)]
        model: Option<String>,
    },
    /// Report whether a model is cached and loads
    Check {
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let mut config = ScatterConfig::load()?;

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            scatterbrain::server::serve(config).await?;
        }
        Command::Model { action } => match action {
            ModelAction::Download { model } => {
                cli::model_download(&config, model.as_deref()).await?;
            }
            ModelAction::Check { model } => {
                let config = config.clone();
                tokio::task::spawn_blocking(move || cli::model_check(&config, model.as_deref()))
                    .await??;
            }
        },
    }

    Ok(())
}
