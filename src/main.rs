use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gltf_relay::config::RelayConfig;
use gltf_relay::server;

#[derive(Parser)]
#[command(name = "gltf-relay")]
#[command(version, about = "Onshape glTF translation relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Port to listen on (overrides config file and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the config file (defaults to ./relay.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Enable dev mode (permissive CORS for a local viewer dev server)
        #[arg(long)]
        dev: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gltf_relay=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, config, dev } => {
            let mut config = RelayConfig::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if dev {
                config.dev_mode = true;
            }
            server::start_server(config).await
        }
    }
}
