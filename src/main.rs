//! CCG Gateway - forwarding gateway for AI-assistant CLIs

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use ccg_gateway::{GatewayConfig, server};

#[derive(Debug, Parser)]
#[command(name = "gateway", version, about = "Forwarding gateway for AI-assistant CLIs")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "GATEWAY_CONFIG", default_value = "gateway.yaml")]
    config: PathBuf,

    /// Override the configured bind host
    #[arg(long, env = "GATEWAY_HOST")]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long, env = "GATEWAY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = GatewayConfig::load_or_default(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    server::run(config).await?;
    Ok(())
}
