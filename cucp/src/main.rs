//! cucp - 5G CU-CP control plane node
//!
//! # Usage
//!
//! ```bash
//! cucp -c config/cucp.yaml
//! cucp -c config/cucp.yaml --log-level debug
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use cucp::{load_config, CucpApp};
use cucp_common::{init_logging, LogLevel};

/// cucp - 5G CU-CP control plane node
#[derive(Parser, Debug)]
#[command(name = "cucp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the CU-CP configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Overrides `logging.level` from the configuration
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run_cucp(args).await {
        Ok(()) => {
            info!("CU-CP exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("CU-CP failed: {:#}", e);
            eprintln!("cucp: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_cucp(args: Args) -> Result<()> {
    let config = load_config(&args.config_file)
        .with_context(|| format!("Failed to load configuration from {}", args.config_file))?;

    let level = args.log_level.unwrap_or(config.logging.level);
    init_logging(level, config.logging.format)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")?;

    info!(
        node = %config.cucp.node_name,
        amf = %format!("{}:{}", config.ngap.amf_address, config.ngap.amf_port),
        f1 = %format!("{}:{}", config.f1ap.local_address, config.f1ap.local_port),
        "Configuration loaded"
    );

    let app = CucpApp::start(&config)
        .await
        .context("Failed to start CU-CP")?;
    info!("CU-CP started, waiting for shutdown signal...");

    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating shutdown...");

    app.shutdown().await;
    Ok(())
}
