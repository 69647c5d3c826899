//! SignalHub Server — WebRTC signaling plane
//!
//! Main entry point that loads configuration, initializes logging and runs
//! the server until Ctrl+C or SIGTERM.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use signalhub_core::config::AppConfig;

/// SignalHub — room membership, presence and peer signaling over WebSocket
#[derive(Debug, Parser)]
#[command(name = "signalhub-server", version, about, long_about = None)]
struct Cli {
    /// Directory holding `default.toml` and environment overlays
    #[arg(long, env = "SIGNALHUB_CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Environment overlay to apply (`<config-dir>/<env>.toml`)
    #[arg(long, env = "SIGNALHUB_ENV", default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config_dir, &cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(
        config_dir = %cli.config_dir,
        env = %cli.env,
        "Starting SignalHub v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = signalhub_api::run_server(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
