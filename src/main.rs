//! swimgate
//!
//! HTTP API front end: token authentication, role guards, CORS and
//! graceful shutdown, built with Tokio and Axum.
//!
//! ```text
//!  client ──▶ trace / request id ──▶ fault isolation ──▶ cors
//!         ──▶ timeout / limit ──▶ authenticate ──▶ route guard ──▶ handler
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use swimgate::config::{load_config, AppConfig, ConfigError, Environment};
use swimgate::lifecycle::startup::{self, AdminSeed};
use swimgate::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "swimgate", version, about = "Swimming pool management API")]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the deployment environment.
    #[arg(long, value_enum)]
    env: Option<Environment>,

    /// Create an admin account with this email at startup.
    #[arg(long, value_name = "EMAIL")]
    seed_admin: Option<String>,
}

fn build_config(args: &Args) -> Result<AppConfig, ConfigError> {
    load_config(args.config.as_deref(), |config| {
        if let Some(env) = args.env {
            config.environment = env;
        }
        if let Some(port) = args.port {
            // An unparsable address is left alone and reported by validation.
            if let Ok(mut addr) = config.listener.bind_address.parse::<SocketAddr>() {
                addr.set_port(port);
                config.listener.bind_address = addr.to_string();
            }
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&Default::default());
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        "swimgate starting"
    );

    let seed = match args.seed_admin.map(AdminSeed::from_env).transpose() {
        Ok(seed) => seed,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    match startup::run(config, seed).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Exiting with failure");
            ExitCode::FAILURE
        }
    }
}
