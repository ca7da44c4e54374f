//! data-service: a single-resource key/value server
//!
//! Serves the `data` resource over a minimal HTTP/1.0-style text protocol:
//! - `GET /data/KEY` reads a key
//! - `PUT /data/KEY` creates a key that does not exist yet
//! - `POST /data/KEY` updates a key that already exists
//! - `DELETE /data/KEY` removes a key
//!
//! Each connection carries exactly one request and is closed after the reply.
//! Configuration via CLI arguments or TOML file.

mod config;
mod handler;
mod protocol;
mod server;
mod storage;

use config::Config;
use server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .init();

    info!(
        listen = %config.listen,
        max_request_size = config.max_request_size,
        connection_timeout = ?config.connection_timeout,
        max_connections = config.max_connections,
        seed_entries = config.seed.len(),
        "Starting data-service"
    );

    let server = match Server::bind(config.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!(listen = %config.listen, error = %e, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    server.run_until_ctrl_c().await?;
    Ok(())
}
