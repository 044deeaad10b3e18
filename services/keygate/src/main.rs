//! keygate - Main Entry Point

use anyhow::Context;
use keygate::{Config, bootstrap};
use rust_common::init_tracing;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&config.tracing_config()).context("Failed to initialise tracing")?;

    info!(
        listen = %config.listen_addr,
        vault = %config.vault_addr,
        chef = %config.chef_server,
        "Starting keygate"
    );

    let gateway = match bootstrap(&config).await {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(code = e.code().as_str(), error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    gateway
        .serve(
            config.listen_addr,
            config.request_timeout(),
            config.shutdown_timeout(),
        )
        .await
        .context("Server failed")?;

    info!("keygate stopped");
    Ok(())
}
