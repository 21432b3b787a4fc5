//! HTTP server command.

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::http::StagesHttpServer;
use crate::cli::context::{wait_for_delivery, AppContext};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,
    /// Port to bind (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn execute(args: ServeArgs, config: &Config, _json_mode: bool) -> Result<()> {
    let mut server_config = config.server.clone();
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let (service, personas, dispatcher) = AppContext::build(config).await?.into_parts();

    let mut server = StagesHttpServer::new(service, server_config);
    match personas {
        Some(personas) => server = server.with_personas(personas),
        None => tracing::info!("persona discovery disabled, forge.base_url is not set"),
    }

    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("HTTP server failed")?;

    wait_for_delivery(dispatcher).await;
    Ok(())
}
