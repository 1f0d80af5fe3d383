//! palaverd - the multi-transport gateway daemon
//!
//! Loads configuration, wires the demo speech backend into a gateway
//! context, and runs the configured transports until interrupted.

mod config;
mod speech;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use palaver::negotiate::VersionNegotiator;
use palaver::server::GatewayServer;
use palaver::transport::http::HttpTransport;
use palaver::transport::stdio::StdioTransport;
use palaver::transport::{GatewayContext, Transport};

use config::PalaverConfig;

/// The Palaver gateway server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a config file (default: ./palaver.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP bind address
    #[arg(long)]
    http_addr: Option<std::net::SocketAddr>,

    /// Also serve the line-oriented protocol on stdin/stdout
    #[arg(long)]
    stdio: bool,

    /// Override the RPC bind address
    #[cfg(feature = "rpc")]
    #[arg(long)]
    rpc_addr: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config =
        PalaverConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(addr) = cli.http_addr {
        config.bind.http_addr = addr;
    }
    if cli.stdio {
        config.transports.stdio = true;
    }
    #[cfg(feature = "rpc")]
    if let Some(addr) = cli.rpc_addr {
        config.bind.rpc_addr = Some(addr);
        config.transports.rpc = true;
    }

    let negotiator = VersionNegotiator::new(
        config.protocol.supported_versions.clone(),
        config.protocol.default_version.clone(),
    )
    .context("Invalid protocol version configuration")?;
    tracing::info!(
        versions = %negotiator.advertisement(),
        default = %negotiator.default_version(),
        "Protocol versions configured"
    );

    let ctx = GatewayContext::new(negotiator);
    for (name, profile) in &config.sampling {
        ctx.sampling.register_profile(
            name.clone(),
            profile.temperature,
            profile.top_p,
            palaver::sampling::ProfileBounds::default(),
        );
        tracing::info!(profile = %name, "Registered sampling profile from config");
    }
    speech::install(&ctx).context("Failed to install speech backend")?;

    let mut transports: Vec<Box<dyn Transport>> = Vec::new();
    if config.transports.http {
        transports.push(Box::new(HttpTransport::new(config.bind.http_addr)));
    }
    if config.transports.stdio {
        transports.push(Box::new(StdioTransport::new()));
    }
    #[cfg(feature = "rpc")]
    if config.transports.rpc {
        let addr = config.bind.rpc_addr.context("rpc enabled without bind.rpc_addr")?;
        transports.push(Box::new(palaver::transport::rpc::RpcTransport::new(addr)));
    }
    #[cfg(not(feature = "rpc"))]
    if config.transports.rpc {
        tracing::warn!("rpc transport requested but this build does not include it");
    }

    let mut server =
        GatewayServer::new(ctx, transports).context("Failed to construct gateway server")?;

    let started = server.start().await;
    for (name, error) in &started.failed {
        tracing::error!(transport = name, error = %error, "Transport failed to start");
    }
    if started.succeeded.is_empty() {
        anyhow::bail!("no transport started successfully");
    }
    tracing::info!(transports = ?started.succeeded, "Gateway running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    let stopped = server.stop().await;
    for (name, error) in &stopped.failed {
        tracing::error!(transport = name, error = %error, "Transport shutdown failed");
    }
    tracing::info!(transports = ?stopped.succeeded, "Gateway stopped");
    Ok(())
}
