//! Bitcoin mining pool server: `getwork` protocol with HTTP long-polling.
mod config;
mod orchestrator;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info};

use config::PoolDanceConfig;
use orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "pool-dance", version, about = "Lightweight Bitcoin mining pool server")]
struct Args {
    /// Absolute path for the configuration file.
    #[arg(short = 'c', long = "conf", default_value = pd_core::constants::DEFAULT_CONFIG_FILE)]
    conf: PathBuf,

    /// Run the service in the background.
    ///
    /// Daemonization is out of scope for this build (see Non-goals); this
    /// flag is accepted for command-line compatibility and logged as a
    /// no-op rather than silently ignored.
    #[arg(short = 'D', long = "daemonize")]
    daemonize: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    if args.daemonize {
        info!("--daemonize requested but this build does not fork/detach; continuing in the foreground");
    }

    let config = PoolDanceConfig::load(&args.conf)?;

    if config.pool.user.is_some() || config.pool.group.is_some() {
        bail!(
            "privilege drop requested (user={:?}, group={:?}) but this build cannot drop privileges",
            config.pool.user,
            config.pool.group
        );
    }

    info!(conf = %args.conf.display(), "starting pool-dance");

    let orchestrator = Orchestrator::build(&config).await?;
    orchestrator.start();

    let bind_addr: SocketAddr = config
        .server
        .bind_addr()
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8335)));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "pool server listening");

    let app = orchestrator
        .server
        .router()
        .into_make_service_with_connect_info::<SocketAddr>();

    let shutdown = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down");
    };

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        error!(error = %e, "pool server exited with error");
    }

    orchestrator.monitor.stop();
    info!("pool-dance shutdown complete");
    Ok(())
}
