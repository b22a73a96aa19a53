//! # container_worker
//!
//! A worker process hosting components. Each component is attached to an
//! application router over WebSocket or RawSocket and kept connected by a
//! supervisor that retries failed attempts.
//!
//! ## Startup Sequence
//!
//! 1. Load the JSON configuration named by `--config`.
//! 2. Register the built-in sessions.
//! 3. Start every configured component. Failures are logged and skipped.
//! 4. Run until Ctrl-C, then stop all components.

mod config;
mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use container_component::ComponentRegistry;
use container_net::NetworkConnectorFactory;
use container_runtime::{ComponentActivationService, ContainerWorker};

use config::WorkerConfig;

/// Crates whose logs are shown by default.
const CRATES: [&str; 4] = [
    "container_worker",
    "container_runtime",
    "container_net",
    "container_component",
];

#[derive(Parser, Debug)]
#[command(name = "container_worker")]
#[command(about = "Host components attached to application routers")]
#[command(version)]
struct Args {
    /// Path to the worker configuration file
    #[arg(long)]
    config: PathBuf,

    /// Base directory for relative Unix socket paths
    #[arg(long, default_value = ".")]
    cbdir: PathBuf,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in CRATES {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = WorkerConfig::load(&args.config)?;
    info!(
        config = %args.config.display(),
        components = config.components.len(),
        "container worker starting"
    );

    let mut registry = ComponentRegistry::new().with_debug(args.debug);
    sessions::register_builtin(&mut registry);

    let service = ComponentActivationService::new(
        Arc::new(registry),
        Arc::new(NetworkConnectorFactory::new(args.cbdir)),
    )
    .with_retry_policy(config.retry);
    let container = ContainerWorker::new(service);

    for (index, entry) in config.components.iter().enumerate() {
        match container.start_component(&entry.component, &entry.router) {
            Ok(id) => info!(index, id, "component activated"),
            Err(e) => error!(index, reason = e.reason(), error = %e, "could not start component"),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!(running = container.len(), "shutting down");
    container.stop_all().await;

    info!("container worker shut down");
    Ok(())
}
