//! Storage host entry point.
//!
//! Configuration comes from the environment (see `config`); log verbosity
//! from `RUST_LOG`, defaulting to `info`.

use host_runtime::{HostRuntime, RuntimeConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Storage host v{}", env!("CARGO_PKG_VERSION"));

    let config = RuntimeConfig::from_env();
    info!(
        "[host] data dir {}, {} bytes offered at price {}",
        config.storage.data_dir.display(),
        config.settings.total_storage,
        config.settings.price
    );

    let mut runtime = HostRuntime::new(config)?;
    runtime.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    runtime.shutdown().await;

    Ok(())
}
