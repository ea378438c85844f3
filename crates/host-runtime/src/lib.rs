//! # Host Runtime
//!
//! Wires a `StorageHost` to its collaborators and runs its two long-lived
//! tasks: the renter listener and the chain-update driver.
//!
//! ```text
//! renters ──TCP──► server::serve ──► StorageHost ◄── chain::run_dev_chain
//!                                        │
//!                     DiskFileStore ◄────┴────► InMemoryWallet / InMemoryConsensus
//! ```
//!
//! Both tasks watch a shared shutdown channel.

pub mod chain;
pub mod config;
pub mod server;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use storage_host::adapters::{
    dev_spend_conditions, DiskFileStore, InMemoryConsensus, InMemoryWallet,
};
use storage_host::{ConsensusGateway, StorageHost, StorageHostApi, Wallet};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use config::{ConfigError, RuntimeConfig};

/// Host backed by disk storage and the development chain.
pub type DevHost = StorageHost<InMemoryWallet, InMemoryConsensus, DiskFileStore>;

/// Running storage host.
pub struct HostRuntime {
    config: RuntimeConfig,
    host: Arc<DevHost>,
    consensus: Arc<InMemoryConsensus>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl HostRuntime {
    /// Build the host. Opens the file store and, when no coin address is
    /// configured, pays valid-proof outputs to the wallet's own address.
    pub fn new(mut config: RuntimeConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let store = DiskFileStore::open(config.storage.files_dir())
            .context("opening file store")?;
        let wallet = InMemoryWallet::new(
            dev_spend_conditions(b"storage-host"),
            &[config.dev_chain.wallet_balance],
        );
        if config.settings.coin_address == shared_types::CoinAddress::default() {
            config.settings.coin_address = wallet
                .spend_conditions()
                .coin_address()
                .context("deriving coin address")?;
        }
        let consensus = Arc::new(InMemoryConsensus::at_height(
            config.dev_chain.start_height,
        ));
        let host = Arc::new(StorageHost::new(
            config.host.clone(),
            config.settings.clone(),
            Arc::new(wallet),
            Arc::clone(&consensus),
            Arc::new(store),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            host,
            consensus,
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        })
    }

    pub fn host(&self) -> Arc<DevHost> {
        Arc::clone(&self.host)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Announce, bind the listener and spawn the long-lived tasks. Returns
    /// the bound address.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        if self.config.announce.enabled {
            self.announce();
        }

        let listener = TcpListener::bind(self.config.network.listen_addr)
            .await
            .with_context(|| format!("binding {}", self.config.network.listen_addr))?;
        let addr = listener.local_addr()?;
        info!("[host] listening for renters on {}", addr);

        self.tasks.push(tokio::spawn(server::serve(
            listener,
            Arc::clone(&self.host),
            self.config.host.max_message_size,
            self.shutdown_rx.clone(),
        )));
        self.tasks.push(tokio::spawn(chain::run_dev_chain(
            Arc::clone(&self.host),
            Arc::clone(&self.consensus),
            Duration::from_secs(self.config.dev_chain.block_interval_secs),
            self.config.host.reclaim_expired,
            self.shutdown_rx.clone(),
        )));
        Ok(addr)
    }

    fn announce(&self) {
        let a = &self.config.announce;
        let unlock = self.consensus.height().saturating_add(a.freeze_blocks);
        match self.host.announce(a.freeze_volume, unlock, a.miner_fee) {
            Ok(txn) => info!(
                "[host] announced with {} frozen until height {} ({} bytes of data)",
                a.freeze_volume,
                unlock,
                txn.arbitrary_data.len()
            ),
            // renters can still reach a host that knows its address out of band
            Err(e) => warn!("[host] announcement failed: {}", e),
        }
    }

    /// Signal every task and wait for them to finish.
    pub async fn shutdown(&mut self) {
        info!("[host] shutting down");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("[host] task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.network.listen_addr = SocketAddr::from(([127, 0, 0, 1], 0));
        config.storage.data_dir = dir.to_path_buf();
        config.dev_chain.block_interval_secs = 3600;
        config
    }

    #[tokio::test]
    async fn test_runtime_starts_announces_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = HostRuntime::new(test_config(dir.path())).unwrap();
        assert_ne!(
            runtime.config().settings.coin_address,
            shared_types::CoinAddress::default()
        );

        let addr = runtime.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(dir.path().join("files").is_dir());
        assert_eq!(runtime.consensus.accepted().len(), 1);

        runtime.shutdown().await;
        assert!(runtime.tasks.is_empty());
    }

    #[test]
    fn test_runtime_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.settings.total_storage = -5;
        assert!(HostRuntime::new(config).is_err());
    }
}
