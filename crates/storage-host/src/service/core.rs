use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{BlockHeight, CoveredFields, Currency, Output, Transaction};
use tracing::{error, info};

use crate::domain::{HostAnnouncement, HostConfig, HostSettings, HostState, StorageLocation};
use crate::error::{HostError, HostResult};
use crate::ports::outbound::{ConsensusGateway, FileStore, Wallet};

/// The storage host.
///
/// Generic over its collaborators; all mutable data lives in one
/// `HostState` behind `state`.
pub struct StorageHost<W, C, S>
where
    W: Wallet,
    C: ConsensusGateway,
    S: FileStore,
{
    pub(super) config: HostConfig,
    pub(super) state: Arc<RwLock<HostState>>,
    pub(super) wallet: Arc<W>,
    pub(super) consensus: Arc<C>,
    pub(super) store: Arc<S>,
}

impl<W, C, S> StorageHost<W, C, S>
where
    W: Wallet,
    C: ConsensusGateway,
    S: FileStore,
{
    pub fn new(
        config: HostConfig,
        settings: HostSettings,
        wallet: Arc<W>,
        consensus: Arc<C>,
        store: Arc<S>,
    ) -> Self {
        info!(
            "[host] starting with {} bytes of storage at {}",
            settings.total_storage, settings.net_address
        );
        Self {
            config,
            state: Arc::new(RwLock::new(HostState::new(settings))),
            wallet,
            consensus,
            store,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Shared handle to the host state, for inspection.
    pub fn state(&self) -> Arc<RwLock<HostState>> {
        Arc::clone(&self.state)
    }

    pub(super) fn current_settings(&self) -> HostSettings {
        self.state.read().settings.clone()
    }

    pub(super) fn replace_settings(&self, settings: HostSettings) {
        let mut state = self.state.write();
        state.replace_settings(settings);
        info!(
            "[host] settings updated, {} bytes remaining",
            state.space_remaining
        );
    }

    pub(super) fn current_space_remaining(&self) -> i64 {
        self.state.read().space_remaining
    }

    /// Sign every input from `first_input` onwards over the whole
    /// transaction.
    pub(super) fn sign_inputs_from(
        &self,
        txn: &mut Transaction,
        first_input: usize,
    ) -> HostResult<()> {
        for index in first_input..txn.inputs.len() {
            self.wallet
                .sign_transaction(txn, CoveredFields::whole_transaction(), index)?;
        }
        Ok(())
    }

    /// Best-effort removal of a stored file.
    pub(super) fn discard(&self, location: &StorageLocation) {
        if let Err(e) = self.store.remove(location) {
            error!("[host] failed to remove stored file {}: {}", location, e);
        }
    }

    pub(super) fn build_announcement(
        &self,
        freeze_volume: Currency,
        freeze_unlock_height: BlockHeight,
        miner_fee: Currency,
    ) -> HostResult<Transaction> {
        let total = freeze_volume
            .checked_add(miner_fee)
            .ok_or_else(|| HostError::internal("announcement amount overflows"))?;

        let mut txn = Transaction::default();
        self.wallet.fund_transaction(total, &mut txn)?;
        txn.miner_fees.push(miner_fee);

        let mut spend_conditions = self.wallet.spend_conditions();
        spend_conditions.time_lock = freeze_unlock_height;
        txn.outputs.push(Output {
            value: freeze_volume,
            spend_hash: spend_conditions.coin_address()?,
        });

        let announcement = HostAnnouncement {
            settings: self.current_settings(),
            freeze_index: (txn.outputs.len() - 1) as u64,
            spend_conditions,
        };
        txn.arbitrary_data = announcement.encode()?;

        self.sign_inputs_from(&mut txn, 0)?;
        self.consensus.accept_transaction(txn.clone())?;
        info!(
            "[host] announced at {} with {} coins frozen until height {}",
            announcement.settings.net_address, freeze_volume, freeze_unlock_height
        );
        Ok(txn)
    }
}

/// Run file-store work on the blocking pool so a slow disk never stalls the
/// connection tasks.
pub(super) async fn blocking<T, F>(work: F) -> HostResult<T>
where
    F: FnOnce() -> HostResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| HostError::internal(format!("file store task failed: {}", e)))?
}

/// Parse a host announcement out of a transaction's arbitrary data.
pub fn decode_announcement(arbitrary_data: &[u8]) -> Option<HostAnnouncement> {
    HostAnnouncement::decode(arbitrary_data)
}
