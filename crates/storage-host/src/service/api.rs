use async_trait::async_trait;
use shared_types::{BlockHeight, ChainUpdate, Currency, Hash, Transaction};
use tokio::io::{AsyncRead, AsyncWrite};

use super::core::StorageHost;
use crate::domain::HostSettings;
use crate::error::HostResult;
use crate::ports::inbound::{MaintenanceReport, NegotiationOutcome, ReclaimReport, StorageHostApi};
use crate::ports::outbound::{ConsensusGateway, FileStore, Wallet};

#[async_trait]
impl<W, C, S> StorageHostApi for StorageHost<W, C, S>
where
    W: Wallet + 'static,
    C: ConsensusGateway + 'static,
    S: FileStore + 'static,
{
    fn settings(&self) -> HostSettings {
        self.current_settings()
    }

    fn set_settings(&self, settings: HostSettings) {
        self.replace_settings(settings);
    }

    fn space_remaining(&self) -> i64 {
        self.current_space_remaining()
    }

    fn announce(
        &self,
        freeze_volume: Currency,
        freeze_unlock_height: BlockHeight,
        miner_fee: Currency,
    ) -> HostResult<Transaction> {
        self.build_announcement(freeze_volume, freeze_unlock_height, miner_fee)
    }

    async fn negotiate_contract<T>(
        &self,
        conn: &mut T,
        proposal: Transaction,
    ) -> HostResult<NegotiationOutcome>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.run_negotiation(conn, proposal).await
    }

    async fn retrieve_file<T>(&self, conn: &mut T, root: Hash) -> HostResult<u64>
    where
        T: AsyncWrite + Unpin + Send,
    {
        self.run_retrieval(conn, root).await
    }

    fn process_chain_update(&self, update: &ChainUpdate) -> MaintenanceReport {
        self.storage_proof_maintenance(update)
    }

    fn reclaim_expired(&self, height: BlockHeight) -> ReclaimReport {
        self.reclaim_expired_contracts(height)
    }
}
