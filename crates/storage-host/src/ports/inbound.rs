//! Driving Ports (API - Inbound)

use async_trait::async_trait;
use shared_types::{BlockHeight, ChainUpdate, Currency, FileContractId, Hash, Transaction};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::HostSettings;
use crate::error::HostResult;

/// How a negotiation session ended, when it did not fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// File stored, contract submitted, first proof scheduled.
    Accepted { contract_id: FileContractId },
    /// Proposal refused; `reason` was sent to the renter.
    Rejected { reason: String },
}

/// Result of one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Proofs placed in the submitted transaction.
    pub proofs_built: usize,
    /// Proofs that could not be built.
    pub proofs_failed: usize,
    /// Id of the proof transaction, if one was accepted.
    pub submitted: Option<Hash>,
}

/// Result of one reclamation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub contracts_expired: usize,
    pub files_deleted: usize,
    pub space_returned: u64,
}

/// Primary storage host API
#[async_trait]
pub trait StorageHostApi: Send + Sync {
    /// Current settings snapshot.
    fn settings(&self) -> HostSettings;

    /// Replace settings; capacity moves by the change in total storage.
    fn set_settings(&self, settings: HostSettings);

    fn space_remaining(&self) -> i64;

    /// Publish the host's settings on chain, freezing `freeze_volume` coins
    /// until `freeze_unlock_height`.
    fn announce(
        &self,
        freeze_volume: Currency,
        freeze_unlock_height: BlockHeight,
        miner_fee: Currency,
    ) -> HostResult<Transaction>;

    /// Run one negotiation session for an already decoded `proposal`.
    async fn negotiate_contract<S>(
        &self,
        conn: &mut S,
        proposal: Transaction,
    ) -> HostResult<NegotiationOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send;

    /// Stream the file stored under `root`. Returns bytes sent.
    async fn retrieve_file<S>(&self, conn: &mut S, root: Hash) -> HostResult<u64>
    where
        S: AsyncWrite + Unpin + Send;

    /// Chain-update callback. Exactly once per transition, in order.
    fn process_chain_update(&self, update: &ChainUpdate) -> MaintenanceReport;

    /// Release contracts whose last proof is `reorg_depth` blocks deep at
    /// `height`.
    fn reclaim_expired(&self, height: BlockHeight) -> ReclaimReport;
}
