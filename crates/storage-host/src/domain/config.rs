//! Host tuning knobs.

use shared_types::{BlockHeight, Currency};

use super::settings::STORAGE_PROOF_REORG_DEPTH;

/// Storage host configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    /// Depth a proof must reach before it is safe from reorgs.
    pub reorg_depth: BlockHeight,
    /// Miner fee paid by each storage-proof transaction.
    pub proof_miner_fee: Currency,
    /// An upload must finish at least this many blocks before contract start.
    pub upload_deadline_blocks: BlockHeight,
    /// Largest framed message accepted from a renter.
    pub max_message_size: u64,
    /// Delete files whose every contract has run out.
    pub reclaim_expired: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            reorg_depth: STORAGE_PROOF_REORG_DEPTH,
            proof_miner_fee: 10,
            upload_deadline_blocks: 2,
            max_message_size: 16 * 1024 * 1024,
            reclaim_expired: true,
        }
    }
}
