//! Proof Maintenance Driver
//!
//! Runs once per chain update with the state write lock held for the whole
//! height walk:
//! 1. **Rewind**: for each rewound block, walking down from the initial
//!    height, rebuild every proof recorded in the backward bucket at that
//!    height. The challenge seed comes from the current tip.
//! 2. **Apply**: for each applied block, walking up, drain the forward bucket
//!    at that height, build its proofs, record them in backward at
//!    `height - reorg_depth + 1`, and reschedule at `height + window` while
//!    that is before the contract end. Finished contracts are queued for
//!    reclamation `reorg_depth` blocks later.
//! 3. Prune backward buckets that are `reorg_depth` blocks deep.
//!
//! The lock is then released and all proofs go out in one transaction.
//! Failures are logged and never retried here.

use shared_types::{BlockHeight, ChainUpdate, Hash, StorageProof, Transaction};
use tracing::{debug, error, info, warn};

use super::core::StorageHost;
use crate::domain::{build_reader_proof, calculate_segments, ContractEntry, HostState};
use crate::error::{HostError, HostResult};
use crate::ports::inbound::{MaintenanceReport, ReclaimReport};
use crate::ports::outbound::{ConsensusGateway, FileStore, Wallet};

impl<W, C, S> StorageHost<W, C, S>
where
    W: Wallet,
    C: ConsensusGateway,
    S: FileStore,
{
    pub fn storage_proof_maintenance(&self, update: &ChainUpdate) -> MaintenanceReport {
        let depth = self.config.reorg_depth;
        let mut report = MaintenanceReport::default();
        let mut proofs = Vec::new();

        {
            let mut state = self.state.write();
            let mut height = update.initial_height;

            for _ in &update.rewound_blocks {
                let entries = state.schedule.backward_at(height).to_vec();
                for entry in &entries {
                    match self.create_storage_proof(&state, entry, height) {
                        Ok(proof) => proofs.push(proof),
                        Err(e) => {
                            error!(
                                "[host] High priority: failed to rebuild storage proof for contract {} at height {}: {}",
                                entry.id, height, e
                            );
                            report.proofs_failed += 1;
                        }
                    }
                }
                height = height.saturating_sub(1);
            }

            for _ in &update.applied_blocks {
                for entry in state.schedule.take_forward(height) {
                    match self.create_storage_proof(&state, &entry, height) {
                        Ok(proof) => {
                            proofs.push(proof);
                            let proven_at = (height + 1).saturating_sub(depth);
                            state.schedule.record_backward(proven_at, entry.clone());
                        }
                        Err(e) => {
                            error!(
                                "[host] High priority: failed to build storage proof for contract {} at height {}: {}",
                                entry.id, height, e
                            );
                            report.proofs_failed += 1;
                        }
                    }
                    reschedule(&mut state, entry, height, depth);
                }
                height += 1;
            }

            let keep_from = (update.final_height() + 1).saturating_sub(2 * depth);
            let pruned = state.schedule.prune_backward(keep_from);
            if pruned > 0 {
                debug!("[host] pruned {} settled proofs", pruned);
            }
        }

        report.proofs_built = proofs.len();
        if !proofs.is_empty() {
            report.submitted = self.submit_storage_proofs(proofs);
        }
        report
    }

    /// Build the proof `entry` owes at `height`.
    pub fn create_storage_proof(
        &self,
        state: &HostState,
        entry: &ContractEntry,
        height: BlockHeight,
    ) -> HostResult<StorageProof> {
        let contract = &entry.contract;
        let location = state
            .file_location(&contract.file_merkle_root)
            .ok_or(HostError::UnknownFile {
                root: contract.file_merkle_root,
            })?;
        let window_index = contract.window_index(height)?;
        let segment_index = self
            .consensus
            .storage_proof_segment_index(entry.id, window_index)?;

        let mut reader = self.store.open(location)?;
        let proof = build_reader_proof(
            &mut reader,
            calculate_segments(contract.file_size),
            segment_index,
        )?;
        Ok(StorageProof {
            contract_id: entry.id,
            window_index,
            segment: proof.segment,
            hash_set: proof.hash_set,
        })
    }

    /// Fund, sign and submit one transaction carrying `proofs`.
    fn submit_storage_proofs(&self, proofs: Vec<StorageProof>) -> Option<Hash> {
        let fee = self.config.proof_miner_fee;
        let count = proofs.len();
        let mut txn = Transaction {
            miner_fees: vec![fee],
            storage_proofs: proofs,
            ..Default::default()
        };

        if let Err(e) = self.wallet.fund_transaction(fee, &mut txn) {
            error!(
                "[host] High priority: failed to fund storage proof transaction: {}",
                e
            );
            return None;
        }
        if let Err(e) = self.sign_inputs_from(&mut txn, 0) {
            error!(
                "[host] High priority: failed to sign storage proof transaction: {}",
                e
            );
            return None;
        }
        let id = match txn.id() {
            Ok(id) => id,
            Err(e) => {
                error!(
                    "[host] High priority: failed to encode storage proof transaction: {}",
                    e
                );
                return None;
            }
        };
        if let Err(e) = self.consensus.accept_transaction(txn) {
            error!(
                "[host] High priority: storage proof transaction rejected: {}",
                e
            );
            return None;
        }
        info!("[host] submitted {} storage proofs", count);
        Some(id)
    }

    /// Release every contract whose reclamation height is at or below
    /// `height`, deleting files no contract references any more.
    pub fn reclaim_expired_contracts(&self, height: BlockHeight) -> ReclaimReport {
        let mut report = ReclaimReport::default();
        let released = {
            let mut state = self.state.write();
            let expired = state.schedule.take_expired(height);
            report.contracts_expired = expired.len();
            expired
                .iter()
                .filter_map(|entry| state.release_file(&entry.contract.file_merkle_root))
                .collect::<Vec<_>>()
        };

        for file in released {
            match self.store.remove(&file.location) {
                Ok(()) => report.files_deleted += 1,
                Err(e) => warn!(
                    "[host] failed to delete expired file {}: {}",
                    file.location, e
                ),
            }
            report.space_returned += file.size;
        }
        if report.contracts_expired > 0 {
            info!(
                "[host] {} contracts expired, {} bytes returned",
                report.contracts_expired, report.space_returned
            );
        }
        report
    }
}

/// Move `entry` to its next forward bucket, or queue it for reclamation if
/// no window remains.
fn reschedule(state: &mut HostState, entry: ContractEntry, height: BlockHeight, depth: BlockHeight) {
    let next = height.saturating_add(entry.contract.challenge_window);
    if next < entry.contract.end {
        let id = entry.id;
        if let Err(e) = state.schedule.schedule_forward(next, entry) {
            error!("[host] failed to reschedule contract {}: {}", id, e);
        }
    } else {
        debug!("[host] contract {} has no windows left", entry.id);
        state.schedule.queue_expiry(height.saturating_add(depth), entry);
    }
}
