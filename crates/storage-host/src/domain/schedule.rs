//! Proof Schedule
//!
//! Height-indexed buckets of contract entries:
//! - **forward**: proofs due at a future height. Every active contract sits
//!   in exactly one forward bucket, tracked by `forward_index`.
//! - **backward**: proofs recently submitted, kept so a reorg can rebuild
//!   them. Pruned once they are `reorg_depth` blocks deep.
//! - **expiring**: contracts with no further window, waiting for
//!   reclamation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use shared_types::{BlockHeight, FileContract, FileContractId};
use thiserror::Error;

/// A contract tracked by the schedule. The id cannot be derived from the
/// terms, so both are kept together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEntry {
    pub id: FileContractId,
    pub contract: Arc<FileContract>,
}

impl ContractEntry {
    pub fn new(id: FileContractId, contract: FileContract) -> Self {
        Self {
            id,
            contract: Arc::new(contract),
        }
    }
}

/// Schedule bookkeeping errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("contract {id} already scheduled at height {height}")]
    AlreadyScheduled {
        id: FileContractId,
        height: BlockHeight,
    },

    #[error("forward index out of sync for contract {id}")]
    IndexMismatch { id: FileContractId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofSchedule {
    forward: BTreeMap<BlockHeight, Vec<ContractEntry>>,
    forward_index: HashMap<FileContractId, BlockHeight>,
    backward: BTreeMap<BlockHeight, Vec<ContractEntry>>,
    expiring: BTreeMap<BlockHeight, Vec<ContractEntry>>,
}

impl ProofSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `entry` in the forward bucket at `height`.
    pub fn schedule_forward(
        &mut self,
        height: BlockHeight,
        entry: ContractEntry,
    ) -> Result<(), ScheduleError> {
        if let Some(existing) = self.forward_index.get(&entry.id) {
            return Err(ScheduleError::AlreadyScheduled {
                id: entry.id,
                height: *existing,
            });
        }
        self.forward_index.insert(entry.id, height);
        self.forward.entry(height).or_default().push(entry);
        Ok(())
    }

    /// Remove and return the whole forward bucket at `height`.
    pub fn take_forward(&mut self, height: BlockHeight) -> Vec<ContractEntry> {
        let entries = self.forward.remove(&height).unwrap_or_default();
        for entry in &entries {
            self.forward_index.remove(&entry.id);
        }
        entries
    }

    pub fn forward_at(&self, height: BlockHeight) -> &[ContractEntry] {
        self.forward.get(&height).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Height of the next proof due for `id`, if it is still active.
    pub fn next_proof_height(&self, id: &FileContractId) -> Option<BlockHeight> {
        self.forward_index.get(id).copied()
    }

    pub fn record_backward(&mut self, height: BlockHeight, entry: ContractEntry) {
        self.backward.entry(height).or_default().push(entry);
    }

    pub fn backward_at(&self, height: BlockHeight) -> &[ContractEntry] {
        self.backward.get(&height).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop backward buckets below `keep_from`. Returns how many entries went.
    pub fn prune_backward(&mut self, keep_from: BlockHeight) -> usize {
        let kept = self.backward.split_off(&keep_from);
        let pruned = std::mem::replace(&mut self.backward, kept);
        pruned.values().map(Vec::len).sum()
    }

    /// Queue a finished contract for reclamation at `height`.
    pub fn queue_expiry(&mut self, height: BlockHeight, entry: ContractEntry) {
        self.expiring.entry(height).or_default().push(entry);
    }

    /// Remove and return every expiring entry due at or before `height`.
    pub fn take_expired(&mut self, height: BlockHeight) -> Vec<ContractEntry> {
        let later = match height.checked_add(1) {
            Some(next) => self.expiring.split_off(&next),
            None => BTreeMap::new(),
        };
        std::mem::replace(&mut self.expiring, later)
            .into_values()
            .flatten()
            .collect()
    }

    /// Number of contracts with a proof still due.
    pub fn active_contracts(&self) -> usize {
        self.forward_index.len()
    }

    pub fn is_tracked(&self, id: &FileContractId) -> bool {
        self.forward_index.contains_key(id)
            || self.backward.values().flatten().any(|e| e.id == *id)
            || self.expiring.values().flatten().any(|e| e.id == *id)
    }

    /// Verify that every active contract sits in exactly one forward bucket.
    pub fn check_invariants(&self) -> Result<(), ScheduleError> {
        let mut seen = 0usize;
        for (height, entries) in &self.forward {
            for entry in entries {
                if self.forward_index.get(&entry.id) != Some(height) {
                    return Err(ScheduleError::IndexMismatch { id: entry.id });
                }
                seen += 1;
            }
        }
        if seen != self.forward_index.len() {
            let missing = self
                .forward_index
                .keys()
                .find(|id| {
                    !self
                        .forward
                        .values()
                        .flatten()
                        .any(|entry| entry.id == **id)
                })
                .copied()
                .unwrap_or_default();
            return Err(ScheduleError::IndexMismatch { id: missing });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: u8) -> ContractEntry {
        ContractEntry::new(
            FileContractId([tag; 32]),
            FileContract {
                start: 10,
                end: 100,
                challenge_window: 10,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_forward_bucket_is_unique_per_contract() {
        let mut schedule = ProofSchedule::new();
        schedule.schedule_forward(16, entry(1)).unwrap();
        assert_eq!(
            schedule.schedule_forward(26, entry(1)),
            Err(ScheduleError::AlreadyScheduled {
                id: FileContractId([1; 32]),
                height: 16
            })
        );
        assert_eq!(schedule.next_proof_height(&FileContractId([1; 32])), Some(16));
        schedule.check_invariants().unwrap();
    }

    #[test]
    fn test_take_forward_clears_bucket_and_index() {
        let mut schedule = ProofSchedule::new();
        schedule.schedule_forward(16, entry(1)).unwrap();
        schedule.schedule_forward(16, entry(2)).unwrap();

        let due = schedule.take_forward(16);
        assert_eq!(due.len(), 2);
        assert!(schedule.forward_at(16).is_empty());
        assert_eq!(schedule.active_contracts(), 0);
        assert!(schedule.take_forward(16).is_empty());

        schedule.schedule_forward(26, entry(1)).unwrap();
        schedule.check_invariants().unwrap();
    }

    #[test]
    fn test_prune_backward() {
        let mut schedule = ProofSchedule::new();
        schedule.record_backward(5, entry(1));
        schedule.record_backward(6, entry(2));
        schedule.record_backward(9, entry(3));

        assert_eq!(schedule.prune_backward(6), 1);
        assert!(schedule.backward_at(5).is_empty());
        assert_eq!(schedule.backward_at(6).len(), 1);
        assert_eq!(schedule.backward_at(9).len(), 1);
    }

    #[test]
    fn test_take_expired_is_inclusive() {
        let mut schedule = ProofSchedule::new();
        schedule.queue_expiry(20, entry(1));
        schedule.queue_expiry(21, entry(2));
        schedule.queue_expiry(30, entry(3));

        let expired = schedule.take_expired(21);
        assert_eq!(expired.len(), 2);
        assert!(!schedule.is_tracked(&FileContractId([1; 32])));
        assert!(schedule.is_tracked(&FileContractId([3; 32])));
        assert_eq!(schedule.take_expired(BlockHeight::MAX).len(), 1);
    }
}
