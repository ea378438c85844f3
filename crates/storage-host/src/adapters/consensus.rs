//! In-memory consensus for testing and development.
//!
//! Keeps a list of block ids (index = height), a pool of accepted
//! transactions, and the file contracts they created. Chain movement is
//! driven explicitly and reported as `ChainUpdate`s.

use std::collections::HashMap;

use parking_lot::Mutex;
use shared_types::{
    hash_bytes, hash_object, BlockHeight, BlockId, ChainUpdate, FileContract, FileContractId,
    Transaction,
};
use tracing::debug;

use super::wallet::InMemoryWallet;
use crate::domain::{calculate_segments, verify_segment_proof, SegmentProof};
use crate::ports::outbound::{ConsensusError, ConsensusGateway};

struct ChainState {
    blocks: Vec<BlockId>,
    minted: u64,
    pool: Vec<Transaction>,
    contracts: HashMap<FileContractId, FileContract>,
}

impl ChainState {
    fn height(&self) -> BlockHeight {
        self.blocks.len().saturating_sub(1) as BlockHeight
    }

    fn tip(&self) -> BlockId {
        self.blocks.last().copied().unwrap_or_default()
    }

    fn mint(&mut self) -> BlockId {
        let id = hash_bytes(&self.minted.to_le_bytes());
        self.minted += 1;
        id
    }

    fn segment_index(
        &self,
        contract_id: FileContractId,
        window_index: BlockHeight,
    ) -> Result<u64, ConsensusError> {
        let contract = self
            .contracts
            .get(&contract_id)
            .ok_or(ConsensusError::UnknownContract { id: contract_id })?;
        let windows = contract
            .duration()
            .unwrap_or(0)
            .div_ceil(contract.challenge_window.max(1));
        if window_index >= windows {
            return Err(ConsensusError::WindowOutOfRange {
                id: contract_id,
                window_index,
            });
        }
        let seed = hash_object(&(self.tip(), contract_id, window_index)).map_err(|e| {
            ConsensusError::InvalidTransaction {
                reason: e.to_string(),
            }
        })?;
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&seed[..8]);
        Ok(u64::from_le_bytes(prefix) % calculate_segments(contract.file_size))
    }

    fn check(&self, txn: &Transaction) -> Result<(), ConsensusError> {
        let invalid = |reason: String| ConsensusError::InvalidTransaction { reason };
        let id = txn.id().map_err(|e| invalid(e.to_string()))?;

        for index in 0..txn.inputs.len() as u64 {
            let signed = txn.signatures.iter().any(|sig| {
                sig.input_index == index
                    && sig.signature == InMemoryWallet::expected_signature(&id, index)
            });
            if !signed {
                return Err(invalid(format!("input {} is not signed", index)));
            }
        }

        let height = self.height();
        for contract in &txn.file_contracts {
            if contract.start <= height {
                return Err(invalid(format!(
                    "contract starts at {} but chain is at {}",
                    contract.start, height
                )));
            }
        }

        for proof in &txn.storage_proofs {
            let contract = self
                .contracts
                .get(&proof.contract_id)
                .ok_or(ConsensusError::UnknownContract {
                    id: proof.contract_id,
                })?;
            let index = self.segment_index(proof.contract_id, proof.window_index)?;
            let segment_proof = SegmentProof {
                segment: proof.segment,
                hash_set: proof.hash_set.clone(),
            };
            let segments = calculate_segments(contract.file_size);
            if !verify_segment_proof(&segment_proof, segments, index, &contract.file_merkle_root) {
                return Err(invalid(format!(
                    "storage proof for contract {} does not verify",
                    proof.contract_id
                )));
            }
        }
        Ok(())
    }
}

pub struct InMemoryConsensus {
    state: Mutex<ChainState>,
}

impl Default for InMemoryConsensus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConsensus {
    /// Chain holding only the genesis block.
    pub fn new() -> Self {
        Self::at_height(0)
    }

    /// Chain already `height` blocks past genesis.
    pub fn at_height(height: BlockHeight) -> Self {
        let mut state = ChainState {
            blocks: Vec::new(),
            minted: 0,
            pool: Vec::new(),
            contracts: HashMap::new(),
        };
        for _ in 0..=height {
            let id = state.mint();
            state.blocks.push(id);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Append `count` blocks.
    pub fn advance(&self, count: usize) -> ChainUpdate {
        self.reorg(0, count)
    }

    /// Remove `rewind` blocks from the tip, then append `apply` fresh ones.
    pub fn reorg(&self, rewind: usize, apply: usize) -> ChainUpdate {
        let mut state = self.state.lock();
        let initial_height = state.height();

        let keep = state.blocks.len().saturating_sub(rewind).max(1);
        let mut rewound_blocks = state.blocks.split_off(keep);
        rewound_blocks.reverse();

        let mut applied_blocks = Vec::with_capacity(apply);
        for _ in 0..apply {
            let id = state.mint();
            state.blocks.push(id);
            applied_blocks.push(id);
        }
        debug!(
            "[host] chain moved from {} to {} (-{} +{})",
            initial_height,
            state.height(),
            rewound_blocks.len(),
            applied_blocks.len()
        );

        ChainUpdate {
            initial_height,
            rewound_blocks,
            applied_blocks,
        }
    }

    pub fn tip(&self) -> BlockId {
        self.state.lock().tip()
    }

    /// Transactions accepted so far, oldest first.
    pub fn accepted(&self) -> Vec<Transaction> {
        self.state.lock().pool.clone()
    }

    pub fn contract(&self, id: &FileContractId) -> Option<FileContract> {
        self.state.lock().contracts.get(id).cloned()
    }
}

impl ConsensusGateway for InMemoryConsensus {
    fn height(&self) -> BlockHeight {
        self.state.lock().height()
    }

    fn valid_transaction(&self, txn: &Transaction) -> Result<(), ConsensusError> {
        self.state.lock().check(txn)
    }

    fn accept_transaction(&self, txn: Transaction) -> Result<(), ConsensusError> {
        let mut state = self.state.lock();
        state.check(&txn)?;
        for index in 0..txn.file_contracts.len() {
            let id = txn
                .file_contract_id(index)
                .map_err(|e| ConsensusError::InvalidTransaction {
                    reason: e.to_string(),
                })?;
            state.contracts.insert(id, txn.file_contracts[index].clone());
        }
        state.pool.push(txn);
        Ok(())
    }

    fn storage_proof_segment_index(
        &self,
        contract_id: FileContractId,
        window_index: BlockHeight,
    ) -> Result<u64, ConsensusError> {
        self.state.lock().segment_index(contract_id, window_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorg_reports_counts_and_heights() {
        let consensus = InMemoryConsensus::at_height(10);
        assert_eq!(consensus.height(), 10);

        let update = consensus.reorg(3, 5);
        assert_eq!(update.initial_height, 10);
        assert_eq!(update.rewound_blocks.len(), 3);
        assert_eq!(update.applied_blocks.len(), 5);
        assert_eq!(update.final_height(), 12);
        assert_eq!(consensus.height(), 12);
    }

    #[test]
    fn test_genesis_is_never_rewound() {
        let consensus = InMemoryConsensus::at_height(2);
        let update = consensus.reorg(10, 0);
        assert_eq!(update.rewound_blocks.len(), 2);
        assert_eq!(consensus.height(), 0);
    }

    #[test]
    fn test_segment_index_follows_tip() {
        let consensus = InMemoryConsensus::at_height(5);
        let txn = Transaction {
            file_contracts: vec![FileContract {
                file_size: 64 * 1000,
                start: 10,
                end: 110,
                challenge_window: 10,
                ..Default::default()
            }],
            ..Default::default()
        };
        consensus.accept_transaction(txn.clone()).unwrap();
        let id = txn.file_contract_id(0).unwrap();

        let first = consensus.storage_proof_segment_index(id, 0).unwrap();
        assert!(first < 1000);
        assert_eq!(consensus.storage_proof_segment_index(id, 0).unwrap(), first);
        assert!(matches!(
            consensus.storage_proof_segment_index(id, 10),
            Err(ConsensusError::WindowOutOfRange { .. })
        ));
        assert!(matches!(
            consensus.storage_proof_segment_index(FileContractId([9; 32]), 0),
            Err(ConsensusError::UnknownContract { .. })
        ));
    }

    #[test]
    fn test_unsigned_input_is_invalid() {
        let consensus = InMemoryConsensus::new();
        let txn = Transaction {
            inputs: vec![shared_types::Input {
                output_id: [1; 32],
                spend_conditions: Default::default(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            consensus.valid_transaction(&txn),
            Err(ConsensusError::InvalidTransaction { .. })
        ));
    }
}
