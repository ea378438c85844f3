//! # Core Chain Entities
//!
//! The slice of the chain's data model the storage host reads and writes.
//!
//! ## Clusters
//!
//! - **Primitives**: `Hash`, `BlockHeight`, `Currency`, `CoinAddress`
//! - **Transactions**: `Input`, `Output`, `Transaction`, `TransactionSignature`
//! - **Storage**: `FileContract`, `FileContractId`, `StorageProof`

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::errors::{ContractWindowError, EncodingError};
use crate::hashing::hash_object;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// Height of a block in the chain.
pub type BlockHeight = u64;

/// Identifier of a block.
pub type BlockId = Hash;

/// Amount of coins in base units.
pub type Currency = u64;

/// Address coins are paid to: the hash of a set of spend conditions.
pub type CoinAddress = Hash;

/// Identifier of a spendable output.
pub type OutputId = Hash;

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// Size of one Merkle leaf of a stored file.
pub const SEGMENT_SIZE: usize = 64;

/// The burn address. Coins sent here are unspendable.
pub const EMPTY_ADDRESS: CoinAddress = [0u8; 32];

const FILE_CONTRACT_SPECIFIER: &str = "file contract";

/// Identifier of a file contract. Derived from the transaction that created
/// the contract, so it cannot be recomputed from the contract terms alone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct FileContractId(pub Hash);

impl fmt::Display for FileContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Conditions under which an output may be spent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpendConditions {
    /// Height before which the output cannot be spent.
    pub time_lock: BlockHeight,
    /// Number of signatures required.
    pub num_signatures: u64,
    /// Keys allowed to sign.
    pub public_keys: Vec<PublicKey>,
}

impl SpendConditions {
    /// The address these conditions pay to.
    pub fn coin_address(&self) -> Result<CoinAddress, EncodingError> {
        hash_object(self)
    }
}

/// A spent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub output_id: OutputId,
    pub spend_conditions: SpendConditions,
}

/// A newly created output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: Currency,
    pub spend_hash: CoinAddress,
}

/// Which parts of a transaction a signature commits to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoveredFields {
    pub whole_transaction: bool,
}

impl CoveredFields {
    /// Cover every field of the transaction.
    pub fn whole_transaction() -> Self {
        Self {
            whole_transaction: true,
        }
    }
}

/// A signature over (part of) a transaction, authorizing one input.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub input_index: u64,
    pub covered_fields: CoveredFields,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

/// A transaction as exchanged between renter, host, wallet and consensus.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub miner_fees: Vec<Currency>,
    pub outputs: Vec<Output>,
    pub file_contracts: Vec<FileContract>,
    pub storage_proofs: Vec<StorageProof>,
    pub arbitrary_data: Vec<u8>,
    pub signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// Identifier of the transaction. Signatures are excluded so the id is
    /// stable while inputs are being signed.
    pub fn id(&self) -> Result<Hash, EncodingError> {
        let unsigned = Transaction {
            signatures: Vec::new(),
            ..self.clone()
        };
        hash_object(&unsigned)
    }

    /// Identifier of the file contract at `index`.
    pub fn file_contract_id(&self, index: usize) -> Result<FileContractId, EncodingError> {
        let id = hash_object(&(FILE_CONTRACT_SPECIFIER, self.id()?, index as u64))?;
        Ok(FileContractId(id))
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Terms of a storage agreement between a renter and a host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileContract {
    /// Total coins locked in the contract.
    pub contract_fund: Currency,
    /// Merkle root of the stored file.
    pub file_merkle_root: Hash,
    /// Size of the stored file in bytes.
    pub file_size: u64,
    /// Height at which the contract starts.
    pub start: BlockHeight,
    /// Height at which the contract ends.
    pub end: BlockHeight,
    /// Blocks between consecutive storage proofs.
    pub challenge_window: BlockHeight,
    /// Number of missed proofs tolerated.
    pub tolerance: u64,
    /// Paid per window when a valid proof is submitted.
    pub valid_proof_payout: Currency,
    pub valid_proof_address: CoinAddress,
    /// Paid per window when a proof is missed.
    pub missed_proof_payout: Currency,
    pub missed_proof_address: CoinAddress,
}

impl FileContract {
    /// Blocks between start and end, or `None` if the period is empty.
    pub fn duration(&self) -> Option<BlockHeight> {
        self.end.checked_sub(self.start).filter(|d| *d > 0)
    }

    /// Index of the challenge window containing `height`.
    pub fn window_index(&self, height: BlockHeight) -> Result<BlockHeight, ContractWindowError> {
        if self.challenge_window == 0 {
            return Err(ContractWindowError::ZeroWindow);
        }
        if height < self.start {
            return Err(ContractWindowError::NotStarted {
                height,
                start: self.start,
            });
        }
        if height >= self.end {
            return Err(ContractWindowError::Terminated {
                height,
                end: self.end,
            });
        }
        Ok((height - self.start) / self.challenge_window)
    }
}

/// Proof that a host holds one segment of a contracted file.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    pub contract_id: FileContractId,
    pub window_index: BlockHeight,
    /// Raw bytes of the challenged segment, zero padded.
    #[serde_as(as = "Bytes")]
    pub segment: [u8; SEGMENT_SIZE],
    /// Sibling hashes from the segment's leaf up to the root.
    pub hash_set: Vec<Hash>,
}
