//! Error types for the storage host
//!
//! Three families, kept apart so callers can tell them apart:
//! - `RejectionReason`: a proposal violates host policy. Sent back to the
//!   renter verbatim; never fatal to the host.
//! - `IntegrityFault`: the renter's upload does not match its contract.
//! - Internal faults (wallet, consensus, storage): reported to the renter as
//!   a generic message.

use shared_types::{BlockHeight, ContractWindowError, Currency, EncodingError, Hash};
use thiserror::Error;

use crate::domain::MerkleError;
use crate::ports::outbound::{ConsensusError, StoreError, WalletError};

/// Why a proposed contract was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("transaction must have exactly one contract, found {count}")]
    WrongContractCount { count: usize },

    #[error("file is of incorrect size - filesize {size}, min {min}, max {max}")]
    FileSizeOutOfBounds { size: u64, min: u64, max: u64 },

    #[error("host is at capacity and can not take more files - filesize {size}, remaining {remaining}")]
    InsufficientCapacity { size: u64, remaining: i64 },

    #[error("contract period is empty - start {start}, end {end}")]
    InvalidContractPeriod { start: BlockHeight, end: BlockHeight },

    #[error("contract duration is out of bounds - duration {duration}, min {min}, max {max}")]
    DurationOutOfBounds {
        duration: BlockHeight,
        min: BlockHeight,
        max: BlockHeight,
    },

    #[error("challenge window is not in bounds - window {window}, min {min}, max {max}")]
    ChallengeWindowOutOfBounds {
        window: BlockHeight,
        min: BlockHeight,
        max: BlockHeight,
    },

    #[error("tolerance is too low - tolerance {tolerance}, min {min}")]
    ToleranceTooLow { tolerance: u64, min: u64 },

    #[error("coins are not paying out to correct address")]
    WrongPayoutAddress,

    #[error("valid proof payout is too low - payout {payout}, required {required}")]
    ValidPayoutTooLow { payout: Currency, required: Currency },

    #[error("burn payout needs to go to the empty address")]
    MissedPayoutNotBurned,

    #[error("burn payout is too high for a missed proof - payout {payout}, max {max}")]
    MissedPayoutTooHigh { payout: Currency, max: Currency },

    #[error("contract fund does not cover the entire duration of the contract - fund {fund}, required {required}")]
    ContractFundTooLow { fund: Currency, required: Currency },
}

/// The renter's upload failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityFault {
    #[error("uploaded file has wrong merkle root")]
    MerkleRootMismatch { expected: Hash, computed: Hash },

    #[error("file not uploaded in time, refusing to go forward with contract - height {height}, start {start}")]
    LateUpload {
        height: BlockHeight,
        start: BlockHeight,
    },

    #[error("upload ended early - expected {expected} bytes, received {received}")]
    ShortUpload { expected: u64, received: u64 },
}

/// Storage host errors
#[derive(Debug, Error)]
pub enum HostError {
    /// Proposal refused by policy
    #[error("contract rejected: {0}")]
    Rejected(#[from] RejectionReason),

    /// Upload does not satisfy the contract
    #[error("integrity fault: {0}")]
    Integrity(#[from] IntegrityFault),

    /// Retrieval of a root the host does not store
    #[error("no record of that file: {}", hex::encode(root))]
    UnknownFile { root: Hash },

    /// Wallet, consensus, or encoding failure
    #[error("internal host error: {reason}")]
    Internal { reason: String },

    /// File store failure
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// Connection or framing failure
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// Schedule bookkeeping violated
    #[error("schedule error: {reason}")]
    Schedule { reason: String },
}

impl HostError {
    pub fn internal(reason: impl Into<String>) -> Self {
        HostError::Internal {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl ToString) -> Self {
        HostError::Protocol {
            reason: reason.to_string(),
        }
    }

    pub fn storage(reason: impl ToString) -> Self {
        HostError::Storage {
            reason: reason.to_string(),
        }
    }

    /// True for policy rejections (as opposed to faults).
    pub fn is_rejection(&self) -> bool {
        matches!(self, HostError::Rejected(_))
    }
}

/// Result type for storage host operations
pub type HostResult<T> = Result<T, HostError>;

impl From<WalletError> for HostError {
    fn from(err: WalletError) -> Self {
        HostError::internal(format!("wallet: {}", err))
    }
}

impl From<ConsensusError> for HostError {
    fn from(err: ConsensusError) -> Self {
        HostError::internal(format!("consensus: {}", err))
    }
}

impl From<StoreError> for HostError {
    fn from(err: StoreError) -> Self {
        HostError::storage(err)
    }
}

impl From<EncodingError> for HostError {
    fn from(err: EncodingError) -> Self {
        HostError::internal(err.to_string())
    }
}

impl From<MerkleError> for HostError {
    fn from(err: MerkleError) -> Self {
        HostError::storage(err)
    }
}

impl From<ContractWindowError> for HostError {
    fn from(err: ContractWindowError) -> Self {
        HostError::internal(err.to_string())
    }
}
