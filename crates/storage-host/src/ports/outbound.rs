//! Driven Ports (SPI - Outbound Dependencies)
//!
//! The host never holds its state lock while calling through these.

use std::io::{Read, Seek, Write};

use shared_types::{
    BlockHeight, CoveredFields, Currency, FileContractId, SpendConditions, Transaction,
};
use thiserror::Error;

use crate::domain::StorageLocation;

/// Funds and signs transactions on the host's behalf.
pub trait Wallet: Send + Sync {
    /// Add inputs (and change outputs) worth at least `amount`.
    fn fund_transaction(&self, amount: Currency, txn: &mut Transaction) -> Result<(), WalletError>;

    /// Sign the input at `input_index`.
    fn sign_transaction(
        &self,
        txn: &mut Transaction,
        covered_fields: CoveredFields,
        input_index: usize,
    ) -> Result<(), WalletError>;

    /// Conditions guarding the wallet's own outputs.
    fn spend_conditions(&self) -> SpendConditions;
}

/// View of the chain and entry point for new transactions.
///
/// Implementations synchronize internally; the host calls them briefly and
/// never while holding its own lock.
pub trait ConsensusGateway: Send + Sync {
    fn height(&self) -> BlockHeight;

    /// Check `txn` against consensus rules without submitting it.
    fn valid_transaction(&self, txn: &Transaction) -> Result<(), ConsensusError>;

    /// Submit `txn` to the transaction pool.
    fn accept_transaction(&self, txn: Transaction) -> Result<(), ConsensusError>;

    /// Segment the chain currently challenges for `contract_id` in window
    /// `window_index`. Seeded from the current tip, so a reorg can change it.
    fn storage_proof_segment_index(
        &self,
        contract_id: FileContractId,
        window_index: BlockHeight,
    ) -> Result<u64, ConsensusError>;
}

/// Readable, seekable stored file.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Local byte storage: store bytes, read bytes, seek, delete.
pub trait FileStore: Send + Sync {
    fn create(&self, location: &StorageLocation) -> Result<Box<dyn Write + Send>, StoreError>;

    fn open(&self, location: &StorageLocation) -> Result<Box<dyn ReadSeek>, StoreError>;

    fn remove(&self, location: &StorageLocation) -> Result<(), StoreError>;
}

/// Wallet failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Currency, available: Currency },

    #[error("no input at index {index}")]
    NoSuchInput { index: usize },

    #[error("signing failed: {reason}")]
    Signing { reason: String },
}

/// Consensus failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("unknown file contract {id}")]
    UnknownContract { id: FileContractId },

    #[error("window {window_index} is outside contract {id}")]
    WindowOutOfRange {
        id: FileContractId,
        window_index: BlockHeight,
    },
}

/// File store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no stored file at {location}")]
    NotFound { location: String },

    #[error("I/O error at {location}: {reason}")]
    Io { location: String, reason: String },
}

impl StoreError {
    pub fn io(location: &StorageLocation, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return StoreError::NotFound {
                location: location.to_string(),
            };
        }
        StoreError::Io {
            location: location.to_string(),
            reason: err.to_string(),
        }
    }
}
