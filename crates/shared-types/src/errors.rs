//! # Error Types
//!
//! Errors raised by the shared chain entities.

use thiserror::Error;

use crate::entities::BlockHeight;

/// Canonical encoding of an object failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Encoding error: {message}")]
pub struct EncodingError {
    pub message: String,
}

/// A height cannot be mapped onto a contract's challenge windows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractWindowError {
    /// The contract's first window has not opened yet.
    #[error("contract has not yet started: height {height}, start {start}")]
    NotStarted { height: BlockHeight, start: BlockHeight },

    /// The contract's last window has closed.
    #[error("contract has terminated: height {height}, end {end}")]
    Terminated { height: BlockHeight, end: BlockHeight },

    /// A zero-length window would divide by zero.
    #[error("contract has a zero-length challenge window")]
    ZeroWindow,
}
