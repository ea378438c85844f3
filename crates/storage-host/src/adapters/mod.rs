//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits. The in-memory adapters back the
//! runtime's development mode and the test suite.

mod consensus;
mod file_store;
mod wallet;

pub use consensus::InMemoryConsensus;
pub use file_store::{DiskFileStore, InMemoryFileStore};
pub use wallet::{dev_spend_conditions, InMemoryWallet};
