//! # Storage Host
//!
//! The host side of a storage network: it sells disk space to renters through
//! file contracts and proves, block after block, that it still holds the data.
//!
//! ## Overview
//!
//! - **Contract Validator**: checks a proposed contract against host policy
//!   and capacity, then adds and signs the host's collateral.
//! - **Negotiation / Retrieval**: one session per connection; uploads are
//!   verified against the contract's Merkle root before they are registered.
//! - **Proof Schedule**: height-indexed forward (due) and backward (recently
//!   proven) buckets of contract entries.
//! - **Proof Maintenance**: driven by every chain update; regenerates proofs
//!   lost to a reorg, builds the proofs now due, and submits them all in one
//!   transaction.
//!
//! ## Flow
//!
//! ```text
//! renter ──proposal──→ Negotiation ──→ Validator ──→ Wallet (fund + sign)
//!                          │                     └──→ Consensus (validate)
//!                          ├── upload ──→ FileStore ──→ Merkle root check
//!                          └── register ──→ HostState (files + schedule)
//!
//! Consensus ──ChainUpdate──→ Maintenance ──→ Schedule ──→ Merkle proofs
//!                                 └──→ one transaction ──→ Wallet ──→ Consensus
//! ```
//!
//! ## Concurrency
//!
//! All mutable host data sits in one `HostState` behind a single
//! `parking_lot::RwLock`. The lock is never held across network transfers;
//! the maintenance driver holds the write lock for its whole height walk.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod wire;

pub use domain::{
    build_reader_proof, calculate_segments, reader_merkle_root, validate_contract,
    verify_segment_proof, ContractEntry, FileRegistration, HostAnnouncement, HostConfig,
    HostSettings, HostState, MerkleError, ProofSchedule, ScheduleError, SegmentProof,
    StorageLocation, StoredFile, HOST_ANNOUNCEMENT_PREFIX, STORAGE_PROOF_REORG_DEPTH,
};
pub use error::{HostError, HostResult, IntegrityFault, RejectionReason};
pub use ports::inbound::{MaintenanceReport, NegotiationOutcome, ReclaimReport, StorageHostApi};
pub use ports::outbound::{
    ConsensusError, ConsensusGateway, FileStore, ReadSeek, StoreError, Wallet, WalletError,
};
pub use service::StorageHost;
pub use wire::{HostRequest, ACCEPT_CONTRACT_RESPONSE, HOST_TROUBLE_RESPONSE};
