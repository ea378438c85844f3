//! Domain layer: pure host logic, no I/O beyond `std::io::Read`.

pub mod config;
pub mod merkle;
pub mod schedule;
pub mod settings;
pub mod state;
pub mod validator;

pub use config::HostConfig;
pub use merkle::{
    build_reader_proof, calculate_segments, reader_merkle_root, verify_segment_proof,
    MerkleError, SegmentProof,
};
pub use schedule::{ContractEntry, ProofSchedule, ScheduleError};
pub use settings::{
    HostAnnouncement, HostSettings, HOST_ANNOUNCEMENT_PREFIX, STORAGE_PROOF_REORG_DEPTH,
};
pub use state::{FileRegistration, HostState, ReleasedFile, StorageLocation, StoredFile};
pub use validator::{required_collateral, validate_contract};
