//! # Shared Types Crate
//!
//! Chain entities shared between the storage host and the collaborators it
//! talks to (consensus, wallet, renters).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses the host boundary is
//!   defined here.
//! - **Canonical Hashing**: identifiers are derived by hashing the bincode
//!   encoding of an object, so two nodes agree on ids without coordination.

pub mod entities;
pub mod errors;
pub mod hashing;
pub mod ipc;

pub use entities::*;
pub use errors::*;
pub use hashing::{hash_bytes, hash_object, join_hash};
pub use ipc::*;
