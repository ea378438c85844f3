//! # Storage Host Service
//!
//! Implements `StorageHostApi` on top of the domain layer and the outbound
//! ports.
//!
//! - `core`: construction, settings, announcement
//! - `negotiation`: contract sessions and file registration
//! - `retrieval`: file downloads
//! - `maintenance`: proof maintenance driver and expiry reclamation

mod api;
mod core;
mod maintenance;
mod negotiation;
mod retrieval;

pub use self::core::{decode_announcement, StorageHost};
