//! Ports module for the storage host

pub mod inbound;
pub mod outbound;

pub use inbound::StorageHostApi;
pub use outbound::{ConsensusGateway, FileStore, Wallet};
