//! Host settings and the on-chain announcement that advertises them.

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, CoinAddress, Currency, EncodingError, SpendConditions};

/// Marker written before an encoded announcement in a transaction's
/// arbitrary data.
pub const HOST_ANNOUNCEMENT_PREFIX: &str = "HostAnnouncement";

/// Blocks a proof must stay on chain before it is considered safe.
pub const STORAGE_PROOF_REORG_DEPTH: BlockHeight = 6;

/// Terms under which the host accepts contracts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostSettings {
    /// Address renters connect to.
    pub net_address: String,
    /// Bytes offered in total. Signed because a shrinking offer can leave the
    /// host over-committed.
    pub total_storage: i64,
    pub min_filesize: u64,
    pub max_filesize: u64,
    pub min_duration: BlockHeight,
    pub max_duration: BlockHeight,
    pub min_challenge_window: BlockHeight,
    pub max_challenge_window: BlockHeight,
    pub min_tolerance: u64,
    /// Coins per byte per block.
    pub price: Currency,
    /// Collateral per byte per block.
    pub burn: Currency,
    /// Where valid-proof payouts must go.
    pub coin_address: CoinAddress,
}

/// Announcement embedded in a transaction so renters can discover the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAnnouncement {
    pub settings: HostSettings,
    /// Index of the frozen-coins output within the announcing transaction.
    pub freeze_index: u64,
    /// Conditions guarding the frozen coins.
    pub spend_conditions: SpendConditions,
}

impl HostAnnouncement {
    /// Prefix followed by the encoded announcement.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let mut data = encode(&HOST_ANNOUNCEMENT_PREFIX)?;
        data.extend(encode(self)?);
        Ok(data)
    }

    /// Parse arbitrary data. `None` if it is not an announcement.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(data);
        let prefix: String = bincode::deserialize_from(&mut cursor).ok()?;
        if prefix != HOST_ANNOUNCEMENT_PREFIX {
            return None;
        }
        bincode::deserialize_from(&mut cursor).ok()
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    bincode::serialize(value).map_err(|e| EncodingError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announcement() -> HostAnnouncement {
        HostAnnouncement {
            settings: HostSettings {
                net_address: "127.0.0.1:9988".into(),
                total_storage: 1 << 30,
                price: 3,
                ..Default::default()
            },
            freeze_index: 1,
            spend_conditions: SpendConditions {
                time_lock: 500,
                num_signatures: 1,
                public_keys: vec![[4u8; 32]],
            },
        }
    }

    #[test]
    fn test_announcement_roundtrip() {
        let data = announcement().encode().unwrap();
        assert_eq!(HostAnnouncement::decode(&data), Some(announcement()));
    }

    #[test]
    fn test_foreign_arbitrary_data_is_ignored() {
        let data = bincode::serialize("SomethingElse").unwrap();
        assert_eq!(HostAnnouncement::decode(&data), None);
        assert_eq!(HostAnnouncement::decode(&[]), None);
    }
}
