//! # Canonical Hashing
//!
//! SHA-256 over raw bytes, over two joined hashes, and over the bincode
//! encoding of any serializable object.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::entities::Hash;
use crate::errors::EncodingError;

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash two concatenated hashes: `H(left || right)`.
pub fn join_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Hash the canonical (bincode) encoding of an object.
pub fn hash_object<T: Serialize + ?Sized>(object: &T) -> Result<Hash, EncodingError> {
    let bytes = bincode::serialize(object).map_err(|e| EncodingError {
        message: e.to_string(),
    })?;
    Ok(hash_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_hash_is_order_sensitive() {
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_ne!(join_hash(&a, &b), join_hash(&b, &a));
    }

    #[test]
    fn test_hash_object_matches_encoded_bytes() {
        let value = (7u64, "segment");
        let encoded = bincode::serialize(&value).unwrap();
        assert_eq!(hash_object(&value).unwrap(), hash_bytes(&encoded));
    }
}
