//! Merkle Proof Builder
//!
//! Files are split into `SEGMENT_SIZE`-byte leaves (the last one zero
//! padded). A tree over `n` leaves has a left subtree over the largest power
//! of two strictly less than `n` and a right subtree over the remainder. The
//! leaf hash is `H(segment)`, an interior node is `H(left || right)`.
//!
//! Roots and proofs are computed in one streaming pass: completed perfect
//! subtrees are kept on a stack and merged as soon as two of equal height
//! meet, then the stack is folded right to left at the end.

use std::io::{ErrorKind, Read};

use shared_types::{hash_bytes, join_hash, Hash, SEGMENT_SIZE};
use thiserror::Error;

/// Merkle computation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("cannot build a tree over zero segments")]
    NoSegments,

    #[error("segment index {index} out of range for {segments} segments")]
    IndexOutOfRange { index: u64, segments: u64 },

    #[error("reader ended at segment {segment} of {segments}")]
    UnexpectedEof { segment: u64, segments: u64 },

    #[error("read failed: {reason}")]
    Io { reason: String },
}

/// One challenged segment and its sibling hashes, ordered leaf to root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentProof {
    pub segment: [u8; SEGMENT_SIZE],
    pub hash_set: Vec<Hash>,
}

/// Number of leaves for a file of `file_size` bytes.
///
/// A zero-byte file still occupies one (all zero) segment.
pub fn calculate_segments(file_size: u64) -> u64 {
    let segment = SEGMENT_SIZE as u64;
    file_size.div_ceil(segment).max(1)
}

/// Merkle root of the first `num_segments` segments read from `reader`.
pub fn reader_merkle_root<R: Read>(reader: &mut R, num_segments: u64) -> Result<Hash, MerkleError> {
    let (root, _) = stream_tree(reader, num_segments, None)?;
    Ok(root)
}

/// Proof that segment `proof_index` belongs to the tree over `num_segments`
/// segments read from `reader`.
pub fn build_reader_proof<R: Read>(
    reader: &mut R,
    num_segments: u64,
    proof_index: u64,
) -> Result<SegmentProof, MerkleError> {
    if proof_index >= num_segments {
        return Err(MerkleError::IndexOutOfRange {
            index: proof_index,
            segments: num_segments,
        });
    }
    let (_, proof) = stream_tree(reader, num_segments, Some(proof_index))?;
    proof.ok_or(MerkleError::IndexOutOfRange {
        index: proof_index,
        segments: num_segments,
    })
}

/// Check `proof` for segment `proof_index` against `root`.
pub fn verify_segment_proof(
    proof: &SegmentProof,
    num_segments: u64,
    proof_index: u64,
    root: &Hash,
) -> bool {
    if proof_index >= num_segments {
        return false;
    }
    let sides = sibling_sides(proof_index, num_segments);
    if sides.len() != proof.hash_set.len() {
        return false;
    }

    let mut current = hash_bytes(&proof.segment);
    for (sibling, side) in proof.hash_set.iter().zip(sides) {
        current = match side {
            Side::Left => join_hash(sibling, &current),
            Side::Right => join_hash(&current, sibling),
        };
    }
    current == *root
}

// =============================================================================
// STREAMING TREE
// =============================================================================

struct Subtree {
    height: u32,
    hash: Hash,
    holds_target: bool,
}

struct TreeBuilder {
    stack: Vec<Subtree>,
    target: Option<u64>,
    path: Vec<Hash>,
    pushed: u64,
}

impl TreeBuilder {
    fn new(target: Option<u64>) -> Self {
        Self {
            stack: Vec::new(),
            target,
            path: Vec::new(),
            pushed: 0,
        }
    }

    fn push_leaf(&mut self, leaf: Hash) {
        let holds_target = self.target == Some(self.pushed);
        self.pushed += 1;

        let mut node = Subtree {
            height: 0,
            hash: leaf,
            holds_target,
        };
        while matches!(self.stack.last(), Some(top) if top.height == node.height) {
            let Some(left) = self.stack.pop() else { break };
            node = self.merge(left, node);
        }
        self.stack.push(node);
    }

    fn merge(&mut self, left: Subtree, right: Subtree) -> Subtree {
        if left.holds_target {
            self.path.push(right.hash);
        } else if right.holds_target {
            self.path.push(left.hash);
        }
        Subtree {
            height: left.height + 1,
            hash: join_hash(&left.hash, &right.hash),
            holds_target: left.holds_target || right.holds_target,
        }
    }

    fn finish(mut self) -> Option<(Hash, Vec<Hash>)> {
        let mut acc = self.stack.pop()?;
        while let Some(left) = self.stack.pop() {
            acc = self.merge(left, acc);
        }
        Some((acc.hash, self.path))
    }
}

fn stream_tree<R: Read>(
    reader: &mut R,
    num_segments: u64,
    target: Option<u64>,
) -> Result<(Hash, Option<SegmentProof>), MerkleError> {
    if num_segments == 0 {
        return Err(MerkleError::NoSegments);
    }

    let mut builder = TreeBuilder::new(target);
    let mut target_segment = None;
    for index in 0..num_segments {
        let mut segment = [0u8; SEGMENT_SIZE];
        // an empty file is one all-zero segment
        if read_segment(reader, &mut segment)? == 0 && index > 0 {
            return Err(MerkleError::UnexpectedEof {
                segment: index,
                segments: num_segments,
            });
        }
        if target == Some(index) {
            target_segment = Some(segment);
        }
        builder.push_leaf(hash_bytes(&segment));
    }

    let (root, path) = builder.finish().ok_or(MerkleError::NoSegments)?;
    let proof = target_segment.map(|segment| SegmentProof {
        segment,
        hash_set: path,
    });
    Ok((root, proof))
}

/// Fill `buf` from `reader`; short only at end of stream.
fn read_segment<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, MerkleError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(MerkleError::Io {
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok(filled)
}

// =============================================================================
// VERIFICATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Side of each sibling relative to the running hash, ordered leaf to root.
fn sibling_sides(mut index: u64, mut size: u64) -> Vec<Side> {
    let mut sides = Vec::new();
    while size > 1 {
        let split = largest_power_of_two_below(size);
        if index < split {
            sides.push(Side::Right);
            size = split;
        } else {
            sides.push(Side::Left);
            index -= split;
            size -= split;
        }
    }
    sides.reverse();
    sides
}

/// Largest power of two strictly less than `n` (`n >= 2`).
fn largest_power_of_two_below(n: u64) -> u64 {
    let next = n.next_power_of_two();
    if next == n {
        n / 2
    } else {
        next / 2
    }
}
