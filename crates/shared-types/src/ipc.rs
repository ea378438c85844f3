//! # Cross-Subsystem Events
//!
//! Events the consensus engine delivers to the storage host.
//!
//! ## Delivery Rules
//!
//! - One `ChainUpdate` per chain-state transition, in order, with no gaps.
//! - The consensus state must not change height while the host processes
//!   the update.

use serde::{Deserialize, Serialize};

use crate::entities::{BlockHeight, BlockId};

/// A chain-state transition: some blocks rewound, then some blocks applied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainUpdate {
    /// Chain height before the transition.
    pub initial_height: BlockHeight,
    /// Blocks removed from the tip. Only the count matters to the host.
    pub rewound_blocks: Vec<BlockId>,
    /// Blocks added to the tip after the rewind.
    pub applied_blocks: Vec<BlockId>,
}

impl ChainUpdate {
    /// Height after the transition.
    pub fn final_height(&self) -> BlockHeight {
        self.initial_height
            .saturating_sub(self.rewound_blocks.len() as BlockHeight)
            .saturating_add(self.applied_blocks.len() as BlockHeight)
    }

    /// True if the transition rewound at least one block.
    pub fn is_reorg(&self) -> bool {
        !self.rewound_blocks.is_empty()
    }
}
