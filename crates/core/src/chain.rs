//! Chain clock types.

use std::fmt::Display;

use borsh::{BorshDeserialize, BorshSchema, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::arith::{self, checked};

/// The height of a block in the chain.
///
/// Heights are the only clock the protocol core ever reads. They are supplied
/// by the execution environment and are monotonically non-decreasing across
/// calls. The value `0` is reserved as a "never" sentinel in per-governor
/// bookkeeping; real blocks start at height 1.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSchema,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// The "never happened" sentinel.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Whether this height is the "never happened" sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The next block height.
    pub fn next(self) -> Result<Self, arith::Error> {
        Ok(Self(checked!(self.0 + 1)?))
    }

    /// Blocks elapsed since `earlier`, or `None` if `earlier` is in the
    /// future.
    pub fn blocks_since(self, earlier: BlockHeight) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    /// The height `blocks` after this one.
    pub fn plus(self, blocks: u64) -> Result<Self, arith::Error> {
        Ok(Self(checked!(self.0 + blocks)?))
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockHeight {
    fn from(height: u64) -> Self {
        Self(height)
    }
}
