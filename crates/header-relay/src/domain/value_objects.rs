//! # Domain Value Objects
//!
//! Immutable value types for the header relay.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte block digest.
///
/// Displays as lowercase hex in byte order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The all-zero digest.
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

/// Difficulty context a host chain submission is validated against.
///
/// A submission never crosses an epoch boundary, so one context describes
/// every header in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochContext {
    /// Epoch number (`height / epoch_length`).
    pub epoch: u64,
    /// First height of the epoch.
    pub epoch_start: u64,
    /// The submission starts exactly at the epoch boundary and therefore
    /// introduces the epoch's new difficulty target.
    pub retarget: bool,
}

impl EpochContext {
    /// Context for a submission whose first header sits at `first_height`.
    ///
    /// # Panics
    /// If `epoch_length` is 0.
    pub fn for_height(first_height: u64, epoch_length: u64) -> Self {
        assert!(epoch_length > 0, "epoch_length must be non-zero");
        let epoch = first_height / epoch_length;
        let epoch_start = epoch * epoch_length;
        Self {
            epoch,
            epoch_start,
            retarget: first_height == epoch_start,
        }
    }

    /// Does `height` belong to this context's epoch?
    ///
    /// # Panics
    /// If `epoch_length` is 0.
    pub fn contains(&self, height: u64, epoch_length: u64) -> bool {
        height / epoch_length == self.epoch
    }
}

/// How a batch relates to the difficulty epoch boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochClass {
    /// The first header sits exactly at an epoch boundary.
    BoundaryFirst,
    /// The batch straddles an epoch rollover; `split_at` is the index of the
    /// first header of the new epoch.
    BoundarySpanning {
        /// Index of the first header at or past the boundary.
        split_at: usize,
    },
    /// The batch lies entirely inside one epoch.
    SingleEpoch,
}

impl fmt::Display for EpochClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpochClass::BoundaryFirst => f.write_str("boundary-first"),
            EpochClass::BoundarySpanning { .. } => f.write_str("boundary-spanning"),
            EpochClass::SingleEpoch => f.write_str("single-epoch"),
        }
    }
}
