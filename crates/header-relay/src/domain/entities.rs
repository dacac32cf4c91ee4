//! # Domain Entities
//!
//! Core entities for the header relay.

use super::value_objects::Digest;
use serde::{Deserialize, Serialize};

/// Source chain block header identity.
///
/// Carries only what the relay needs for chain-of-custody linkage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Header {
    /// Position in the source chain.
    pub height: u64,
    /// Digest of this header.
    pub hash: Digest,
    /// Digest of the header this one extends.
    pub prev_hash: Digest,
}

impl Header {
    /// Create a new header.
    pub fn new(height: u64, hash: Digest, prev_hash: Digest) -> Self {
        Self {
            height,
            hash,
            prev_hash,
        }
    }

    /// Does this header directly extend `parent`?
    pub fn extends(&self, parent: &Header) -> bool {
        self.prev_hash == parent.hash && parent.height.checked_add(1) == Some(self.height)
    }
}

/// Lifecycle state of a forwarder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwarderState {
    /// The loop is running.
    Running,
    /// The loop has exited for good.
    Stopped(StopReason),
}

impl ForwarderState {
    /// Has the forwarder reached a terminal state?
    pub fn is_stopped(&self) -> bool {
        matches!(self, ForwarderState::Stopped(_))
    }
}

/// Why a forwarder stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation signal fired.
    Cancelled,
    /// A fatal error was delivered on the error channel.
    Errored,
}
