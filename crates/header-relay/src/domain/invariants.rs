//! # Domain Invariants
//!
//! Relay constants and the rules a batch must satisfy before it reaches the
//! host chain.

use super::entities::Header;
use super::errors::ChainError;

/// Capacity of the headers queue.
pub const HEADERS_QUEUE_SIZE: usize = 50;

/// Maximum number of headers pulled into one batch. Also the number of
/// processed headers after which the host chain's best-known digest advances.
pub const HEADERS_BATCH_SIZE: usize = 5;

/// Time the pull phase waits for the next header before returning a partial
/// batch.
pub const HEADER_TIMEOUT_MS: u64 = 1_000;

/// Length of a Bitcoin difficulty epoch, in blocks.
pub const DIFFICULTY_EPOCH_DURATION: u64 = 2016;

/// Time the forwarder rests after a successful push.
pub const FORWARDER_SLEEP_MS: u64 = 45_000;

/// Invariant: headers in a batch are height-consecutive and each one extends
/// its predecessor.
pub fn invariant_linked_batch(headers: &[Header]) -> Result<(), ChainError> {
    for pair in headers.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        if prev.height.checked_add(1) != Some(curr.height) {
            return Err(ChainError::HeightGap {
                expected: prev.height.saturating_add(1),
                got: curr.height,
            });
        }

        if curr.prev_hash != prev.hash {
            return Err(ChainError::BrokenLinkage {
                height: curr.height,
                expected: prev.hash,
                got: curr.prev_hash,
            });
        }
    }
    Ok(())
}

/// Invariant: a single submission never crosses an epoch boundary.
pub fn invariant_single_epoch(headers: &[Header], epoch_length: u64) -> bool {
    match (headers.first(), headers.last()) {
        (Some(first), Some(last)) => first.height / epoch_length == last.height / epoch_length,
        _ => true,
    }
}
