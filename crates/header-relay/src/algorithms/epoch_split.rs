//! # Epoch Split
//!
//! Classifies a header batch against the difficulty epoch boundary and plans
//! the host chain submissions for it.
//!
//! The host chain validates proof-of-work against epoch-specific targets, so
//! a submission must never contain headers from two epochs.

use crate::domain::{invariant_single_epoch, EpochClass, EpochContext, Header};

/// One host chain submission: a contiguous slice of a batch plus the epoch
/// context it is validated against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission<'a> {
    /// Headers to submit, in ascending height order.
    pub headers: &'a [Header],
    /// Difficulty context of every header in `headers`.
    pub context: EpochContext,
}

/// Classify a batch by comparing the epoch-relative positions of its first
/// and last header.
///
/// Returns `None` for an empty batch. Expects `headers` to be
/// height-ascending and shorter than one epoch.
///
/// # Panics
/// If `epoch_length` is 0. `RelayConfig::validate` rejects such configs.
pub fn classify_batch(headers: &[Header], epoch_length: u64) -> Option<EpochClass> {
    assert!(epoch_length > 0, "epoch_length must be non-zero");
    let first = headers.first()?;
    let last = headers.last()?;

    let start = first.height % epoch_length;
    let end = last.height % epoch_length;

    let class = if start == 0 {
        EpochClass::BoundaryFirst
    } else if start > end {
        let first_epoch = first.height / epoch_length;
        let split_at = headers
            .iter()
            .position(|h| h.height / epoch_length != first_epoch)
            .unwrap_or(headers.len());
        EpochClass::BoundarySpanning { split_at }
    } else {
        EpochClass::SingleEpoch
    };

    Some(class)
}

/// Plan the host chain submissions for a batch.
///
/// A boundary-spanning batch becomes two submissions: the first ends right
/// before the boundary height, the second starts at it. Every other batch
/// becomes a single submission. An empty batch yields no submissions.
pub fn plan_submissions(headers: &[Header], epoch_length: u64) -> Vec<Submission<'_>> {
    let Some(class) = classify_batch(headers, epoch_length) else {
        return Vec::new();
    };

    let parts: Vec<&[Header]> = match class {
        EpochClass::BoundaryFirst | EpochClass::SingleEpoch => vec![headers],
        EpochClass::BoundarySpanning { split_at } => {
            let (old_epoch, new_epoch) = headers.split_at(split_at);
            vec![old_epoch, new_epoch]
        }
    };

    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(|part| {
            debug_assert!(invariant_single_epoch(part, epoch_length));
            Submission {
                headers: part,
                context: EpochContext::for_height(part[0].height, epoch_length),
            }
        })
        .collect()
}
