//! # Algorithms Module
//!
//! Difficulty-epoch-aware batch planning.

pub mod epoch_split;

pub use epoch_split::{classify_batch, plan_submissions, Submission};
