//! # Outbound Ports
//!
//! Traits for the chains the relay talks to.

use crate::domain::{ChainError, Digest, EpochContext, Header};
use async_trait::async_trait;

/// Read access to the source chain (Bitcoin).
///
/// Headers form a singly-linked chain via `prev_hash`.
#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Get the header with the given digest.
    ///
    /// # Errors
    /// - `HeaderNotFound` if no such header is known
    async fn header_by_digest(&self, digest: &Digest) -> Result<Header, ChainError>;

    /// Get the best-chain header at the given height.
    ///
    /// # Errors
    /// - `HeightNotFound` if the chain is shorter than `height`
    async fn header_by_height(&self, height: u64) -> Result<Header, ChainError>;

    /// Height of the current source chain tip, `None` for an empty chain.
    async fn best_height(&self) -> Result<Option<u64>, ChainError>;
}

/// Read/write access to the host chain's view of the source chain.
#[async_trait]
pub trait HostChain: Send + Sync {
    /// Digest the host chain currently considers the source chain's tip.
    ///
    /// # Errors
    /// - `Unavailable` when the host chain's state cannot be read
    async fn get_best_known_digest(&self) -> Result<Digest, ChainError>;

    /// Submit a height-ascending run of headers that lies within one
    /// difficulty epoch.
    ///
    /// The header preceding `headers` (the anchor, `headers[0].prev_hash`)
    /// must already be known to the host chain.
    ///
    /// # Errors
    /// - `AnchorNotFound` if the anchor is unknown; the chains diverged
    /// - `BrokenLinkage` / `HeightGap` if the headers are not linked
    /// - `Rejected` for any other validation failure
    async fn submit_headers(
        &self,
        headers: &[Header],
        context: EpochContext,
    ) -> Result<(), ChainError>;

    /// Advance the host chain's best-known digest.
    ///
    /// # Errors
    /// - `HeaderNotFound` if the digest was never submitted
    async fn set_best_known_digest(&self, digest: Digest) -> Result<(), ChainError>;
}
