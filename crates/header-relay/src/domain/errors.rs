//! # Domain Errors
//!
//! Error types for the header relay.
//!
//! `ChainError` is what a chain collaborator reports. `RelayError` is what a
//! relay component surfaces on its error channel; every `RelayError` is fatal
//! to the component that produced it.

use super::value_objects::Digest;
use thiserror::Error;

/// Errors reported by the source chain or the host chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// No header with the given digest is known.
    #[error("no header with digest [{0}]")]
    HeaderNotFound(Digest),

    /// No header at the given height is known.
    #[error("no header at height [{0}]")]
    HeightNotFound(u64),

    /// The header preceding a submitted batch is not known to the chain.
    #[error("could not get anchor header by digest: [no header with digest [{anchor}]]")]
    AnchorNotFound {
        /// Digest of the missing anchor header.
        anchor: Digest,
        /// Height of the first header of the rejected batch.
        height: u64,
    },

    /// A header does not extend its predecessor in the batch.
    #[error("broken linkage at height {height}: expected previous digest [{expected}], got [{got}]")]
    BrokenLinkage {
        /// Height of the offending header.
        height: u64,
        /// Digest of the preceding header in the batch.
        expected: Digest,
        /// Previous digest the header actually references.
        got: Digest,
    },

    /// Heights in a batch are not consecutive.
    #[error("height gap: expected height {expected}, got {got}")]
    HeightGap {
        /// Height that should follow the preceding header.
        expected: u64,
        /// Height actually found.
        got: u64,
    },

    /// The chain rejected an otherwise well-formed batch.
    #[error("headers {first}..={last} rejected: {reason}")]
    Rejected {
        /// First height of the rejected submission.
        first: u64,
        /// Last height of the rejected submission.
        last: u64,
        /// Reason given by the chain.
        reason: String,
    },

    /// Chain state could not be read or written.
    #[error("chain state unavailable: {0}")]
    Unavailable(String),

    /// The host chain refused to add a submitted batch.
    #[error("could not add headers: [{0}]")]
    AddHeaders(#[source] Box<ChainError>),
}

impl ChainError {
    /// Wrap a submission failure reported by the host chain.
    pub fn add_headers(cause: ChainError) -> Self {
        ChainError::AddHeaders(Box::new(cause))
    }

    /// The innermost error, past any `AddHeaders` wrapping.
    pub fn root(&self) -> &ChainError {
        match self {
            ChainError::AddHeaders(inner) => inner.root(),
            other => other,
        }
    }
}

/// Classification of relay errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Anchor missing or batch not linked: the chains diverged or the queue
    /// feed is out of order.
    Linkage,
    /// The host chain's best-known digest is unknown to the source chain.
    DigestResolution,
    /// The host chain rejected a submission or is unavailable.
    Submission,
    /// Misconfiguration or a closed queue.
    Internal,
}

/// Fatal errors surfaced by the forwarder, the header puller and the relay.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Submitting a batch to the host chain failed.
    #[error("could not push headers: [{0}]")]
    Push(#[source] ChainError),

    /// Advancing the host chain's best-known digest failed.
    #[error("could not update best known digest: [{0}]")]
    BestDigestUpdate(#[source] ChainError),

    /// The host chain's best-known digest could not be resolved on the
    /// source chain.
    #[error("could not find best block for pulling loop: [{0}]")]
    BestBlockResolution(#[source] ChainError),

    /// Reading headers from the source chain failed.
    #[error("could not pull headers from source chain: [{0}]")]
    SourcePull(#[source] ChainError),

    /// The headers queue was closed while a producer was enqueueing.
    #[error("headers queue closed")]
    QueueClosed,

    /// Relay configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    /// Map this error onto the relay's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Push(inner)
            | RelayError::BestDigestUpdate(inner)
            | RelayError::SourcePull(inner) => match inner.root() {
                ChainError::AnchorNotFound { .. }
                | ChainError::BrokenLinkage { .. }
                | ChainError::HeightGap { .. } => ErrorKind::Linkage,
                ChainError::HeaderNotFound(_) => ErrorKind::DigestResolution,
                ChainError::HeightNotFound(_)
                | ChainError::Rejected { .. }
                | ChainError::Unavailable(_)
                | ChainError::AddHeaders(_) => ErrorKind::Submission,
            },
            RelayError::BestBlockResolution(_) => ErrorKind::DigestResolution,
            RelayError::QueueClosed | RelayError::InvalidConfig(_) => ErrorKind::Internal,
        }
    }
}
