//! # Header Relay
//!
//! Relays Bitcoin block headers from a source chain to a host chain that
//! tracks Bitcoin's header chain.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Keep the host chain's view of Bitcoin current by:
//! - Buffering headers in a bounded queue with back-pressure
//! - Forwarding them in batches of up to five
//! - Splitting batches at difficulty epoch boundaries
//! - Advancing the host chain's best-known digest as batches land
//!
//! ## Guarantees
//!
//! | Property | Description |
//! |----------|-------------|
//! | Ordering | Headers reach the host chain in queue order |
//! | Epoch purity | No submission mixes two difficulty epochs |
//! | Fail-stop | The first error halts the forwarder; queued headers stay queued |
//! | Cancellation | After cancel, no further headers are taken off the queue |
//!
//! ## Module Structure
//!
//! ```text
//! header-relay/
//! ├── domain/          # Header, Digest, EpochContext, errors, constants
//! ├── algorithms/      # Epoch classification and submission planning
//! ├── ports/           # HeaderSink (inbound) + SourceChain/HostChain (outbound)
//! ├── adapters/        # In-memory source and host chains
//! ├── application/     # Queue, Forwarder, HeaderPuller, Relay
//! └── config.rs        # RelayConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{build_header_chain, LocalHostChain, LocalSourceChain, RecordedSubmission};
pub use algorithms::{classify_batch, plan_submissions, Submission};
pub use application::{cancellation, Forwarder, HeaderPuller, HeaderQueue, Relay};
pub use config::RelayConfig;
pub use domain::{
    ChainError, Digest, EpochClass, EpochContext, ErrorKind, ForwarderState, Header, RelayError,
    StopReason, DIFFICULTY_EPOCH_DURATION, FORWARDER_SLEEP_MS, HEADERS_BATCH_SIZE,
    HEADERS_QUEUE_SIZE, HEADER_TIMEOUT_MS,
};
pub use ports::{HeaderSink, HostChain, SourceChain};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
