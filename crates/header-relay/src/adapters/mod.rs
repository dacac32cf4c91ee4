//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory implementations of the chain ports, used to run the relay
//! without a Bitcoin node or a host chain.

mod local_host;
mod local_source;

pub use local_host::{LocalHostChain, RecordedSubmission};
pub use local_source::{build_header_chain, make_header_digest, LocalSourceChain};
