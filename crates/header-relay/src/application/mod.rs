//! # Application Module
//!
//! Relay components orchestrating the domain and outbound ports.

pub mod forwarder;
pub mod puller;
pub mod queue;
pub mod relay;
pub mod shutdown;

pub use forwarder::Forwarder;
pub use puller::HeaderPuller;
pub use queue::HeaderQueue;
pub use relay::Relay;
pub use shutdown::cancellation;
