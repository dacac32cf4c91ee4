//! # Ports Module
//!
//! Hexagonal architecture ports (inbound header sink, outbound chains).

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
