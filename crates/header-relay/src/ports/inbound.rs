//! # Inbound Ports
//!
//! How producers hand headers to the relay.

use crate::domain::{Header, RelayError};
use async_trait::async_trait;

/// Sink for newly observed source chain headers - inbound port.
///
/// Producers submit headers one at a time, in ascending height order.
#[async_trait]
pub trait HeaderSink: Send + Sync {
    /// Enqueue a header, suspending while the sink is full.
    ///
    /// # Errors
    /// - `QueueClosed` if the consumer is gone
    async fn enqueue(&self, header: Header) -> Result<(), RelayError>;

    /// Number of headers waiting to be consumed.
    fn pending(&self) -> usize;
}
