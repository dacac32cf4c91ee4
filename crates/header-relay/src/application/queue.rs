//! # Headers Queue
//!
//! Bounded FIFO between header producers and the forwarder loop.
//!
//! The queue is a transport, not a validator: ordering and linkage are
//! checked at push time. Enqueueing into a full queue suspends the producer
//! until the forwarder drains it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::{Header, RelayError};
use crate::ports::HeaderSink;

/// Create a headers queue with the given capacity.
pub(crate) fn header_queue(capacity: usize) -> (HeaderQueue, QueueReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        HeaderQueue { sender },
        QueueReceiver {
            inner: Arc::new(Mutex::new(receiver)),
        },
    )
}

/// Producer handle of the headers queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct HeaderQueue {
    sender: mpsc::Sender<Header>,
}

impl HeaderQueue {
    /// Enqueue a header, suspending while the queue is full.
    pub async fn enqueue(&self, header: Header) -> Result<(), RelayError> {
        let height = header.height;
        self.sender
            .send(header)
            .await
            .map_err(|_| RelayError::QueueClosed)?;
        debug!("[queue] Enqueued header ({})", height);
        Ok(())
    }

    /// Number of headers waiting in the queue.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of headers the queue holds.
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Has the consumer side gone away?
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl HeaderSink for HeaderQueue {
    async fn enqueue(&self, header: Header) -> Result<(), RelayError> {
        HeaderQueue::enqueue(self, header).await
    }

    fn pending(&self) -> usize {
        self.len()
    }
}

/// Consumer side of the headers queue.
///
/// Buffered headers live as long as any clone of this handle does, so a
/// stopped forwarder keeps its unconsumed headers observable.
#[derive(Clone, Debug)]
pub(crate) struct QueueReceiver {
    inner: Arc<Mutex<mpsc::Receiver<Header>>>,
}

impl QueueReceiver {
    /// Take exclusive ownership of the receiving end.
    pub(crate) async fn lock(&self) -> OwnedMutexGuard<mpsc::Receiver<Header>> {
        Arc::clone(&self.inner).lock_owned().await
    }
}
