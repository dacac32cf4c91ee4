//! Cooperative cancellation.
//!
//! Relay components are governed by a `watch::Receiver<bool>`; `true` means
//! cancelled. A dropped sender counts as cancellation.

use tokio::sync::watch;

/// Create a cancellation signal.
pub fn cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Has cancellation been requested?
pub(crate) fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

/// Resolve once cancellation is requested.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // Err means the sender is gone, which is cancellation too.
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}
