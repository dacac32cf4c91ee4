//! # Relay
//!
//! Runs a header puller feeding a forwarder and supervises both.
//!
//! The first error from either component, or the parent cancellation, cancels
//! both. The error is re-delivered on the relay's own error channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use super::forwarder::Forwarder;
use super::puller::HeaderPuller;
use super::queue::HeaderQueue;
use super::shutdown::{cancellation, cancelled};
use crate::config::RelayConfig;
use crate::domain::{ForwarderState, RelayError};
use crate::ports::{HostChain, SourceChain};

/// Handle to a running relay.
pub struct Relay {
    id: Uuid,
    queue: HeaderQueue,
    err_rx: mpsc::Receiver<RelayError>,
    forwarder_state: watch::Receiver<ForwarderState>,
    handle: JoinHandle<()>,
}

impl Relay {
    /// Start the forwarder and the header puller under one supervisor.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn run<S, H>(
        cancel: watch::Receiver<bool>,
        source: Arc<S>,
        host: Arc<H>,
        config: RelayConfig,
    ) -> Result<Self, RelayError>
    where
        S: SourceChain + ?Sized + 'static,
        H: HostChain + ?Sized + 'static,
    {
        config.validate()?;

        let id = Uuid::new_v4();
        let (child_tx, child_rx) = cancellation();

        let forwarder = Forwarder::run(
            child_rx.clone(),
            Arc::clone(&source),
            Arc::clone(&host),
            config.clone(),
        )?;
        let queue = forwarder.queue();
        let forwarder_state = forwarder.state_watch();

        let puller = HeaderPuller::run(child_rx, source, host, queue.clone(), config)?;

        let (err_tx, err_rx) = mpsc::channel(1);
        let handle = tokio::spawn(
            supervise(cancel, child_tx, forwarder, puller, err_tx)
                .instrument(tracing::info_span!("relay", id = %id)),
        );

        Ok(Self {
            id,
            queue,
            err_rx,
            forwarder_state,
            handle,
        })
    }

    /// Instance id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Producer handle of the forwarder's headers queue.
    pub fn queue(&self) -> HeaderQueue {
        self.queue.clone()
    }

    /// Error channel of the relay. Yields at most one error.
    pub fn err_channel(&mut self) -> &mut mpsc::Receiver<RelayError> {
        &mut self.err_rx
    }

    /// Current lifecycle state of the forwarder.
    pub fn forwarder_state(&self) -> ForwarderState {
        *self.forwarder_state.borrow()
    }

    /// Wait until both components have stopped.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn supervise(
    mut cancel: watch::Receiver<bool>,
    child_tx: watch::Sender<bool>,
    mut forwarder: Forwarder,
    mut puller: HeaderPuller,
    err_tx: mpsc::Sender<RelayError>,
) {
    info!("[relay] Running relay");

    let first_error = tokio::select! {
        _ = cancelled(&mut cancel) => None,
        Some(e) = forwarder.err_channel().recv() => Some(e),
        Some(e) = puller.err_channel().recv() => Some(e),
        else => None,
    };

    child_tx.send_replace(true);

    match first_error {
        Some(e) => {
            error!("[relay] Relay stopped: {}", e);
            let _ = err_tx.try_send(e);
        }
        None => info!("[relay] Relay cancelled"),
    }

    let reason = forwarder.stopped().await;
    puller.join().await;
    info!("[relay] Relay stopped; forwarder {:?}", reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{build_header_chain, LocalHostChain, LocalSourceChain};
    use crate::domain::{Digest, ErrorKind, StopReason};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_relay_forwards_source_headers() {
        let headers = build_header_chain(0, Digest::ZERO, 11);
        let source = Arc::new(LocalSourceChain::with_headers(headers.clone()));
        let host = Arc::new(LocalHostChain::with_anchor(headers[0].clone()));
        let (tx, cancel) = cancellation();

        let relay = Relay::run(
            cancel,
            source,
            Arc::clone(&host),
            RelayConfig::for_testing(),
        )
        .unwrap();

        tokio::time::timeout(WAIT, async {
            while host.submitted_headers().len() < 10 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(host.submitted_headers(), headers[1..].to_vec());
        assert_eq!(host.best_updates(), vec![headers[5].hash, headers[10].hash]);

        tx.send(true).unwrap();
        let forwarder_state = relay.forwarder_state.clone();
        tokio::time::timeout(WAIT, relay.join()).await.unwrap();
        assert_eq!(
            *forwarder_state.borrow(),
            ForwarderState::Stopped(StopReason::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_relay_surfaces_puller_error() {
        let headers = build_header_chain(0, Digest::ZERO, 3);
        let source = Arc::new(LocalSourceChain::with_headers(headers));
        let host = Arc::new(LocalHostChain::default());
        host.force_best_known_digest(Digest::new([2u8; 32]));
        let (_tx, cancel) = cancellation();

        let mut relay = Relay::run(cancel, source, host, RelayConfig::for_testing()).unwrap();

        let err = tokio::time::timeout(WAIT, relay.err_channel().recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::DigestResolution);

        tokio::time::timeout(WAIT, relay.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_surfaces_forwarder_error() {
        let headers = build_header_chain(0, Digest::ZERO, 6);
        let source = Arc::new(LocalSourceChain::with_headers(headers.clone()));
        let host = Arc::new(LocalHostChain::with_anchor(headers[0].clone()));
        host.fail_submissions("bad proof of work");
        let (_tx, cancel) = cancellation();

        let mut relay = Relay::run(cancel, source, host, RelayConfig::for_testing()).unwrap();

        let err = tokio::time::timeout(WAIT, relay.err_channel().recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Submission);

        let forwarder_state = relay.forwarder_state.clone();
        tokio::time::timeout(WAIT, relay.join()).await.unwrap();
        assert_eq!(
            *forwarder_state.borrow(),
            ForwarderState::Stopped(StopReason::Errored)
        );
    }
}
