//! # Forwarder
//!
//! Takes headers from the headers queue and forwards them to the host chain.
//!
//! ## Loop
//!
//! ```text
//! ┌──────────────► pull (batch of up to `batch_size`, idle timeout)
//! │                  │ empty → re-check cancellation
//! │                  ▼
//! │                push (epoch split, submit, advance best digest)
//! │                  │ error → err channel, Stopped(Errored)
//! │                  ▼
//! └───────────────  rest (`rest_interval`, interruptible)
//! ```
//!
//! All loop state lives in one task. Cancellation is checked at the top of
//! every iteration and raced against every wait; an in-flight host chain call
//! always runs to completion.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::queue::{header_queue, HeaderQueue, QueueReceiver};
use super::shutdown::{cancelled, is_cancelled};
use crate::algorithms::{classify_batch, plan_submissions};
use crate::config::RelayConfig;
use crate::domain::{
    invariant_linked_batch, ChainError, ForwarderState, Header, RelayError, StopReason,
};
use crate::ports::{HostChain, SourceChain};

/// Handle to a running forwarder.
///
/// The forwarder starts on creation and cannot be restarted once stopped;
/// create a new one instead.
pub struct Forwarder {
    id: Uuid,
    queue: HeaderQueue,
    /// Keeps unconsumed headers alive for as long as the handle exists.
    _receiver: QueueReceiver,
    err_rx: mpsc::Receiver<RelayError>,
    state_rx: watch::Receiver<ForwarderState>,
}

impl Forwarder {
    /// Create a forwarder and run its processing loop.
    ///
    /// The loop's lifecycle is governed by `cancel`. The source chain is
    /// only read to diagnose linkage failures reported by the host chain.
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
        let (queue, receiver) = header_queue(config.queue_capacity);
        let (err_tx, err_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(ForwarderState::Running);

        let forwarder_loop = ForwarderLoop {
            config,
            source,
            host,
            processed_headers: 0,
            queue_closed: false,
        };

        let loop_receiver = receiver.clone();
        tokio::spawn(
            async move {
                let reason = forwarder_loop.run(loop_receiver, cancel, err_tx).await;
                state_tx.send_replace(ForwarderState::Stopped(reason));
            }
            .instrument(tracing::info_span!("forwarder", id = %id)),
        );

        Ok(Self {
            id,
            queue,
            _receiver: receiver,
            err_rx,
            state_rx,
        })
    }

    /// Instance id, attached to every log line of the loop.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Producer handle of the headers queue.
    pub fn queue(&self) -> HeaderQueue {
        self.queue.clone()
    }

    /// Error channel of the forwarder. Yields at most one error; once it
    /// does, the loop has terminated.
    pub fn err_channel(&mut self) -> &mut mpsc::Receiver<RelayError> {
        &mut self.err_rx
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ForwarderState {
        *self.state_rx.borrow()
    }

    /// Wait until the loop has stopped.
    pub async fn stopped(&self) -> StopReason {
        let mut state_rx = self.state_rx.clone();
        let state = state_rx.wait_for(ForwarderState::is_stopped).await.map(|s| *s);
        match state {
            Ok(ForwarderState::Stopped(reason)) => reason,
            // The loop task went away without reporting, e.g. a panic.
            _ => StopReason::Errored,
        }
    }

    pub(crate) fn state_watch(&self) -> watch::Receiver<ForwarderState> {
        self.state_rx.clone()
    }
}

/// The forwarder's processing loop and its private state.
struct ForwarderLoop<S: ?Sized, H: ?Sized> {
    config: RelayConfig,
    source: Arc<S>,
    host: Arc<H>,
    /// Headers pushed since the last best-known digest update.
    processed_headers: usize,
    /// Every producer handle is gone; no header will ever arrive again.
    queue_closed: bool,
}

impl<S, H> ForwarderLoop<S, H>
where
    S: SourceChain + ?Sized,
    H: HostChain + ?Sized,
{
    async fn run(
        mut self,
        receiver: QueueReceiver,
        mut cancel: watch::Receiver<bool>,
        err_tx: mpsc::Sender<RelayError>,
    ) -> StopReason {
        info!("[forwarder] Running forwarder");

        let mut receiver = receiver.lock().await;

        loop {
            if is_cancelled(&cancel) {
                info!("[forwarder] Forwarder cancelled");
                return StopReason::Cancelled;
            }

            debug!("[forwarder] Pulling new headers from queue");
            let headers = self.pull_headers(&mut receiver, &mut cancel).await;

            if is_cancelled(&cancel) {
                if !headers.is_empty() {
                    info!(
                        "[forwarder] Cancelled with {} pulled header(s) not pushed",
                        headers.len()
                    );
                }
                info!("[forwarder] Forwarder cancelled");
                return StopReason::Cancelled;
            }

            if !headers.is_empty() {
                info!("[forwarder] Pushing [{}] header(s) to host chain", headers.len());

                if let Err(e) = self.push_headers(&headers).await {
                    error!("[forwarder] Forwarder stopped: {}", e);
                    // Capacity 1 and written once, so this never fails.
                    let _ = err_tx.try_send(e);
                    return StopReason::Errored;
                }

                info!(
                    "[forwarder] Suspending forwarder for [{:?}]",
                    self.config.rest_interval()
                );

                tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => {}
                    _ = sleep(self.config.rest_interval()) => {}
                }
            }

            if self.queue_closed {
                info!("[forwarder] Headers queue closed");
                return StopReason::Cancelled;
            }
        }
    }

    /// Wait until `batch_size` headers are pulled, the queue yields nothing
    /// for `idle_timeout` after the last header, or cancellation fires.
    ///
    /// An idle queue with nothing pulled yet keeps waiting. Everything taken
    /// off the queue is returned.
    async fn pull_headers(
        &mut self,
        receiver: &mut mpsc::Receiver<Header>,
        cancel: &mut watch::Receiver<bool>,
    ) -> Vec<Header> {
        let batch_size = self.config.batch_size;
        let idle_timeout = self.config.idle_timeout();
        let mut headers = Vec::with_capacity(batch_size);

        let header_timer = sleep(idle_timeout);
        tokio::pin!(header_timer);

        while headers.len() < batch_size {
            debug!("[forwarder] Waiting for new header to appear on queue");

            tokio::select! {
                biased;
                _ = cancelled(cancel) => return headers,
                header = receiver.recv() => match header {
                    Some(header) => {
                        debug!("[forwarder] Got header ({}) from queue", header.height);
                        headers.push(header);
                        header_timer.as_mut().reset(Instant::now() + idle_timeout);
                    }
                    None => {
                        self.queue_closed = true;
                        return headers;
                    }
                },
                _ = &mut header_timer => {
                    if !headers.is_empty() {
                        debug!(
                            "[forwarder] New header did not appear in the given timeout; \
                             returning headers pulled so far"
                        );
                        return headers;
                    }

                    debug!(
                        "[forwarder] New header did not appear in the given timeout; \
                         resetting timer as no headers have been pulled so far"
                    );
                    header_timer.as_mut().reset(Instant::now() + idle_timeout);
                }
            }
        }

        headers
    }

    /// Submit a batch to the host chain, split at the difficulty epoch
    /// boundary, and advance the best-known digest every `batch_size`
    /// processed headers.
    async fn push_headers(&mut self, headers: &[Header]) -> Result<(), RelayError> {
        invariant_linked_batch(headers).map_err(RelayError::Push)?;

        let epoch_length = self.config.epoch_length;
        let Some(class) = classify_batch(headers, epoch_length) else {
            return Ok(());
        };

        let submissions = plan_submissions(headers, epoch_length);
        info!(
            "[forwarder] Batch {}..={} is {}; submitting in {} part(s)",
            headers[0].height,
            headers[headers.len() - 1].height,
            class,
            submissions.len()
        );

        for submission in submissions {
            debug!(
                "[forwarder] Submitting {} header(s) in epoch {} (retarget: {})",
                submission.headers.len(),
                submission.context.epoch,
                submission.context.retarget
            );

            if let Err(e) = self
                .host
                .submit_headers(submission.headers, submission.context)
                .await
            {
                self.diagnose_rejection(&e).await;
                return Err(RelayError::Push(e));
            }
        }

        self.processed_headers += headers.len();
        if self.processed_headers >= self.config.batch_size {
            let new_best_header = &headers[headers.len() - 1];
            self.update_best_header(new_best_header).await?;
            self.processed_headers = 0;
        }

        Ok(())
    }

    async fn update_best_header(&self, header: &Header) -> Result<(), RelayError> {
        info!(
            "[forwarder] Updating best known digest to header ({}) [{}]",
            header.height, header.hash
        );
        self.host
            .set_best_known_digest(header.hash)
            .await
            .map_err(RelayError::BestDigestUpdate)
    }

    /// Log whether a missing anchor is a host/source divergence or a gap in
    /// the queue feed.
    async fn diagnose_rejection(&self, err: &ChainError) {
        let ChainError::AnchorNotFound { anchor, height } = err.root() else {
            return;
        };

        match self.source.header_by_digest(anchor).await {
            Ok(known) => warn!(
                "[forwarder] Anchor [{}] is header ({}) on the source chain but unknown \
                 to the host chain; the chains diverged before height {}",
                anchor, known.height, height
            ),
            Err(_) => warn!(
                "[forwarder] Anchor [{}] of height {} is unknown to the source chain too; \
                 the queue feed is out of order or incomplete",
                anchor, height
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{build_header_chain, LocalHostChain, LocalSourceChain};
    use crate::application::shutdown::cancellation;
    use crate::domain::{Digest, ErrorKind};
    use std::time::Duration;

    fn test_loop(
        host: Arc<LocalHostChain>,
    ) -> ForwarderLoop<LocalSourceChain, LocalHostChain> {
        ForwarderLoop {
            config: RelayConfig::for_testing(),
            source: Arc::new(LocalSourceChain::new()),
            host,
            processed_headers: 0,
            queue_closed: false,
        }
    }

    /// Host chain knowing the first header of a chain of `len` headers from
    /// `start`; returns the remaining headers.
    fn anchored(start: u64, len: usize) -> (Arc<LocalHostChain>, Vec<Header>) {
        let mut headers = build_header_chain(start, Digest::ZERO, len);
        let anchor = headers.remove(0);
        (Arc::new(LocalHostChain::with_anchor(anchor)), headers)
    }

    #[tokio::test]
    async fn test_pull_full_batch() {
        let (_tx, mut cancel) = cancellation();
        let (queue, receiver) = header_queue(50);
        let headers = build_header_chain(1, Digest::ZERO, 7);
        for header in &headers {
            queue.enqueue(header.clone()).await.unwrap();
        }

        let mut forwarder_loop = test_loop(Arc::new(LocalHostChain::default()));
        let mut rx = receiver.lock().await;
        let batch = forwarder_loop.pull_headers(&mut rx, &mut cancel).await;

        assert_eq!(batch, headers[..5].to_vec());
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_pull_partial_batch_after_idle() {
        let (_tx, mut cancel) = cancellation();
        let (queue, receiver) = header_queue(50);
        let headers = build_header_chain(1, Digest::ZERO, 2);
        for header in &headers {
            queue.enqueue(header.clone()).await.unwrap();
        }

        let mut forwarder_loop = test_loop(Arc::new(LocalHostChain::default()));
        let mut rx = receiver.lock().await;
        let started = Instant::now();
        let batch = forwarder_loop.pull_headers(&mut rx, &mut cancel).await;

        assert_eq!(batch, headers);
        assert!(started.elapsed() >= RelayConfig::for_testing().idle_timeout());
    }

    #[tokio::test]
    async fn test_pull_keeps_waiting_on_empty_queue() {
        let (_tx, mut cancel) = cancellation();
        let (_queue, receiver) = header_queue(50);

        let mut forwarder_loop = test_loop(Arc::new(LocalHostChain::default()));
        let mut rx = receiver.lock().await;
        let idle = RelayConfig::for_testing().idle_timeout();
        let result = tokio::time::timeout(
            idle * 3,
            forwarder_loop.pull_headers(&mut rx, &mut cancel),
        )
        .await;

        assert!(result.is_err(), "empty pull must not return on idle timeout");
    }

    #[tokio::test]
    async fn test_pull_returns_on_cancellation() {
        let (tx, mut cancel) = cancellation();
        let (queue, receiver) = header_queue(50);
        let header = build_header_chain(1, Digest::ZERO, 1).remove(0);
        queue.enqueue(header.clone()).await.unwrap();

        let mut forwarder_loop = test_loop(Arc::new(LocalHostChain::default()));
        let mut rx = receiver.lock().await;

        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        });

        let config = RelayConfig {
            idle_timeout_ms: 10_000,
            ..RelayConfig::for_testing()
        };
        forwarder_loop.config = config;
        let batch = tokio::time::timeout(
            Duration::from_secs(2),
            forwarder_loop.pull_headers(&mut rx, &mut cancel),
        )
        .await
        .unwrap();

        assert_eq!(batch, vec![header]);
    }

    #[tokio::test]
    async fn test_push_single_epoch() {
        let (host, headers) = anchored(100, 6);
        let mut forwarder_loop = test_loop(Arc::clone(&host));

        forwarder_loop.push_headers(&headers).await.unwrap();

        let submissions = host.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].headers, headers);
    }

    #[tokio::test]
    async fn test_push_spanning_batch_is_split() {
        let (host, headers) = anchored(2013, 6);
        let mut forwarder_loop = test_loop(Arc::clone(&host));

        forwarder_loop.push_headers(&headers).await.unwrap();

        let submissions = host.submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].headers.last().unwrap().height, 2015);
        assert_eq!(submissions[1].headers.first().unwrap().height, 2016);
        assert!(submissions[1].context.retarget);
    }

    #[tokio::test]
    async fn test_push_boundary_first() {
        let (host, headers) = anchored(2015, 6);
        let mut forwarder_loop = test_loop(Arc::clone(&host));

        forwarder_loop.push_headers(&headers).await.unwrap();

        let submissions = host.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].headers[0].height, 2016);
        assert!(submissions[0].context.retarget);
    }

    #[tokio::test]
    async fn test_best_digest_advances_after_threshold() {
        let (host, headers) = anchored(1, 6);
        let mut forwarder_loop = test_loop(Arc::clone(&host));

        forwarder_loop.push_headers(&headers[..2]).await.unwrap();
        assert_eq!(forwarder_loop.processed_headers, 2);
        assert!(host.best_updates().is_empty());

        forwarder_loop.push_headers(&headers[2..]).await.unwrap();
        assert_eq!(forwarder_loop.processed_headers, 0);
        assert_eq!(host.best_updates(), vec![headers[4].hash]);
    }

    #[tokio::test]
    async fn test_push_missing_anchor_is_linkage_error() {
        let host = Arc::new(LocalHostChain::default());
        let headers = build_header_chain(1, Digest::ZERO, 5);
        let mut forwarder_loop = test_loop(Arc::clone(&host));

        let err = forwarder_loop.push_headers(&headers).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Linkage);
        assert_eq!(
            err.to_string(),
            format!(
                "could not push headers: [could not add headers: \
                 [could not get anchor header by digest: \
                 [no header with digest [{}]]]]",
                "00".repeat(32)
            )
        );
        assert_eq!(forwarder_loop.processed_headers, 0);
    }

    #[tokio::test]
    async fn test_push_unlinked_batch_makes_no_host_call() {
        let (host, mut headers) = anchored(1, 6);
        headers.swap(1, 2);
        let mut forwarder_loop = test_loop(Arc::clone(&host));

        let err = forwarder_loop.push_headers(&headers).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Linkage);
        assert!(host.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_push_rejected_submission() {
        let (host, headers) = anchored(1, 6);
        host.fail_submissions("proof of work below target");
        let mut forwarder_loop = test_loop(Arc::clone(&host));

        let err = forwarder_loop.push_headers(&headers).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Submission);
        assert!(host.best_updates().is_empty());
    }

    #[tokio::test]
    async fn test_forwarder_stops_on_cancel() {
        let (tx, cancel) = cancellation();
        let forwarder = Forwarder::run(
            cancel,
            Arc::new(LocalSourceChain::new()),
            Arc::new(LocalHostChain::default()),
            RelayConfig::for_testing(),
        )
        .unwrap();
        assert_eq!(forwarder.state(), ForwarderState::Running);

        tx.send(true).unwrap();
        let reason = tokio::time::timeout(Duration::from_secs(2), forwarder.stopped())
            .await
            .unwrap();

        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(forwarder.state(), ForwarderState::Stopped(StopReason::Cancelled));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (_tx, cancel) = cancellation();
        let config = RelayConfig {
            batch_size: 0,
            ..RelayConfig::for_testing()
        };
        let result = Forwarder::run(
            cancel,
            Arc::new(LocalSourceChain::new()),
            Arc::new(LocalHostChain::default()),
            config,
        );
        assert!(matches!(result, Err(RelayError::InvalidConfig(_))));
    }
}
