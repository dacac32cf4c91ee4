//! # Header Puller
//!
//! Producer side of the relay: walks the source chain forward from the host
//! chain's best-known header and feeds every new header into a sink.
//!
//! The resume point is resolved once at start. A best-known digest the source
//! chain does not know is fatal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use super::shutdown::{cancelled, is_cancelled};
use crate::config::RelayConfig;
use crate::domain::{ChainError, Header, RelayError};
use crate::ports::{HeaderSink, HostChain, SourceChain};

/// Handle to a running header puller.
pub struct HeaderPuller {
    id: Uuid,
    err_rx: mpsc::Receiver<RelayError>,
    handle: JoinHandle<()>,
}

impl HeaderPuller {
    /// Create a header puller and run its loop until `cancel` fires or an
    /// error occurs.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn run<S, H, K>(
        cancel: watch::Receiver<bool>,
        source: Arc<S>,
        host: Arc<H>,
        sink: K,
        config: RelayConfig,
    ) -> Result<Self, RelayError>
    where
        S: SourceChain + ?Sized + 'static,
        H: HostChain + ?Sized + 'static,
        K: HeaderSink + 'static,
    {
        config.validate()?;

        let id = Uuid::new_v4();
        let (err_tx, err_rx) = mpsc::channel(1);

        let puller_loop = PullerLoop {
            source,
            host,
            sink,
            poll_interval: config.source_poll_interval(),
        };

        let handle = tokio::spawn(
            async move {
                if let Err(e) = puller_loop.run(cancel).await {
                    error!("[puller] Header puller stopped: {}", e);
                    let _ = err_tx.try_send(e);
                }
            }
            .instrument(tracing::info_span!("puller", id = %id)),
        );

        Ok(Self { id, err_rx, handle })
    }

    /// Instance id, attached to every log line of the loop.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Error channel of the puller. Yields at most one error.
    pub fn err_channel(&mut self) -> &mut mpsc::Receiver<RelayError> {
        &mut self.err_rx
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

struct PullerLoop<S: ?Sized, H: ?Sized, K> {
    source: Arc<S>,
    host: Arc<H>,
    sink: K,
    poll_interval: Duration,
}

impl<S, H, K> PullerLoop<S, H, K>
where
    S: SourceChain + ?Sized,
    H: HostChain + ?Sized,
    K: HeaderSink,
{
    async fn run(self, mut cancel: watch::Receiver<bool>) -> Result<(), RelayError> {
        info!("[puller] Running header puller");

        let mut last = self.resolve_best_header().await?;
        info!(
            "[puller] Resuming from best known header ({}) [{}]",
            last.height, last.hash
        );

        loop {
            if is_cancelled(&cancel) {
                info!("[puller] Header puller cancelled");
                return Ok(());
            }

            let tip = self
                .source
                .best_height()
                .await
                .map_err(RelayError::SourcePull)?;

            if let Some(tip) = tip.filter(|tip| *tip > last.height) {
                debug!("[puller] Pulling headers ({}..={})", last.height + 1, tip);

                for height in last.height + 1..=tip {
                    let header = self.next_header(&last, height).await?;

                    tokio::select! {
                        biased;
                        _ = cancelled(&mut cancel) => {
                            info!("[puller] Header puller cancelled");
                            return Ok(());
                        }
                        result = self.sink.enqueue(header.clone()) => result?,
                    }

                    last = header;
                }
            }

            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {}
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    async fn resolve_best_header(&self) -> Result<Header, RelayError> {
        let digest = self
            .host
            .get_best_known_digest()
            .await
            .map_err(RelayError::BestBlockResolution)?;

        self.source
            .header_by_digest(&digest)
            .await
            .map_err(RelayError::BestBlockResolution)
    }

    /// Read the header at `height`, which must extend `last`.
    async fn next_header(&self, last: &Header, height: u64) -> Result<Header, RelayError> {
        let header = self
            .source
            .header_by_height(height)
            .await
            .map_err(RelayError::SourcePull)?;

        if !header.extends(last) {
            return Err(RelayError::SourcePull(ChainError::BrokenLinkage {
                height: header.height,
                expected: last.hash,
                got: header.prev_hash,
            }));
        }

        Ok(header)
    }
}
