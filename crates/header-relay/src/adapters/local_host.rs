//! Local Host Chain Adapter
//!
//! In-memory implementation of the `HostChain` port. Validates submissions
//! the way a relay contract would: anchor known, headers linked, epoch
//! context matching the submitted heights.

use crate::domain::{
    invariant_linked_batch, ChainError, Digest, EpochContext, Header, DIFFICULTY_EPOCH_DURATION,
};
use crate::ports::outbound::HostChain;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A submission accepted by the local host chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedSubmission {
    /// Submitted headers.
    pub headers: Vec<Header>,
    /// Epoch context sent with them.
    pub context: EpochContext,
}

#[derive(Default)]
struct HostState {
    known: HashMap<Digest, Header>,
    best: Option<Digest>,
    submissions: Vec<RecordedSubmission>,
    best_updates: Vec<Digest>,
    failure: Option<String>,
}

/// In-memory host chain.
pub struct LocalHostChain {
    epoch_length: u64,
    state: RwLock<HostState>,
}

impl Default for LocalHostChain {
    fn default() -> Self {
        Self::new(DIFFICULTY_EPOCH_DURATION)
    }
}

impl LocalHostChain {
    /// Create an empty host chain validating against `epoch_length`.
    pub fn new(epoch_length: u64) -> Self {
        Self {
            epoch_length,
            state: RwLock::new(HostState::default()),
        }
    }

    /// Create a host chain that knows `anchor` and treats it as its tip.
    pub fn with_anchor(anchor: Header) -> Self {
        let chain = Self::default();
        chain.insert_header(anchor.clone());
        chain.state.write().best = Some(anchor.hash);
        chain
    }

    /// Make a header known without going through submission.
    pub fn insert_header(&self, header: Header) {
        self.state.write().known.insert(header.hash, header);
    }

    /// Overwrite the best-known digest, known or not.
    pub fn force_best_known_digest(&self, digest: Digest) {
        self.state.write().best = Some(digest);
    }

    /// Reject every following submission with `reason`.
    pub fn fail_submissions(&self, reason: impl Into<String>) {
        self.state.write().failure = Some(reason.into());
    }

    /// Accepted submissions, in order.
    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.state.read().submissions.clone()
    }

    /// All headers accepted so far, in submission order.
    pub fn submitted_headers(&self) -> Vec<Header> {
        self.state
            .read()
            .submissions
            .iter()
            .flat_map(|s| s.headers.iter().cloned())
            .collect()
    }

    /// Best-known digest updates, in order.
    pub fn best_updates(&self) -> Vec<Digest> {
        self.state.read().best_updates.clone()
    }

    fn validate_submission(
        &self,
        state: &HostState,
        headers: &[Header],
        context: EpochContext,
    ) -> Result<(), ChainError> {
        let (Some(first), Some(last)) = (headers.first(), headers.last()) else {
            return Err(ChainError::Unavailable("empty submission".into()));
        };

        let rejected = |reason: String| ChainError::Rejected {
            first: first.height,
            last: last.height,
            reason,
        };

        if let Some(reason) = &state.failure {
            return Err(rejected(reason.clone()));
        }

        let anchor = state
            .known
            .get(&first.prev_hash)
            .ok_or(ChainError::AnchorNotFound {
                anchor: first.prev_hash,
                height: first.height,
            })?;

        if !first.extends(anchor) {
            return Err(ChainError::HeightGap {
                expected: anchor.height.saturating_add(1),
                got: first.height,
            });
        }

        invariant_linked_batch(headers)?;

        if context != EpochContext::for_height(first.height, self.epoch_length) {
            return Err(rejected(format!(
                "epoch context mismatch: got epoch {} (retarget: {})",
                context.epoch, context.retarget
            )));
        }

        if !context.contains(last.height, self.epoch_length) {
            return Err(rejected(format!(
                "submission crosses the end of epoch {}",
                context.epoch
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl HostChain for LocalHostChain {
    async fn get_best_known_digest(&self) -> Result<Digest, ChainError> {
        self.state
            .read()
            .best
            .ok_or_else(|| ChainError::Unavailable("no best known digest".into()))
    }

    async fn submit_headers(
        &self,
        headers: &[Header],
        context: EpochContext,
    ) -> Result<(), ChainError> {
        let mut state = self.state.write();

        if let Err(e) = self.validate_submission(&state, headers, context) {
            let e = ChainError::add_headers(e);
            warn!("[host] Rejecting submission: {}", e);
            return Err(e);
        }

        debug!(
            "[host] Accepted {} header(s) in epoch {}",
            headers.len(),
            context.epoch
        );

        for header in headers {
            state.known.insert(header.hash, header.clone());
        }
        state.submissions.push(RecordedSubmission {
            headers: headers.to_vec(),
            context,
        });

        Ok(())
    }

    async fn set_best_known_digest(&self, digest: Digest) -> Result<(), ChainError> {
        let mut state = self.state.write();

        if !state.known.contains_key(&digest) {
            return Err(ChainError::HeaderNotFound(digest));
        }

        info!("[host] Best known digest is now {}", digest);
        state.best = Some(digest);
        state.best_updates.push(digest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::build_header_chain;

    fn chain_with_anchor(height: u64) -> (LocalHostChain, Vec<Header>) {
        let mut headers = build_header_chain(height, Digest::ZERO, 6);
        let anchor = headers.remove(0);
        (LocalHostChain::with_anchor(anchor), headers)
    }

    #[tokio::test]
    async fn test_submit_linked_headers() {
        let (host, headers) = chain_with_anchor(100);
        let ctx = EpochContext::for_height(101, DIFFICULTY_EPOCH_DURATION);

        host.submit_headers(&headers, ctx).await.unwrap();

        assert_eq!(host.submissions().len(), 1);
        assert_eq!(host.submitted_headers(), headers);
    }

    #[tokio::test]
    async fn test_missing_anchor() {
        let host = LocalHostChain::default();
        let headers = build_header_chain(1, Digest::ZERO, 5);
        let ctx = EpochContext::for_height(1, DIFFICULTY_EPOCH_DURATION);

        let err = host.submit_headers(&headers, ctx).await.unwrap_err();
        assert_eq!(
            err.root(),
            &ChainError::AnchorNotFound {
                anchor: Digest::ZERO,
                height: 1
            }
        );
        assert!(err.to_string().starts_with(
            "could not add headers: [could not get anchor header by digest: "
        ));
        assert!(host.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_epoch_context_rejected() {
        let (host, headers) = chain_with_anchor(100);
        let ctx = EpochContext::for_height(0, DIFFICULTY_EPOCH_DURATION);

        let err = host.submit_headers(&headers, ctx).await.unwrap_err();
        assert!(matches!(err.root(), ChainError::Rejected { first: 101, last: 105, .. }));
    }

    #[tokio::test]
    async fn test_epoch_crossing_submission_rejected() {
        let (host, headers) = chain_with_anchor(2012);
        let ctx = EpochContext::for_height(2013, DIFFICULTY_EPOCH_DURATION);

        let err = host.submit_headers(&headers, ctx).await.unwrap_err();
        assert!(err.to_string().contains("crosses the end of epoch 0"));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let (host, headers) = chain_with_anchor(100);
        host.fail_submissions("difficulty mismatch");
        let ctx = EpochContext::for_height(101, DIFFICULTY_EPOCH_DURATION);

        let err = host.submit_headers(&headers, ctx).await.unwrap_err();
        assert!(err.to_string().contains("difficulty mismatch"));
    }

    #[tokio::test]
    async fn test_best_known_digest() {
        let (host, headers) = chain_with_anchor(100);
        let ctx = EpochContext::for_height(101, DIFFICULTY_EPOCH_DURATION);

        assert!(host.set_best_known_digest(headers[4].hash).await.is_err());

        host.submit_headers(&headers, ctx).await.unwrap();
        host.set_best_known_digest(headers[4].hash).await.unwrap();

        assert_eq!(host.get_best_known_digest().await, Ok(headers[4].hash));
        assert_eq!(host.best_updates(), vec![headers[4].hash]);
    }

    #[tokio::test]
    async fn test_empty_host_has_no_best_digest() {
        let host = LocalHostChain::default();
        assert!(matches!(
            host.get_best_known_digest().await,
            Err(ChainError::Unavailable(_))
        ));
    }
}
