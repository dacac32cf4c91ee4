//! Local Source Chain Adapter
//!
//! In-memory implementation of the `SourceChain` port.

use crate::domain::{ChainError, Digest, Header};
use crate::ports::outbound::SourceChain;
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest as _, Sha256};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Default)]
struct SourceState {
    /// Headers indexed by digest.
    by_digest: HashMap<Digest, Header>,
    /// Best-chain digest indexed by height.
    by_height: BTreeMap<u64, Digest>,
}

/// In-memory source chain.
#[derive(Default)]
pub struct LocalSourceChain {
    state: RwLock<SourceState>,
}

impl LocalSourceChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chain holding `headers`.
    pub fn with_headers(headers: Vec<Header>) -> Self {
        let chain = Self::new();
        chain.set_headers(headers);
        chain
    }

    /// Replace the chain's contents.
    pub fn set_headers(&self, headers: Vec<Header>) {
        let mut state = self.state.write();
        state.by_digest.clear();
        state.by_height.clear();
        for header in headers {
            state.by_height.insert(header.height, header.hash);
            state.by_digest.insert(header.hash, header);
        }
    }

    /// Append a header at its height, replacing any header already there.
    pub fn append_header(&self, header: Header) {
        debug!("[source] Appending header at height {}", header.height);
        let mut state = self.state.write();
        if let Some(replaced) = state.by_height.insert(header.height, header.hash) {
            state.by_digest.remove(&replaced);
        }
        state.by_digest.insert(header.hash, header);
    }

    /// Number of headers held.
    pub fn len(&self) -> usize {
        self.state.read().by_height.len()
    }

    /// Is the chain empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deterministic digest of a header at `height` extending `prev_hash`.
pub fn make_header_digest(height: u64, prev_hash: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(height.to_le_bytes());
    hasher.update(prev_hash.as_bytes());

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    Digest::new(hash)
}

/// Build `count` linked headers starting at `start_height` and extending
/// `parent`.
pub fn build_header_chain(start_height: u64, parent: Digest, count: usize) -> Vec<Header> {
    let mut headers = Vec::with_capacity(count);
    let mut prev_hash = parent;

    for height in start_height..start_height + count as u64 {
        let hash = make_header_digest(height, &prev_hash);
        headers.push(Header::new(height, hash, prev_hash));
        prev_hash = hash;
    }

    headers
}

#[async_trait]
impl SourceChain for LocalSourceChain {
    async fn header_by_digest(&self, digest: &Digest) -> Result<Header, ChainError> {
        self.state
            .read()
            .by_digest
            .get(digest)
            .cloned()
            .ok_or(ChainError::HeaderNotFound(*digest))
    }

    async fn header_by_height(&self, height: u64) -> Result<Header, ChainError> {
        let state = self.state.read();
        state
            .by_height
            .get(&height)
            .and_then(|digest| state.by_digest.get(digest))
            .cloned()
            .ok_or(ChainError::HeightNotFound(height))
    }

    async fn best_height(&self) -> Result<Option<u64>, ChainError> {
        Ok(self.state.read().by_height.keys().next_back().copied())
    }
}
