//! Short-lived cache of search candidates.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{CandidateError, CandidateKey, DownloadCandidate};
use crate::metrics::CANDIDATE_CACHE_LOOKUPS;

/// Default time a candidate stays valid after a search.
pub const DEFAULT_CANDIDATE_TTL: Duration = Duration::from_secs(300);

struct CachedCandidate {
    candidate: DownloadCandidate,
    expires_at: Instant,
}

/// TTL cache keyed by `(indexer_id, guid)`.
///
/// Expired entries are dropped when looked up and by [`CandidateCache::sweep`].
pub struct CandidateCache {
    ttl: Duration,
    entries: RwLock<HashMap<CandidateKey, CachedCandidate>>,
}

impl CandidateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or refresh a candidate.
    pub fn insert(&self, candidate: DownloadCandidate) -> Result<(), CandidateError> {
        let mut entries = self.entries.write().map_err(|_| CandidateError::CachePoisoned)?;
        entries.insert(
            candidate.key(),
            CachedCandidate {
                candidate,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    /// Fetch a live candidate. An expired entry is removed and reported as expired.
    pub fn get(&self, key: &CandidateKey) -> Result<DownloadCandidate, CandidateError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().map_err(|_| CandidateError::CachePoisoned)?;
            match entries.get(key) {
                None => {
                    CANDIDATE_CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
                    return Err(CandidateError::NotFound(key.to_string()));
                }
                Some(entry) if now < entry.expires_at => {
                    CANDIDATE_CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                    return Ok(entry.candidate.clone());
                }
                Some(_) => {}
            }
        }

        CANDIDATE_CACHE_LOOKUPS.with_label_values(&["expired"]).inc();
        let mut entries = self.entries.write().map_err(|_| CandidateError::CachePoisoned)?;
        entries.remove(key);
        Err(CandidateError::Expired(key.to_string()))
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> Result<usize, CandidateError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| CandidateError::CachePoisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Swept expired candidates");
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CandidateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATE_TTL)
    }
}
