use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;
use tracing::debug;

use crate::paper::ResearchPaper;

/// Cached outcome of one search, cloned out on every hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSearch {
    pub papers: Vec<ResearchPaper>,
    /// Formatted citation snippets, empty until a citation pass runs
    pub citations: Vec<String>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    papers: Vec<ResearchPaper>,
    citations: Vec<String>,
    timestamp: SystemTime,
    ttl: Duration,
}

impl CacheEntry {
    fn new(papers: Vec<ResearchPaper>, citations: Vec<String>, ttl: Duration) -> Self {
        Self {
            papers,
            citations,
            timestamp: SystemTime::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.timestamp.elapsed().unwrap_or(Duration::MAX) > self.ttl
    }
}

/// In-memory TTL cache for completed searches.
///
/// Expiry is checked on read; `put` always overwrites. There is no
/// capacity bound, only the cleanup sweep on writes, which is fine for a
/// cache scoped to one interactive session.
#[derive(Clone)]
pub struct SearchCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl SearchCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Look up a fresh entry; an expired one is treated as absent.
    pub async fn get(&self, key: &str) -> Option<CachedSearch> {
        let entries = self.entries.read().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired() {
                return Some(CachedSearch {
                    papers: entry.papers.clone(),
                    citations: entry.citations.clone(),
                });
            }
        }
        None
    }

    /// Store a completed search, overwriting any previous entry for the key.
    pub async fn put(&self, key: &str, papers: Vec<ResearchPaper>, citations: Vec<String>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry::new(papers, citations, self.ttl),
        );
        entries.retain(|_, entry| !entry.is_expired());
        debug!(size = entries.len(), "cached search result");
    }

    /// Attach citations to the entry for `key`, if it is still fresh.
    /// The entry keeps its original timestamp; citations do not extend
    /// its lifetime.
    pub async fn update_citations(&self, key: &str, citations: &[String]) {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.citations = citations.to_vec();
            }
            _ => {
                debug!("no fresh cache entry to attach citations to");
            }
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        debug!("search cache cleared");
    }

    /// (total, expired) entry counts
    pub async fn stats(&self) -> (usize, usize) {
        let entries = self.entries.read().await;
        let total = entries.len();
        let expired = entries.values().filter(|entry| entry.is_expired()).count();
        (total, expired)
    }
}
