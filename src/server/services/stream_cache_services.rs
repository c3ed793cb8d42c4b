// in-process result cache with failure-triggered invalidation
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::{ContentId, ExtractionResult};

pub type DynStreamCacheService = Arc<dyn StreamCacheServiceTrait + Send + Sync>;

/// Explicit knobs instead of magic numbers so tests can run without
/// real timing.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub ttl: Duration,
    /// segment 403s on a cached entry's host before forced eviction
    pub failure_threshold: u32,
    /// above this, writes opportunistically sweep expired entries
    pub soft_capacity: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(20 * 60),
            failure_threshold: 5,
            soft_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub keys: Vec<String>,
}

#[automock]
#[async_trait]
pub trait StreamCacheServiceTrait {
    async fn get(&self, id: &ContentId) -> Option<ExtractionResult>;

    async fn put(&self, id: &ContentId, result: ExtractionResult);

    /// used by explicit cache-clear requests and client-reported playback
    /// errors; clears the entry's failure counter with it
    async fn invalidate(&self, id: &ContentId) -> bool;

    async fn invalidate_all(&self) -> usize;

    /// keyed by the failing URL's host matched against cached manifest
    /// hosts, since the segment proxy only knows the URL
    async fn record_failure(&self, failing_url: &str);

    async fn stats(&self) -> CacheStats;
}

struct CacheEntry {
    result: ExtractionResult,
    created_at: Instant,
    // folded into the entry so it is reset on write and dies with the
    // entry on eviction
    failures: u32,
}

pub struct StreamCacheService {
    entries: Mutex<HashMap<String, CacheEntry>>,
    policy: CachePolicy,
}

impl StreamCacheService {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn host_of(url: &str) -> Option<String> {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }

    fn expired(&self, entry: &CacheEntry) -> bool {
        entry.created_at.elapsed() >= self.policy.ttl
    }
}

#[async_trait]
impl StreamCacheServiceTrait for StreamCacheService {
    async fn get(&self, id: &ContentId) -> Option<ExtractionResult> {
        let key = id.to_string();
        let mut entries = self.entries.lock().unwrap();

        let entry = entries.get(&key)?;

        if self.expired(entry) {
            debug!("cache entry {} expired, evicting", key);
            entries.remove(&key);
            return None;
        }

        if entry.failures >= self.policy.failure_threshold {
            warn!(
                "cache entry {} evicted after {} segment failures",
                key, entry.failures
            );
            entries.remove(&key);
            return None;
        }

        Some(entry.result.clone())
    }

    async fn put(&self, id: &ContentId, result: ExtractionResult) {
        let key = id.to_string();
        let mut entries = self.entries.lock().unwrap();

        if entries.len() >= self.policy.soft_capacity {
            let before = entries.len();
            entries.retain(|_, e| e.created_at.elapsed() < self.policy.ttl);
            debug!("cache sweep removed {} expired entries", before - entries.len());
        }

        entries.insert(
            key,
            CacheEntry {
                result,
                created_at: Instant::now(),
                failures: 0,
            },
        );
    }

    async fn invalidate(&self, id: &ContentId) -> bool {
        let key = id.to_string();
        let removed = self.entries.lock().unwrap().remove(&key).is_some();
        if removed {
            info!("cache entry {} invalidated", key);
        }
        removed
    }

    async fn invalidate_all(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let count = entries.len();
        entries.clear();
        info!("cleared {} cache entries", count);
        count
    }

    async fn record_failure(&self, failing_url: &str) {
        let Some(host) = Self::host_of(failing_url) else {
            return;
        };

        let mut entries = self.entries.lock().unwrap();
        for (key, entry) in entries.iter_mut() {
            let manifest_host = Self::host_of(&entry.result.manifest_url);
            if manifest_host.as_deref() == Some(host.as_str()) {
                entry.failures += 1;
                debug!(
                    "segment failure on {} counted against {} (now {})",
                    host, key, entry.failures
                );
            }
        }
    }

    async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap();
        CacheStats {
            entries: entries.len(),
            keys: entries.keys().cloned().collect(),
        }
    }
}
