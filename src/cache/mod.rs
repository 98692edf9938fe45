//! Kill-Count Cache.
//!
//! Reconciles kill counts observed in chat, reported by external count
//! stores, and incremented locally. Entries expire after an idle period and
//! the oldest idle entry is evicted once capacity is exceeded. A count never
//! moves backward through [`KillCountCache::merge_max`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;
use crate::parser::canonical_name;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    count: u32,
    last_access: Instant,
}

/// Concurrent, bounded subject -> count cache.
#[derive(Debug)]
pub struct KillCountCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl KillCountCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.capacity)
    }

    /// Current count for a subject, refreshing its idle timer.
    pub fn get(&self, subject: &str) -> Option<u32> {
        let key = canonical_name(subject);
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get_mut(&key) {
            Some(entry) if now.duration_since(entry.last_access) < self.ttl => {
                entry.last_access = now;
                Some(entry.count)
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Add one kill to a known subject.
    ///
    /// Returns the new count, or `None` when the subject has no live entry:
    /// without a ground-truth base an increment would invent a count.
    pub fn increment(&self, subject: &str) -> Option<u32> {
        let key = canonical_name(subject);
        let now = Instant::now();
        let mut entries = self.lock();

        let live = entries
            .get(&key)
            .is_some_and(|e| now.duration_since(e.last_access) < self.ttl);
        if !live {
            entries.remove(&key);
            return None;
        }

        let entry = entries.get_mut(&key)?;
        entry.count = entry.count.saturating_add(1);
        entry.last_access = now;
        Some(entry.count)
    }

    /// Record an externally observed count, keeping the larger value.
    ///
    /// Returns the stored count after the merge.
    pub fn merge_max(&self, subject: &str, observed: u32) -> u32 {
        let key = canonical_name(subject);
        let now = Instant::now();
        let mut entries = self.lock();

        let count = match entries.get_mut(&key) {
            Some(entry) if now.duration_since(entry.last_access) < self.ttl => {
                entry.count = entry.count.max(observed);
                entry.last_access = now;
                entry.count
            }
            _ => {
                entries.insert(
                    key,
                    CacheEntry {
                        count: observed,
                        last_access: now,
                    },
                );
                observed
            }
        };

        self.evict(&mut entries, now);
        count
    }

    /// Number of live entries.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|e| now.duration_since(e.last_access) < self.ttl)
            .count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(&self, entries: &mut HashMap<String, CacheEntry>, now: Instant) {
        entries.retain(|_, e| now.duration_since(e.last_access) < self.ttl);

        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    debug!(subject = %key, "Evicting kill count");
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
