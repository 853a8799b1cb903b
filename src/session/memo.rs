//! LRU memo of fetched users, keyed by identity key.
//!
//! Lets the session serve the last known record immediately when an identity
//! that was already fetched in this process becomes current again.

use crate::session::profile::ApplicationUser;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default memo capacity.
const DEFAULT_MEMO_CAPACITY: usize = 16;

/// LRU memo of fetched users.
#[derive(Clone)]
pub struct ProfileMemo {
    inner: Arc<Mutex<LruCache<String, ApplicationUser>>>,
    stats: Arc<Mutex<MemoStats>>,
}

/// Memo statistics for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoStats {
    /// Number of lookups that found a record.
    pub hits: u64,
    /// Number of lookups that found nothing.
    pub misses: u64,
    /// Number of records stored.
    pub additions: u64,
}

impl MemoStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl ProfileMemo {
    /// Create a memo with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMO_CAPACITY)
    }

    /// Create a memo holding at most `capacity` records (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(MemoStats::default())),
        }
    }

    /// Look up the record memoized for `key`.
    pub fn get(&self, key: &str) -> Option<ApplicationUser> {
        let found = self.inner.lock().get(key).cloned();

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        found
    }

    /// Memoize `user` under `key`, replacing any previous record.
    pub fn insert(&self, key: String, user: ApplicationUser) {
        self.inner.lock().put(key, user);
        self.stats.lock().additions += 1;
    }

    /// Get current memo statistics.
    #[must_use]
    pub fn stats(&self) -> MemoStats {
        self.stats.lock().clone()
    }

    /// Get the current number of memoized records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the memo is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every memoized record.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Default for ProfileMemo {
    fn default() -> Self {
        Self::new()
    }
}
