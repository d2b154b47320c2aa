use super::domain::{CacheKey, RankedEntry};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A computed ranking shared between the cache and its readers.
pub type SharedRanking = Arc<[RankedEntry]>;

/// Memoizes rankings by normalized filter signature.
pub trait RankingCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<SharedRanking>;
    fn put(&self, key: CacheKey, ranking: SharedRanking);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-memory cache evicting the least recently used ranking.
#[derive(Debug)]
pub struct LruRankingCache {
    entries: Mutex<LruCache<CacheKey, SharedRanking>>,
}

impl LruRankingCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, SharedRanking>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RankingCache for LruRankingCache {
    fn get(&self, key: &CacheKey) -> Option<SharedRanking> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: CacheKey, ranking: SharedRanking) {
        if let Some((evicted, _)) = self.lock().push(key.clone(), ranking) {
            if evicted != key {
                tracing::debug!(key = %evicted, "evicted least recently used ranking");
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
