use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, OnceLock},
};

use crate::assets::decode::DecodedSurface;

/// Counters describing cache usage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Surfaces dropped to stay within the byte budget.
    pub evictions: u64,
    /// Surfaces currently retained.
    pub retained_surfaces: usize,
    /// Pixel bytes currently retained.
    pub retained_bytes: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, Arc<DecodedSurface>>,
    // insertion order, oldest first
    order: VecDeque<String>,
    stats: CacheStats,
}

/// Decoded-surface cache shared by every `CacheMode::OnLoad` request.
///
/// [`SurfaceCache::global`] is unbounded and lives as long as the process. Instances built
/// with [`SurfaceCache::with_budget`] evict the oldest inserted surfaces once the retained
/// byte count exceeds the budget.
#[derive(Debug)]
pub struct SurfaceCache {
    budget_bytes: Option<usize>,
    inner: parking_lot::Mutex<CacheInner>,
}

impl Default for SurfaceCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl SurfaceCache {
    /// Cache that never evicts.
    pub fn unbounded() -> Self {
        Self {
            budget_bytes: None,
            inner: parking_lot::Mutex::new(CacheInner::default()),
        }
    }

    /// Cache retaining at most `max_bytes` of pixel data.
    pub fn with_budget(max_bytes: usize) -> Self {
        Self {
            budget_bytes: Some(max_bytes),
            inner: parking_lot::Mutex::new(CacheInner::default()),
        }
    }

    /// Process-wide unbounded cache.
    pub fn global() -> Arc<SurfaceCache> {
        static GLOBAL: OnceLock<Arc<SurfaceCache>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(SurfaceCache::unbounded()))
            .clone()
    }

    /// Configured byte budget, if any.
    pub fn budget_bytes(&self) -> Option<usize> {
        self.budget_bytes
    }

    /// Look up a surface by normalized key.
    pub fn get(&self, key: &str) -> Option<Arc<DecodedSurface>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key).cloned() {
            Some(surface) => {
                inner.stats.hits += 1;
                Some(surface)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Retain `surface` under `key`, replacing any previous entry.
    ///
    /// A surface larger than the whole budget is not retained.
    pub fn insert(&self, key: impl Into<String>, surface: Arc<DecodedSurface>) {
        let key = key.into();
        let bytes = surface.byte_len();
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(&key) {
            inner.order.retain(|k| k != &key);
            inner.stats.retained_bytes = inner.stats.retained_bytes.saturating_sub(old.byte_len());
        }

        if self.budget_bytes.is_some_and(|budget| bytes > budget) {
            tracing::debug!(key = %key, bytes, "surface exceeds cache budget; not retained");
            inner.stats.retained_surfaces = inner.entries.len();
            return;
        }

        inner.entries.insert(key.clone(), surface);
        inner.order.push_back(key);
        inner.stats.retained_bytes += bytes;

        if let Some(budget) = self.budget_bytes {
            while inner.stats.retained_bytes > budget {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                if let Some(evicted) = inner.entries.remove(&oldest) {
                    inner.stats.retained_bytes =
                        inner.stats.retained_bytes.saturating_sub(evicted.byte_len());
                    inner.stats.evictions += 1;
                    tracing::debug!(key = %oldest, "evicted cached surface");
                }
            }
        }
        inner.stats.retained_surfaces = inner.entries.len();
    }

    /// Whether `key` is currently retained. Does not touch hit/miss counters.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    /// Drop every retained surface.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.stats.retained_bytes = 0;
        inner.stats.retained_surfaces = 0;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
