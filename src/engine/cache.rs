//! By-id read cache.
//!
//! - Valid only between commits: cleared on commit, close and column refresh
//! - Entries are immutable once inserted
//! - Bounded: inserts are skipped once full
//! - Never consulted while a live transaction overlays reads

use std::collections::HashMap;

use crate::feature::Feature;

/// Key for cache lookups: one feature fetched with one column set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureCacheKey {
    pub feature_id: String,
    /// Fetched native columns, sorted.
    pub columns: Vec<String>,
}

impl FeatureCacheKey {
    pub fn new(feature_id: impl Into<String>, columns: &[String]) -> Self {
        let mut columns = columns.to_vec();
        columns.sort();
        Self {
            feature_id: feature_id.into(),
            columns,
        }
    }
}

/// Cache statistics for observability.
///
/// Statistics are passive; they never influence caching.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Inserts skipped because the cache was full.
    pub evictions: u64,
}

#[derive(Debug)]
pub struct FeatureCache {
    entries: HashMap<FeatureCacheKey, Feature>,
    max_entries: usize,
    stats: CacheStats,
}

impl FeatureCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_entries.min(100)),
            max_entries,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &FeatureCacheKey) -> Option<&Feature> {
        if let Some(feature) = self.entries.get(key) {
            self.stats.hits += 1;
            Some(feature)
        } else {
            self.stats.misses += 1;
            None
        }
    }

    pub fn insert(&mut self, key: FeatureCacheKey, feature: Feature) {
        if self.entries.len() >= self.max_entries {
            self.stats.evictions += 1;
            return;
        }
        self.entries.entry(key).or_insert(feature);
    }

    pub fn contains(&self, key: &FeatureCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
