//! Registration metadata caching with TTL support

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::api::RegistrationIndex;

/// Default lifetime of a cached registration index
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Registration index with every page inlined
    pub index: Arc<RegistrationIndex>,
    /// When the entry was stored
    pub stored_at: SystemTime,
    /// Time-to-live duration
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create new cache entry with the default TTL
    pub fn new(index: RegistrationIndex) -> Self {
        Self::with_ttl(index, DEFAULT_TTL)
    }

    /// Create cache entry with custom TTL
    pub fn with_ttl(index: RegistrationIndex, ttl: Duration) -> Self {
        Self {
            index: Arc::new(index),
            stored_at: SystemTime::now(),
            ttl,
        }
    }

    /// Check if cache entry is still fresh
    pub fn is_fresh(&self) -> bool {
        match self.stored_at.elapsed() {
            Ok(elapsed) => elapsed < self.ttl,
            Err(_) => false, // Clock went backwards, consider stale
        }
    }

    /// Get age of cache entry
    pub fn age(&self) -> Option<Duration> {
        self.stored_at.elapsed().ok()
    }
}

/// In-memory registration cache keyed by lowercase package id
#[derive(Debug, Default)]
pub struct MetadataCache {
    cache: DashMap<String, CacheEntry>,
}

impl MetadataCache {
    /// Create new metadata cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get cached registration if fresh
    pub fn get(&self, id: &str) -> Option<Arc<RegistrationIndex>> {
        let key = id.to_ascii_lowercase();
        let fresh = {
            let entry = self.cache.get(&key)?;
            entry.is_fresh().then(|| Arc::clone(&entry.index))
        };

        if fresh.is_none() {
            // Remove stale entry
            self.cache.remove(&key);
        }
        fresh
    }

    /// Store a registration with the default TTL
    pub fn insert(&self, id: &str, index: RegistrationIndex) -> Arc<RegistrationIndex> {
        self.insert_entry(id, CacheEntry::new(index))
    }

    /// Store a registration with a custom TTL
    pub fn insert_with_ttl(&self, id: &str, index: RegistrationIndex, ttl: Duration) -> Arc<RegistrationIndex> {
        self.insert_entry(id, CacheEntry::with_ttl(index, ttl))
    }

    fn insert_entry(&self, id: &str, entry: CacheEntry) -> Arc<RegistrationIndex> {
        let index = Arc::clone(&entry.index);
        self.cache.insert(id.to_ascii_lowercase(), entry);
        index
    }

    /// Check if an id is cached and fresh
    pub fn contains_fresh(&self, id: &str) -> bool {
        self.cache
            .get(&id.to_ascii_lowercase())
            .map(|entry| entry.is_fresh())
            .unwrap_or(false)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut fresh_entries = 0;
        let mut stale_entries = 0;

        for entry in self.cache.iter() {
            if entry.is_fresh() {
                fresh_entries += 1;
            } else {
                stale_entries += 1;
            }
        }

        CacheStats {
            total_entries: self.cache.len(),
            fresh_entries,
            stale_entries,
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Remove stale entries
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        self.cache.retain(|_, entry| {
            if entry.is_fresh() {
                true
            } else {
                removed += 1;
                false
            }
        });
        removed
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Number of fresh entries
    pub fresh_entries: usize,
    /// Number of stale entries
    pub stale_entries: usize,
}

#[cfg(test)]
mod tests;
