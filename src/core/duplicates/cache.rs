//! Bounded memo of computed identifiers.

use super::identifier::Identifier;
use super::settings::CompareBy;
use crate::core::source::SourceFile;
use crate::error::DetectError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

/// Default number of identifiers retained
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// A file is the same file while its name, size and mtime are unchanged.
/// The strategy is part of the key since one file has one identifier per
/// strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    strategy: CompareBy,
    name: String,
    size: u64,
    last_modified: SystemTime,
}

impl CacheKey {
    fn new(file: &SourceFile, strategy: CompareBy) -> Self {
        Self {
            strategy,
            name: file.name.clone(),
            size: file.byte_size,
            last_modified: file.last_modified,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
    pub hit_rate: f64,
}

#[derive(Default)]
struct Entries {
    map: HashMap<CacheKey, Identifier>,
    /// Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Identifier cache shared across detection runs.
///
/// Entries never expire on their own; once `capacity` is reached the oldest
/// entry is evicted. `clear` empties it.
pub struct HashCache {
    entries: RwLock<Entries>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HashCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached identifier or compute and store it.
    ///
    /// `compute` runs outside the lock, so two threads missing on the same
    /// key may both compute it; the first stored value wins.
    pub fn get_or_compute<F>(
        &self,
        file: &SourceFile,
        strategy: CompareBy,
        compute: F,
    ) -> Result<Identifier, DetectError>
    where
        F: FnOnce() -> Result<Identifier, DetectError>,
    {
        let key = CacheKey::new(file, strategy);

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(identifier) = entries.map.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(identifier.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let identifier = compute()?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.map.get(&key) {
            return Ok(existing.clone());
        }
        entries.map.insert(key.clone(), identifier.clone());
        entries.order.push_back(key);
        while entries.map.len() > self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.map.remove(&oldest);
                }
                None => break,
            }
        }

        Ok(identifier)
    }

    /// Hits over lookups, 0 before the first lookup
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            capacity: self.capacity,
            hit_rate: self.hit_rate(),
        }
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.map.clear();
        entries.order.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for HashCache {
    fn default() -> Self {
        Self::new()
    }
}
