//! Accessibility result cache.
//!
//! Scoring is O(cells × POIs) per category, so identical requests are
//! served from a cache keyed by a content digest of the cell set. The cache
//! is injected into the pipeline and bounded; there is no process-global
//! state.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use xxhash_rust::xxh3::Xxh3;

use crate::config::Mobility;
use crate::model::{CellId, HexCell};

/// Default number of score tables kept by [`LruAccessibilityCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

// ============================================================================
// CacheKey
// ============================================================================

/// Identifies one score table: the cell set (order-independent), the
/// mobility mode, and the fingerprints of the inputs it was scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: u64,
    mobility: Mobility,
}

impl CacheKey {
    /// Digest of the `|`-joined sorted cell ids plus input fingerprints.
    pub fn new(cells: &[CellId], mobility: Mobility, table_fingerprint: u64, poi_fingerprint: u64) -> Self {
        let mut sorted = cells.to_vec();
        sorted.sort_unstable();

        let mut hasher = Xxh3::new();
        for (i, cell) in sorted.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            hasher.update(cell.to_string().as_bytes());
        }
        hasher.update(&table_fingerprint.to_le_bytes());
        hasher.update(&poi_fingerprint.to_le_bytes());

        Self { digest: hasher.digest(), mobility }
    }

    pub fn digest(&self) -> u64 {
        self.digest
    }

    pub fn mobility(&self) -> Mobility {
        self.mobility
    }
}

// ============================================================================
// AccessibilityCache trait
// ============================================================================

/// Storage for computed score tables.
///
/// `get` must hand back an owned copy; callers mutate what they receive
/// and that must never leak into the stored entry.
pub trait AccessibilityCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Vec<HexCell>>;

    fn insert(&self, key: CacheKey, table: Vec<HexCell>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

// ============================================================================
// LruAccessibilityCache
// ============================================================================

/// Bounded least-recently-used cache.
///
/// A capacity of 0 disables caching entirely.
pub struct LruAccessibilityCache {
    capacity: usize,
    inner: Mutex<LruInner>,
}

struct LruInner {
    /// key → (last use tick, table)
    entries: HashMap<CacheKey, (u64, Vec<HexCell>)>,
    tick: u64,
}

impl LruInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

impl LruAccessibilityCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(LruInner {
                entries: HashMap::with_capacity(capacity),
                tick: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LruAccessibilityCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl AccessibilityCache for LruAccessibilityCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<HexCell>> {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        let (last_used, table) = inner.entries.get_mut(key)?;
        *last_used = tick;
        Some(table.clone())
    }

    fn insert(&self, key: CacheKey, table: Vec<HexCell>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, (last_used, _))| *last_used)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
            }
        }
        let tick = inner.next_tick();
        inner.entries.insert(key, (tick, table));
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

/// Shared handle: several pipelines may serve from one cache.
impl<C: AccessibilityCache + ?Sized> AccessibilityCache for Arc<C> {
    fn get(&self, key: &CacheKey) -> Option<Vec<HexCell>> {
        (**self).get(key)
    }

    fn insert(&self, key: CacheKey, table: Vec<HexCell>) {
        (**self).insert(key, table)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn clear(&self) {
        (**self).clear()
    }
}
