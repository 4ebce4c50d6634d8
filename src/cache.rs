//! Thread-local caching of freed slots
//!
//! Each thread that touches a pool gets its own unsynchronized cache,
//! bound to one arena. Allocation pops the cache before the arena is
//! consulted; release pushes into it until the per-class bound is hit.
//! Bins are LIFO so the most recently touched memory is handed out
//! first. A cache is flushed back to the arenas when its thread ends or
//! when the pool trims it explicitly.

use crate::pool::PoolInner;
use crate::slot::SlotRef;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

thread_local! {
    /// Caches of the calling thread, keyed by pool id. Dropping the map
    /// at thread exit returns every cached slot to its owning arena.
    static CACHES: RefCell<HashMap<u64, ThreadCache>> = RefCell::new(HashMap::new());
}

/// Run `f` with the calling thread's cache for `pool`, creating the
/// cache on first use.
pub(crate) fn with_thread_cache<R>(
    pool: &Arc<PoolInner>,
    f: impl FnOnce(&mut ThreadCache) -> R,
) -> R {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        let cache = caches
            .entry(pool.id)
            .or_insert_with(|| ThreadCache::new(Arc::clone(pool)));
        f(cache)
    })
}

/// Drop the calling thread's cache for the pool, returning its slots to
/// the arenas. The cache is rebuilt lazily on the next use.
pub(crate) fn drop_thread_cache(pool_id: u64) {
    CACHES.with(|caches| {
        caches.borrow_mut().remove(&pool_id);
    });
}

/// Bounded per-class LIFO stacks of free slots, owned by one thread
///
/// Never synchronized: only the owning thread touches it. Slots held
/// here are "borrowed" from the arena and count as used in their chunk
/// until flushed back.
pub(crate) struct ThreadCache {
    pool: Arc<PoolInner>,
    arena_index: usize,
    capacity: usize,
    bins: Vec<Vec<SlotRef>>,
}

impl ThreadCache {
    fn new(pool: Arc<PoolInner>) -> Self {
        let arena_index = pool.least_loaded_arena();
        pool.arenas[arena_index].register_cache();
        let bins = (0..pool.table.len()).map(|_| Vec::new()).collect();
        let capacity = pool.config.cache_capacity;
        debug!("thread cache bound to arena {}", arena_index);
        Self {
            pool,
            arena_index,
            capacity,
            bins,
        }
    }

    /// Arena this cache allocates from on miss
    pub(crate) fn arena_index(&self) -> usize {
        self.arena_index
    }

    /// Pop a cached slot of the class, most recently freed first
    pub(crate) fn try_take(&mut self, class: usize) -> Option<SlotRef> {
        let slot = self.bins[class].pop();
        match slot {
            Some(_) => self.pool.cache_hits.fetch_add(1, Ordering::Relaxed),
            None => self.pool.cache_misses.fetch_add(1, Ordering::Relaxed),
        };
        slot
    }

    /// Capture a freed slot
    ///
    /// Hands the slot back when the bin is at capacity or the slot
    /// belongs to a foreign arena; the caller then frees it directly.
    pub(crate) fn try_put(&mut self, slot: SlotRef) -> Option<SlotRef> {
        if slot.chunk().arena_index() as usize != self.arena_index {
            self.pool.cache_overflow.fetch_add(1, Ordering::Relaxed);
            return Some(slot);
        }
        let class = slot.chunk().class_index() as usize;
        let bin = &mut self.bins[class];
        if bin.len() >= self.capacity {
            self.pool.cache_overflow.fetch_add(1, Ordering::Relaxed);
            return Some(slot);
        }
        bin.push(slot);
        self.pool.cache_returns.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cached slots across all classes
    pub(crate) fn cached_slots(&self) -> usize {
        self.bins.iter().map(|bin| bin.len()).sum()
    }
}

impl Drop for ThreadCache {
    fn drop(&mut self) {
        let mut flushed = 0usize;
        for bin in &mut self.bins {
            for slot in bin.drain(..) {
                let arena = slot.chunk().arena_index() as usize;
                self.pool.arenas[arena].free(slot);
                flushed += 1;
            }
        }
        self.pool.arenas[self.arena_index].unregister_cache();
        if flushed > 0 {
            debug!("thread cache flushed {} slots", flushed);
        }
    }
}
