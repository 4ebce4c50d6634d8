//! The allocator facade
//!
//! `BufferPool` composes the size class table, a set of arenas, and the
//! per-thread cache registry. An allocate/release pair touches at most
//! the calling thread's cache and, on a miss or overflow, one arena; no
//! lock is ever held across both.

use crate::arena::{Arena, ArenaStats, ChunkBudget};
use crate::buffer::PooledBuffer;
use crate::cache;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::size_class::SizeClassTable;
use crate::slot::SlotRef;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Distinguishes pools in the per-thread cache registry
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// Pooled byte-buffer allocator
///
/// Cheap to clone; clones share the same arenas, caches, and counters.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    pub(crate) id: u64,
    pub(crate) config: PoolConfig,
    pub(crate) table: Arc<SizeClassTable>,
    pub(crate) arenas: Vec<Arc<Arena>>,
    pub(crate) budget: Arc<ChunkBudget>,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) cache_misses: AtomicU64,
    pub(crate) cache_returns: AtomicU64,
    pub(crate) cache_overflow: AtomicU64,
}

impl BufferPool {
    /// Build a pool from the given configuration
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let table = Arc::new(SizeClassTable::new(config.size_classes.clone())?);
        let budget = Arc::new(ChunkBudget::new(config.max_pool_bytes));
        let arenas = (0..config.arenas)
            .map(|i| {
                Arc::new(Arena::new(
                    i as u32,
                    Arc::clone(&table),
                    config.chunk_size,
                    Arc::clone(&budget),
                ))
            })
            .collect();
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        info!(
            pool = id,
            arenas = config.arenas,
            classes = table.len(),
            "initialized buffer pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                config,
                table,
                arenas,
                budget,
                cache_hits: AtomicU64::new(0),
                cache_misses: AtomicU64::new(0),
                cache_returns: AtomicU64::new(0),
                cache_overflow: AtomicU64::new(0),
            }),
        })
    }

    /// Allocate a buffer of at least `size` bytes
    ///
    /// Capacity is rounded up to the smallest size class that fits; the
    /// returned handle owns its slot with refcount 1. Contents are
    /// zeroed unless `zero_on_allocate` was disabled, in which case a
    /// recycled slot carries whatever its previous owner wrote.
    pub fn allocate(&self, size: usize) -> Result<PooledBuffer> {
        let class = self.inner.table.class_for(size)?;
        let slot = cache::with_thread_cache(&self.inner, |cache| match cache.try_take(class) {
            Some(slot) => Ok(slot),
            None => self.inner.arenas[cache.arena_index()].allocate(class),
        })?;

        if self.inner.config.zero_on_allocate {
            slot.zero();
        }
        debug!("allocated {} bytes as {}", size, slot);
        Ok(PooledBuffer::new(slot, Arc::clone(&self.inner)))
    }

    /// Flush the calling thread's cache back to the arenas
    ///
    /// The cache is rebuilt lazily on the thread's next allocation.
    /// Caches of other threads are untouched; they flush themselves
    /// when their thread ends.
    pub fn trim_thread_cache(&self) {
        cache::drop_thread_cache(self.inner.id);
    }

    /// Construction-time configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Size class table in use
    pub fn size_classes(&self) -> &SizeClassTable {
        &self.inner.table
    }

    /// Pool-wide accounting snapshot
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            arenas: self.inner.arenas.iter().map(|a| a.stats()).collect(),
            reserved_bytes: self.inner.budget.reserved(),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.inner.cache_misses.load(Ordering::Relaxed),
            cache_returns: self.inner.cache_returns.load(Ordering::Relaxed),
            cache_overflow: self.inner.cache_overflow.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> Arc<PoolInner> {
        Arc::clone(&self.inner)
    }
}

impl PoolInner {
    /// Arena with the fewest bound caches; new caches bind there
    pub(crate) fn least_loaded_arena(&self) -> usize {
        self.arenas
            .iter()
            .enumerate()
            .min_by_key(|(_, arena)| arena.registered_caches())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Recycle a slot whose last owner released it
///
/// The slot lands in the calling thread's cache; when the cache is full
/// or bound to a different arena, it goes straight back to the arena
/// that owns its chunk.
pub(crate) fn reclaim(pool: &Arc<PoolInner>, slot: SlotRef) {
    let rejected = cache::with_thread_cache(pool, |cache| cache.try_put(slot));
    if let Some(slot) = rejected {
        let arena = slot.chunk().arena_index() as usize;
        pool.arenas[arena].free(slot);
    }
}

/// Pool-wide statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub arenas: Vec<ArenaStats>,
    /// Bytes reserved in chunks across all arenas
    pub reserved_bytes: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_returns: u64,
    pub cache_overflow: u64,
}

impl PoolStats {
    /// Fraction of allocations served by thread caches
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
