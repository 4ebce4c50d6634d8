//! Arenas: the synchronized owners of chunks and their free slots
//!
//! An arena is the fallback path behind the thread caches, so every
//! free-list mutation happens under a per-class mutex. Slots are
//! recycled in LIFO order; chunks are provisioned lazily and never
//! returned individually. Fragmentation is managed at slot granularity
//! through the size-class partitioning, not by compaction.

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::size_class::SizeClassTable;
use crate::slot::SlotRef;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Byte budget shared by all arenas of a pool
///
/// Models the backing environment refusing further chunks.
#[derive(Debug)]
pub(crate) struct ChunkBudget {
    limit: Option<usize>,
    reserved: AtomicUsize,
}

impl ChunkBudget {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            reserved: AtomicUsize::new(0),
        }
    }

    pub(crate) fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }

    fn try_reserve(&self, bytes: usize) -> bool {
        let Some(limit) = self.limit else {
            self.reserved.fetch_add(bytes, Ordering::Relaxed);
            return true;
        };
        let mut current = self.reserved.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= limit => next,
                _ => return false,
            };
            match self.reserved.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(seen) => current = seen,
            }
        }
    }
}

/// Chunk set and free list of one size class
#[derive(Default)]
struct ClassPool {
    chunks: Vec<Arc<Chunk>>,
    free: Vec<SlotRef>,
}

/// Owner of the chunks of one allocation domain
///
/// Several threads may share an arena; each thread cache binds to the
/// least-loaded one so contention stays on the cold path.
pub struct Arena {
    index: u32,
    table: Arc<SizeClassTable>,
    chunk_size: usize,
    budget: Arc<ChunkBudget>,
    classes: Vec<Mutex<ClassPool>>,
    /// Thread caches currently bound to this arena
    registered: AtomicUsize,
}

impl Arena {
    pub(crate) fn new(
        index: u32,
        table: Arc<SizeClassTable>,
        chunk_size: usize,
        budget: Arc<ChunkBudget>,
    ) -> Self {
        let classes = (0..table.len()).map(|_| Mutex::new(ClassPool::default())).collect();
        Self {
            index,
            table,
            chunk_size,
            budget,
            classes,
            registered: AtomicUsize::new(0),
        }
    }

    /// Index of this arena within its pool
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Take a free slot of the given class
    ///
    /// Pops the free list in O(1); on exhaustion reserves a new chunk
    /// against the pool budget, failing with `OutOfMemory` when the
    /// budget cannot cover it.
    pub fn allocate(&self, class: usize) -> Result<SlotRef> {
        let mut pool = self.classes[class].lock();

        if let Some(slot) = pool.free.pop() {
            slot.chunk().mark_taken();
            debug!("arena {} reused {}", self.index, slot);
            return Ok(slot);
        }

        let slot_size = self.table.size_of(class);
        let slot_count = (self.chunk_size / slot_size).max(1) as u32;
        let bytes = slot_size * slot_count as usize;
        if !self.budget.try_reserve(bytes) {
            return Err(Error::OutOfMemory);
        }

        let chunk = Arc::new(Chunk::new(self.index, class as u16, slot_size, slot_count));
        info!(
            arena = self.index,
            class, slot_size, slot_count, "provisioned chunk"
        );

        // Slot 0 is handed out directly; the rest land on the free list
        // so later pops come off in ascending slot order.
        pool.free
            .extend((1..slot_count).rev().map(|i| SlotRef::new(Arc::clone(&chunk), i)));
        pool.chunks.push(Arc::clone(&chunk));
        chunk.mark_taken();
        Ok(SlotRef::new(chunk, 0))
    }

    /// Return a slot to its class free list
    pub fn free(&self, slot: SlotRef) {
        debug_assert_eq!(slot.chunk().arena_index(), self.index);
        let class = slot.chunk().class_index() as usize;
        let mut pool = self.classes[class].lock();
        slot.chunk().mark_freed();
        debug!("arena {} freed {}", self.index, slot);
        pool.free.push(slot);
    }

    pub(crate) fn register_cache(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unregister_cache(&self) {
        self.registered.fetch_sub(1, Ordering::Relaxed);
    }

    /// Number of thread caches currently bound to this arena
    pub fn registered_caches(&self) -> usize {
        self.registered.load(Ordering::Relaxed)
    }

    /// Snapshot of per-class slot accounting
    pub fn stats(&self) -> ArenaStats {
        let classes = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, pool)| {
                let pool = pool.lock();
                let total_slots: u64 = pool.chunks.iter().map(|c| c.slot_count() as u64).sum();
                let used_slots: u64 = pool.chunks.iter().map(|c| c.used() as u64).sum();
                ClassStats {
                    slot_size: self.table.size_of(i),
                    chunks: pool.chunks.len(),
                    total_slots,
                    free_slots: pool.free.len() as u64,
                    used_slots,
                }
            })
            .collect();

        ArenaStats {
            index: self.index(),
            registered_caches: self.registered_caches(),
            classes,
        }
    }
}

/// Per-arena accounting snapshot
#[derive(Debug, Clone)]
pub struct ArenaStats {
    pub index: u32,
    pub registered_caches: usize,
    pub classes: Vec<ClassStats>,
}

/// Slot accounting for one size class of one arena
#[derive(Debug, Clone, Copy)]
pub struct ClassStats {
    pub slot_size: usize,
    pub chunks: usize,
    pub total_slots: u64,
    pub free_slots: u64,
    pub used_slots: u64,
}
