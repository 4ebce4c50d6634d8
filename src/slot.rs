//! Slot identity for the buffer pool

use crate::chunk::Chunk;
use std::fmt;
use std::sync::Arc;

/// Reference to a single slot within a chunk
///
/// A free slot is owned by exactly one arena free list or one thread
/// cache; a taken slot backs one live buffer and the siblings minted
/// from it by retain. The reference itself is cheap to clone; the
/// ownership rules are enforced by the arena, cache, and buffer layers.
#[derive(Debug, Clone)]
pub struct SlotRef {
    chunk: Arc<Chunk>,
    index: u32,
}

impl SlotRef {
    pub(crate) fn new(chunk: Arc<Chunk>, index: u32) -> Self {
        Self { chunk, index }
    }

    /// Chunk this slot belongs to
    pub fn chunk(&self) -> &Arc<Chunk> {
        &self.chunk
    }

    /// Slot index within the chunk
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot size in bytes
    pub fn size(&self) -> usize {
        self.chunk.slot_size()
    }

    /// Address of the backing region, stable for the life of the pool
    pub fn address(&self) -> usize {
        self.chunk.base_address() + self.index as usize * self.chunk.slot_size()
    }

    #[inline]
    pub(crate) fn load(&self, offset: usize) -> u8 {
        self.chunk.load(self.index, offset)
    }

    #[inline]
    pub(crate) fn store(&self, offset: usize, value: u8) {
        self.chunk.store(self.index, offset, value)
    }

    pub(crate) fn zero(&self) {
        self.chunk.zero_slot(self.index)
    }
}

impl PartialEq for SlotRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.chunk, &other.chunk) && self.index == other.index
    }
}

impl Eq for SlotRef {}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Slot(arena={}, class={}, index={})",
            self.chunk.arena_index(),
            self.chunk.class_index(),
            self.index
        )
    }
}
