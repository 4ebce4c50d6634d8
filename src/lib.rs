//! Pooled byte-buffer allocator
//!
//! Hands out fixed-size buffers from pre-reserved chunks, tracks their
//! lifetime with atomic reference counts, and recycles freed slots
//! through a per-thread cache so the hot allocate/release path touches
//! no shared state.
//!
//! # Architecture
//!
//! ```text
//! BufferPool
//!   ├─→ SizeClassTable   [64, 77, 93, 112, ...]
//!   ├─→ Arena 0
//!   │     ├─→ class 64B   → Chunks: [#0, #1]  Free: [3, 7, 12]
//!   │     └─→ class 112B  → Chunks: [#0]      Free: [1]
//!   ├─→ Arena 1 ...
//!   └─→ ThreadCache (one per calling thread, unsynchronized)
//!         └─→ class 64B → [slot, slot, ...]  (bounded LIFO)
//!
//! allocate(size) → class lookup → cache pop | arena free-list pop | new chunk
//! release()      → refcount − 1 → at zero: cache push | arena free
//! ```
//!
//! The thread caches serve the common case without locking; the arenas
//! are the synchronized fallback when a cache runs empty or full.
//! Reclamation is strictly refcount-driven: a handle that is dropped
//! without being released keeps its slot out of circulation until the
//! pool is torn down.

#![warn(rust_2018_idioms)]

pub mod arena;
pub mod bench;
pub mod buffer;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod pool;
pub mod size_class;
pub mod slot;

pub use arena::{Arena, ArenaStats, ClassStats};
pub use buffer::PooledBuffer;
pub use chunk::Chunk;
pub use config::PoolConfig;
pub use pool::{BufferPool, PoolStats};
pub use size_class::{geometric_classes, SizeClassTable};
pub use slot::SlotRef;

/// Allocator error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        /// Request exceeds the largest configured size class. The
        /// caller may retry with a smaller request or fall back to an
        /// unpooled allocation.
        #[error("requested size {requested} exceeds largest size class {max}")]
        SizeTooLarge { requested: usize, max: usize },

        /// The pool byte budget cannot cover another chunk.
        #[error("pool byte budget exhausted, cannot provision a new chunk")]
        OutOfMemory,

        /// Release of a buffer whose refcount already reached zero.
        #[error("buffer released after its refcount reached zero")]
        DoubleRelease,

        /// Access through a handle whose backing slot was reclaimed.
        #[error("buffer accessed after release")]
        UseAfterFree,

        /// Accessor offset or range outside the buffer capacity.
        #[error("offset {offset} out of bounds for capacity {capacity}")]
        OutOfBounds { offset: usize, capacity: usize },

        /// Rejected construction-time configuration.
        #[error("invalid configuration: {0}")]
        InvalidConfig(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
