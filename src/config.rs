//! Construction-time configuration

use crate::error::{Error, Result};
use crate::size_class::geometric_classes;
use serde::{Deserialize, Serialize};

/// Parameters fixed when a pool is built
///
/// Everything here is supplied up front; nothing is tunable per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of allocation domains; thread caches spread across them
    pub arenas: usize,
    /// Supported slot sizes, strictly increasing
    pub size_classes: Vec<usize>,
    /// Target bytes per chunk; a chunk always holds at least one slot
    pub chunk_size: usize,
    /// Per-class bound on cached free slots per thread
    pub cache_capacity: usize,
    /// Wipe slots on allocation. Disabling is the uninitialized fast
    /// path: recycled slots then carry their previous owner's bytes.
    pub zero_on_allocate: bool,
    /// Optional cap on total chunk bytes; reservations past it fail
    /// with `OutOfMemory`
    pub max_pool_bytes: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            arenas: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            size_classes: geometric_classes(64, 64 * 1024, 20),
            chunk_size: 1024 * 1024,
            cache_capacity: 128,
            zero_on_allocate: true,
            max_pool_bytes: None,
        }
    }
}

impl PoolConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.arenas == 0 {
            return Err(Error::InvalidConfig("at least one arena is required".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be non-zero".into()));
        }
        // The size class list is validated by SizeClassTable::new
        Ok(())
    }
}
