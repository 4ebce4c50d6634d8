//! Reference-counted buffer handles
//!
//! A `PooledBuffer` is the sole owner of its slot until `retain` mints
//! a sibling; the handle is deliberately not `Clone`, so accidental
//! duplication of ownership is a type error rather than a runtime leak.
//!
//! Reclamation is driven entirely by `release`. The refcount reaching
//! zero is the freed flag: every accessor fails fast once it is set,
//! release of an already-freed buffer fails with `DoubleRelease`, and
//! a handle dropped without release leaks its slot until the pool is
//! torn down. Retain and release use compare-and-swap loops so the
//! decrement to zero reclaims exactly once even under concurrent
//! release from retained siblings.

use crate::error::{Error, Result};
use crate::pool::{self, PoolInner};
use crate::slot::SlotRef;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Handle to one pooled slot, created with refcount 1
pub struct PooledBuffer {
    shared: Arc<BufferShared>,
}

struct BufferShared {
    slot: SlotRef,
    pool: Arc<PoolInner>,
    /// Owner count; zero is the freed flag
    refs: AtomicUsize,
}

impl PooledBuffer {
    pub(crate) fn new(slot: SlotRef, pool: Arc<PoolInner>) -> Self {
        Self {
            shared: Arc::new(BufferShared {
                slot,
                pool,
                refs: AtomicUsize::new(1),
            }),
        }
    }

    /// Usable capacity: the slot size of the buffer's size class
    pub fn capacity(&self) -> usize {
        self.shared.slot.size()
    }

    /// Current owner count; zero means released
    pub fn ref_count(&self) -> usize {
        self.shared.refs.load(Ordering::Acquire)
    }

    /// Whether the backing slot has been reclaimed
    pub fn is_released(&self) -> bool {
        self.ref_count() == 0
    }

    /// Backing-slot identity, stable for the life of the pool
    pub fn slot_address(&self) -> usize {
        self.shared.slot.address()
    }

    fn guard(&self) -> Result<()> {
        if self.shared.refs.load(Ordering::Acquire) == 0 {
            return Err(Error::UseAfterFree);
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        let capacity = self.capacity();
        let end = offset
            .checked_add(len)
            .ok_or(Error::OutOfBounds { offset, capacity })?;
        if end > capacity {
            return Err(Error::OutOfBounds { offset, capacity });
        }
        Ok(())
    }

    /// Read one byte
    pub fn read_byte(&self, offset: usize) -> Result<u8> {
        self.guard()?;
        self.check_range(offset, 1)?;
        Ok(self.shared.slot.load(offset))
    }

    /// Write one byte
    pub fn write_byte(&self, offset: usize, value: u8) -> Result<()> {
        self.guard()?;
        self.check_range(offset, 1)?;
        self.shared.slot.store(offset, value);
        Ok(())
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.guard()?;
        self.check_range(offset, dst.len())?;
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = self.shared.slot.load(offset + i);
        }
        Ok(())
    }

    /// Copy `src` into the buffer starting at `offset`
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.guard()?;
        self.check_range(offset, src.len())?;
        for (i, &byte) in src.iter().enumerate() {
            self.shared.slot.store(offset + i, byte);
        }
        Ok(())
    }

    /// Snapshot the full contents as `Bytes` for downstream consumers
    pub fn to_bytes(&self) -> Result<Bytes> {
        self.guard()?;
        let mut out = vec![0u8; self.capacity()];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.shared.slot.load(i);
        }
        Ok(Bytes::from(out))
    }

    /// Mint a second owner of the same slot
    ///
    /// Fails with `UseAfterFree` once the buffer is released; a freed
    /// slot cannot be resurrected.
    pub fn retain(&self) -> Result<PooledBuffer> {
        let mut current = self.shared.refs.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return Err(Error::UseAfterFree);
            }
            match self.shared.refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Ok(PooledBuffer {
                        shared: Arc::clone(&self.shared),
                    })
                }
                Err(seen) => current = seen,
            }
        }
    }

    /// Drop one ownership count; the last release reclaims the slot
    ///
    /// Strictly single-use per owner: releasing an already-freed buffer
    /// fails with `DoubleRelease` instead of masking the bug.
    pub fn release(&self) -> Result<()> {
        let mut current = self.shared.refs.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return Err(Error::DoubleRelease);
            }
            match self.shared.refs.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
        }
        if current == 1 {
            // This call won the decrement to zero and reclaims alone
            pool::reclaim(&self.shared.pool, self.shared.slot.clone());
        }
        Ok(())
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("slot", &format_args!("{}", self.shared.slot))
            .field("capacity", &self.capacity())
            .field("refs", &self.ref_count())
            .finish()
    }
}
