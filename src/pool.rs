//! Rentable byte blocks backing rows, name indexes, and staging buffers.
//!
//! Every packed structure in the crate lives in a single block obtained from a
//! [`MemoryPool`]. A block's usable size is its `len()`, which may exceed the
//! requested minimum. Pools are allowed to misbehave and hand back less than
//! was asked for; [`rent_at_least`] is the one place that check happens.

use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use log::trace;

use crate::error::{DynamicError, Result};

const MAX_RETAINED_BLOCKS: usize = 64;

pub trait MemoryPool: Send + Sync + fmt::Debug {
    /// Returns a block of at least `min_size` bytes. Contents are unspecified.
    fn rent(&self, min_size: usize) -> Result<Vec<u8>>;

    fn give_back(&self, block: Vec<u8>);
}

pub type SharedPool = Arc<dyn MemoryPool>;

pub fn heap_pool() -> SharedPool {
    Arc::new(HeapPool)
}

/// Rents a block and rejects it (returning it to the pool) when it is smaller than `required`.
pub(crate) fn rent_at_least(pool: &dyn MemoryPool, required: usize) -> Result<Vec<u8>> {
    let block = pool.rent(required)?;
    if block.len() < required {
        let available = block.len();
        pool.give_back(block);
        return Err(DynamicError::capacity(required, available));
    }
    Ok(block)
}

/// Allocates a fresh zeroed block on every rent and drops returned blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapPool;

impl MemoryPool for HeapPool {
    fn rent(&self, min_size: usize) -> Result<Vec<u8>> {
        Ok(vec![0; min_size])
    }

    fn give_back(&self, _block: Vec<u8>) {}
}

/// Keeps returned blocks on a free list and hands them out again best-fit.
///
/// Recycled blocks keep whatever bytes their previous renter left behind.
/// `max_block` caps the size of any block handed out; requests above it get
/// an undersized block, which models a pool that cannot satisfy the request.
#[derive(Debug, Default)]
pub struct RecyclingPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_block: Option<usize>,
    outstanding: AtomicUsize,
    rented: AtomicUsize,
}

impl RecyclingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_block(max_block: usize) -> Self {
        Self {
            max_block: Some(max_block),
            ..Self::default()
        }
    }

    /// Blocks rented and not yet given back.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Total number of successful rent calls.
    pub fn rented(&self) -> usize {
        self.rented.load(Ordering::Acquire)
    }

    pub fn retained(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn take_best_fit(&self, min_size: usize) -> Option<Vec<u8>> {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        let (idx, _) = free
            .iter()
            .enumerate()
            .filter(|(_, block)| block.len() >= min_size)
            .min_by_key(|(_, block)| block.len())?;
        Some(free.swap_remove(idx))
    }
}

impl MemoryPool for RecyclingPool {
    fn rent(&self, min_size: usize) -> Result<Vec<u8>> {
        let size = match self.max_block {
            Some(max) if min_size > max => {
                trace!("Pool capped at {max} byte(s); {min_size} requested");
                max
            }
            _ => min_size,
        };
        let block = self.take_best_fit(size).unwrap_or_else(|| vec![0; size]);
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.rented.fetch_add(1, Ordering::AcqRel);
        Ok(block)
    }

    fn give_back(&self, block: Vec<u8>) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < MAX_RETAINED_BLOCKS {
            free.push(block);
        }
    }
}
