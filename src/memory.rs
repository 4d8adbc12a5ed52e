//! Memory allocation for backends
//!
//! The allocation strategy belongs to the host runtime. Backends only see the
//! [`MemoryAllocator`] trait through their init and execution contexts.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

/// Allocator handed to backends
pub trait MemoryAllocator: Send + Sync {
    /// Allocate `nbytes` zeroed bytes
    fn allocate(&self, nbytes: usize) -> Result<Box<[u8]>>;

    /// Bytes handed out since the last reset
    fn used(&self) -> usize;

    /// Total budget
    fn capacity(&self) -> usize;

    /// Bytes still available
    fn available(&self) -> usize {
        self.capacity().saturating_sub(self.used())
    }
}

/// Bump-style byte budget
///
/// Allocations are only counted against the budget; it is returned as a
/// whole with [`reset`](Self::reset), typically when the owning method is
/// unloaded or after each execution for temp arenas.
#[derive(Debug)]
pub struct ArenaAllocator {
    capacity: usize,
    used: AtomicUsize,
}

impl ArenaAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    /// Return the whole budget
    pub fn reset(&self) {
        self.used.store(0, Ordering::Release);
    }
}

impl MemoryAllocator for ArenaAllocator {
    fn allocate(&self, nbytes: usize) -> Result<Box<[u8]>> {
        let capacity = self.capacity;
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(nbytes).filter(|total| *total <= capacity)
            })
            .map_err(|used| Error::MemoryAllocationFailed {
                requested: nbytes,
                available: capacity.saturating_sub(used),
            })?;

        tracing::trace!(nbytes, capacity, "Arena allocation");
        Ok(vec![0u8; nbytes].into_boxed_slice())
    }

    fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_within_budget() {
        let arena = ArenaAllocator::new(64);
        let block = arena.allocate(48).unwrap();
        assert_eq!(block.len(), 48);
        assert!(block.iter().all(|b| *b == 0));
        assert_eq!(arena.used(), 48);
        assert_eq!(arena.available(), 16);
    }

    #[test]
    fn test_allocate_over_budget() {
        let arena = ArenaAllocator::new(32);
        arena.allocate(20).unwrap();

        match arena.allocate(20) {
            Err(Error::MemoryAllocationFailed {
                requested,
                available,
            }) => {
                assert_eq!(requested, 20);
                assert_eq!(available, 12);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(arena.used(), 20);
    }

    #[test]
    fn test_reset() {
        let arena = ArenaAllocator::new(16);
        arena.allocate(16).unwrap();
        assert!(arena.allocate(1).is_err());
        arena.reset();
        assert!(arena.allocate(16).is_ok());
    }
}
