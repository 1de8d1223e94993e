//! Fixed-block memory pool.
//!
//! All storage is reserved up front as an array of `N` blocks of type `T`. A
//! pool built with `num_blocks` threads the first `num_blocks` of them into a
//! singly linked free list. Allocation pops the head of that list and freeing
//! pushes onto it, both O(1) and both inside a short critical section on the
//! pool mutex. The pool never grows: once the free list is empty, allocation
//! fails until something is freed.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A handle, identifying an allocated block in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Snapshot of pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolStats {
    /// Size in bytes of one block.
    pub block_size: usize,
    pub total_blocks: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    /// Lowest number of free blocks seen since the pool was built.
    pub min_free_blocks: usize,
}

struct Block<T> {
    next: Option<BlockId>,
    in_use: bool,
    value: T,
}

struct PoolState<T, const N: usize> {
    blocks: [Block<T>; N],
    free_head: Option<BlockId>,
    total: usize,
    min_free: usize,
}

impl<T, const N: usize> PoolState<T, N> {
    fn thread_free_list(&mut self) {
        for (i, block) in self.blocks.iter_mut().enumerate().take(self.total) {
            block.in_use = false;
            block.next = if i + 1 < self.total {
                Some(BlockId(i + 1))
            } else {
                None
            };
        }
        self.free_head = Some(BlockId(0));
    }

    fn free_list_len(&self) -> usize {
        let mut len = 0;
        let mut cur = self.free_head;
        while let Some(id) = cur {
            len += 1;
            cur = self.blocks[id.0].next;
        }
        len
    }

    fn get(&self, id: BlockId) -> Option<&Block<T>> {
        self.blocks[..self.total].get(id.0).filter(|b| b.in_use)
    }

    fn get_mut(&mut self, id: BlockId) -> Option<&mut Block<T>> {
        self.blocks[..self.total].get_mut(id.0).filter(|b| b.in_use)
    }
}

/// A lock-protected pool of `N` blocks of `T`.
///
/// `M` is the raw mutex guarding the free list, e.g.
/// `CriticalSectionRawMutex` when the pool is shared between tasks and
/// interrupt handlers, or `NoopRawMutex` when it is not shared at all.
pub struct MemPool<M: RawMutex, T, const N: usize> {
    state: Mutex<M, RefCell<PoolState<T, N>>>,
    used: AtomicUsize,
}

impl<M: RawMutex, T: Default, const N: usize> MemPool<M, T, N> {
    /// Build a pool handing out `num_blocks` blocks of the reserved storage.
    ///
    /// Fails with [`Error::NoMemory`] if `num_blocks` is larger than the
    /// storage reserved by `N`.
    pub fn new(num_blocks: usize) -> Result<Self> {
        if num_blocks == 0 {
            return Err(Error::InvalidParameter);
        }
        if num_blocks > N {
            error!(
                "Pool of {} blocks requested, only {} reserved",
                num_blocks,
                N
            );
            return Err(Error::NoMemory);
        }

        let mut state = PoolState {
            blocks: core::array::from_fn(|_| Block {
                next: None,
                in_use: false,
                value: T::default(),
            }),
            free_head: None,
            total: num_blocks,
            min_free: num_blocks,
        };
        state.thread_free_list();

        Ok(Self {
            state: Mutex::new(RefCell::new(state)),
            used: AtomicUsize::new(0),
        })
    }
}

impl<M: RawMutex, T, const N: usize> MemPool<M, T, N> {
    /// Take one block off the free list.
    ///
    /// Returns `None` when the pool is exhausted. The block keeps whatever
    /// contents it had when it was last freed.
    pub fn alloc(&self) -> Option<BlockId> {
        self.state.lock(|s| {
            let s = &mut *s.borrow_mut();
            let Some(id) = s.free_head else {
                debug!("Pool exhausted, {} blocks in use", s.total);
                return None;
            };

            let block = &mut s.blocks[id.0];
            s.free_head = block.next.take();
            block.in_use = true;

            let used = self.used.fetch_add(1, Ordering::Relaxed) + 1;
            s.min_free = s.min_free.min(s.total - used);
            Some(id)
        })
    }

    /// Put a block back on the free list.
    ///
    /// Blocks that are not currently allocated from this pool are rejected.
    pub fn free(&self, id: BlockId) -> Result<()> {
        self.state.lock(|s| {
            let s = &mut *s.borrow_mut();
            let free_head = s.free_head;
            let Some(block) = s.get_mut(id) else {
                warn!("Rejected free of unallocated block {}", id.0);
                return Err(Error::InvalidParameter);
            };

            block.in_use = false;
            block.next = free_head;
            s.free_head = Some(id);
            self.used.fetch_sub(1, Ordering::Relaxed);
            Ok(())
        })
    }

    /// Return every block to the free list at once.
    ///
    /// Every outstanding [`BlockId`] becomes invalid.
    pub fn free_all(&self) {
        self.state.lock(|s| {
            let s = &mut *s.borrow_mut();
            s.thread_free_list();
            self.used.store(0, Ordering::Relaxed);
        })
    }

    /// Release the pool.
    pub fn deinit(self) {
        let used = self.used_block_count();
        if used != 0 {
            warn!("Pool released with {} blocks still in use", used);
        }
    }

    /// Run `f` on an allocated block.
    ///
    /// `f` runs with the pool locked and must not call back into this pool.
    pub(crate) fn with<R>(&self, id: BlockId, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.state.lock(|s| {
            let s = s.borrow();
            let value = s.get(id).map(|b| f(&b.value));
            value.ok_or(Error::InvalidParameter)
        })
    }

    /// Run `f` on an allocated block, mutably. Same restrictions as
    /// [`with`](Self::with).
    pub(crate) fn with_mut<R>(&self, id: BlockId, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let value = s.get_mut(id).map(|b| f(&mut b.value));
            value.ok_or(Error::InvalidParameter)
        })
    }

    pub fn block_size(&self) -> usize {
        core::mem::size_of::<T>()
    }

    pub fn total_block_count(&self) -> usize {
        self.state.lock(|s| s.borrow().total)
    }

    /// Number of allocated blocks. Does not take the pool lock.
    pub fn used_block_count(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Length of the free list, counted by walking it.
    pub fn free_block_count(&self) -> usize {
        self.state.lock(|s| s.borrow().free_list_len())
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock(|s| {
            let s = s.borrow();
            PoolStats {
                block_size: self.block_size(),
                total_blocks: s.total,
                used_blocks: self.used.load(Ordering::Relaxed),
                free_blocks: s.free_list_len(),
                min_free_blocks: s.min_free,
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
    use heapless::Vec;

    type Pool = MemPool<NoopRawMutex, [u8; 16], 8>;

    fn assert_conserved<M: RawMutex, T, const N: usize>(pool: &MemPool<M, T, N>) {
        assert_eq!(
            pool.used_block_count() + pool.free_block_count(),
            pool.total_block_count()
        );
    }

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(Pool::new(0).err(), Some(Error::InvalidParameter));
        assert_eq!(Pool::new(9).err(), Some(Error::NoMemory));
        assert!(Pool::new(8).is_ok());
    }

    #[test]
    fn exhausts_after_total_blocks() {
        let pool = Pool::new(5).unwrap();
        let mut ids: Vec<BlockId, 8> = Vec::new();
        for _ in 0..5 {
            let id = pool.alloc().unwrap();
            assert!(!ids.contains(&id));
            ids.push(id).unwrap();
            assert_conserved(&pool);
        }
        assert_eq!(pool.alloc(), None);
        assert_eq!(pool.used_block_count(), 5);

        pool.free(ids[2]).unwrap();
        assert_eq!(pool.alloc(), Some(ids[2]));
        assert_conserved(&pool);
    }

    #[test]
    fn conserves_blocks_over_mixed_sequence() {
        let pool = Pool::new(8).unwrap();
        let mut live: Vec<BlockId, 8> = Vec::new();
        for step in 0..64usize {
            if step % 3 == 2 && !live.is_empty() {
                let id = live.swap_remove(step % live.len());
                pool.free(id).unwrap();
            } else if let Some(id) = pool.alloc() {
                assert!(!live.contains(&id), "block handed out twice");
                live.push(id).unwrap();
            } else {
                assert_eq!(live.len(), 8);
            }
            assert_conserved(&pool);
            assert_eq!(pool.used_block_count(), live.len());
        }
    }

    #[test]
    fn rejects_double_free() {
        let pool = Pool::new(2).unwrap();
        let id = pool.alloc().unwrap();
        pool.free(id).unwrap();
        assert_eq!(pool.free(id), Err(Error::InvalidParameter));
        assert_eq!(pool.free(BlockId(7)), Err(Error::InvalidParameter));
        assert_conserved(&pool);
    }

    #[test]
    fn block_access_requires_allocation() {
        let pool = Pool::new(2).unwrap();
        let id = pool.alloc().unwrap();
        pool.with_mut(id, |b| b[0] = 0xAB).unwrap();
        assert_eq!(pool.with(id, |b| b[0]), Ok(0xAB));
        pool.free(id).unwrap();
        assert_eq!(pool.with(id, |b| b[0]), Err(Error::InvalidParameter));
    }

    #[test]
    fn free_all_resets_pool() {
        let pool = Pool::new(4).unwrap();
        while pool.alloc().is_some() {}
        assert_eq!(pool.stats().min_free_blocks, 0);

        pool.free_all();
        assert_eq!(pool.used_block_count(), 0);
        assert_eq!(pool.free_block_count(), 4);
        let stats = pool.stats();
        assert_eq!(stats.block_size, 16);
        assert_eq!(stats.free_blocks, 4);
        pool.deinit();
    }

    #[test]
    fn shared_between_threads() {
        let pool = MemPool::<CriticalSectionRawMutex, u32, 16>::new(16).unwrap();

        std::thread::scope(|s| {
            for t in 0..4u32 {
                let pool = &pool;
                s.spawn(move || {
                    for round in 0..200u32 {
                        if let Some(id) = pool.alloc() {
                            pool.with_mut(id, |v| *v = t * 1000 + round).unwrap();
                            assert_eq!(pool.with(id, |v| *v), Ok(t * 1000 + round));
                            pool.free(id).unwrap();
                        }
                    }
                });
            }
        });

        assert_eq!(pool.used_block_count(), 0);
        assert_conserved(&pool);
    }
}
