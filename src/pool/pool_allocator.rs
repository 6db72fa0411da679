//! Pool allocator implementation.
//!
//! Requests up to [`MAX_BYTES`](crate::MAX_BYTES) are served from one LIFO
//! free list per size class. An empty list is refilled with [`NOBJS`] blocks
//! carved from the chunk arena; one goes to the caller and the rest are
//! linked into the list. Larger requests go straight to the system allocator.

use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::{debug, error, trace, warn};

use super::chunk_arena::ChunkArena;
use super::free_list::FreeList;
use super::stats::{ExhaustionReporter, PoolStats};
use crate::size_class::{route, Route, SizeClass};
use crate::system::{SystemAllocator, SystemHeap};
use crate::{AllocError, AllocResult, ByteAllocator, NFREELISTS, NOBJS};

/// Carve attempts per refill. A carve right after a growth or a donation
/// always succeeds, so the loop never needs more than two.
const MAX_CHUNK_ATTEMPTS: usize = 3;

/// Small-object pool allocator over a backing [`SystemAllocator`].
pub struct PoolAllocator<S: SystemAllocator = SystemHeap> {
    free_lists: [FreeList; NFREELISTS],
    arena: ChunkArena,
    system: S,
    allocated_bytes: usize,
    oversized_bytes: usize,
}

// SAFETY: the pool exclusively owns its chunks and free blocks; moving it to
// another thread moves that ownership along. It is not `Sync`.
unsafe impl<S: SystemAllocator + Send> Send for PoolAllocator<S> {}

impl<S: SystemAllocator> PoolAllocator<S> {
    pub const fn new(system: S) -> Self {
        Self {
            free_lists: [const { FreeList::new() }; NFREELISTS],
            arena: ChunkArena::new(),
            system,
            allocated_bytes: 0,
            oversized_bytes: 0,
        }
    }

    /// The backing allocator.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// Arena bytes ever acquired from the system allocator.
    pub fn heap_size(&self) -> usize {
        self.arena.heap_size()
    }

    /// Number of blocks on the free list of `class`.
    pub fn free_blocks(&self, class: SizeClass) -> usize {
        self.free_lists[class.to_index()].len()
    }

    pub fn stats(&self) -> PoolStats {
        let mut free_blocks = [0; NFREELISTS];
        for (count, list) in free_blocks.iter_mut().zip(&self.free_lists) {
            *count = list.len();
        }
        PoolStats {
            heap_size: self.arena.heap_size(),
            growths: self.arena.growths(),
            leftover_bytes: self.arena.bytes_left(),
            free_blocks,
            pooled_bytes_in_use: self.allocated_bytes,
            oversized_bytes_in_use: self.oversized_bytes,
        }
    }

    /// Get one block of `class` for the caller, linking up to `NOBJS - 1`
    /// more into its free list.
    fn refill(&mut self, class: SizeClass) -> AllocResult<NonNull<u8>> {
        let mut nobjs = NOBJS;
        let chunk = self.chunk_alloc(class, &mut nobjs)?;

        if nobjs > 1 {
            let size = class.size();
            // SAFETY: `chunk_alloc` carved `nobjs` contiguous unused blocks.
            unsafe {
                let rest = NonNull::new_unchecked(chunk.as_ptr().add(size));
                self.free_lists[class.to_index()].push_run(rest, size, nobjs - 1);
            }
        }
        trace!(
            "pool: refilled {} byte class with {} blocks",
            class.size(),
            nobjs
        );

        Ok(chunk)
    }

    /// Carve up to `*nobjs` blocks of `class` from the arena, growing it when
    /// not even one block fits.
    fn chunk_alloc(&mut self, class: SizeClass, nobjs: &mut usize) -> AllocResult<NonNull<u8>> {
        let size = class.size();

        for _ in 0..MAX_CHUNK_ATTEMPTS {
            if let Some(chunk) = self.arena.carve(size, nobjs) {
                return Ok(chunk);
            }

            self.recycle_leftover();

            let bytes_to_get = self.arena.growth_bytes(size * *nobjs);
            match self.arena.grow(&mut self.system, bytes_to_get) {
                Ok(()) => {
                    debug!(
                        "pool: arena grew by {} bytes, heap size {}",
                        bytes_to_get,
                        self.arena.heap_size()
                    );
                }
                Err(_e) => {
                    warn!(
                        "pool: system allocator refused {} bytes ({:?}), trying larger classes",
                        bytes_to_get, _e
                    );
                    if !self.donate_larger(class) {
                        ExhaustionReporter::print_exhaustion_stats(&self.stats(), size);
                        return Err(AllocError::NoMemory);
                    }
                }
            }
        }

        error!(
            "pool: arena still cannot serve {} byte blocks after {} attempts",
            size, MAX_CHUNK_ATTEMPTS
        );
        Err(AllocError::NoMemory)
    }

    /// Move what is left of the arena onto the free list of its exact size.
    fn recycle_leftover(&mut self) {
        let Some((block, bytes)) = self.arena.take_leftover() else {
            return;
        };

        // Arena sizes are multiples of ALIGN and the leftover is smaller than
        // the block that failed to fit, so it always matches a class.
        let class = SizeClass::exact(bytes);
        debug_assert!(class.is_some(), "arena leftover of {bytes} bytes has no class");
        if let Some(class) = class {
            trace!("pool: recycling {} byte arena leftover", bytes);
            // SAFETY: the leftover was uncarved arena memory.
            unsafe { self.free_lists[class.to_index()].push(block) };
        }
    }

    /// Hand one free block of a class larger than `class` back to the arena.
    ///
    /// Smaller classes are never used: their blocks are not contiguous.
    fn donate_larger(&mut self, class: SizeClass) -> bool {
        for larger in class.larger() {
            if let Some(block) = self.free_lists[larger.to_index()].pop() {
                trace!(
                    "pool: {} byte block donated to the arena for {} byte class",
                    larger.size(),
                    class.size()
                );
                // SAFETY: the arena is empty after `recycle_leftover`, and the
                // block was just unlinked from our own free list.
                unsafe { self.arena.adopt(block, larger.size()) };
                return true;
            }
        }
        false
    }
}

impl Default for PoolAllocator<SystemHeap> {
    fn default() -> Self {
        Self::new(SystemHeap)
    }
}

impl<S: SystemAllocator> ByteAllocator for PoolAllocator<S> {
    fn allocate(&mut self, bytes: usize) -> AllocResult<NonNull<u8>> {
        match route(bytes) {
            Route::Oversized(bytes) => {
                let ptr = self.system.alloc_bytes(bytes)?;
                self.oversized_bytes += bytes;
                Ok(ptr)
            }
            Route::Pooled(class) => {
                let ptr = match self.free_lists[class.to_index()].pop() {
                    Some(ptr) => ptr,
                    None => self.refill(class)?,
                };
                self.allocated_bytes += class.size();
                Ok(ptr)
            }
        }
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, bytes: usize) {
        match route(bytes) {
            Route::Oversized(bytes) => {
                debug_assert!(
                    self.oversized_bytes >= bytes,
                    "freeing {bytes} oversized bytes with {} in use",
                    self.oversized_bytes
                );
                self.system.dealloc_bytes(ptr, bytes);
                self.oversized_bytes = self.oversized_bytes.saturating_sub(bytes);
            }
            Route::Pooled(class) => {
                debug_assert!(
                    self.allocated_bytes >= class.size(),
                    "freeing a {} byte block with {} pooled bytes in use",
                    class.size(),
                    self.allocated_bytes
                );
                self.free_lists[class.to_index()].push(ptr);
                self.allocated_bytes = self.allocated_bytes.saturating_sub(class.size());
            }
        }
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> AllocResult<NonNull<u8>> {
        match (route(old_size), route(new_size)) {
            (Route::Pooled(old), Route::Pooled(new)) if old == new => Ok(ptr),
            (Route::Oversized(_), Route::Oversized(_)) => {
                debug_assert!(self.oversized_bytes >= old_size);
                let new_ptr = self.system.realloc_bytes(ptr, old_size, new_size)?;
                self.oversized_bytes = self.oversized_bytes.saturating_sub(old_size) + new_size;
                Ok(new_ptr)
            }
            _ => {
                let new_ptr = self.allocate(new_size)?;
                core::ptr::copy_nonoverlapping(
                    ptr.as_ptr(),
                    new_ptr.as_ptr(),
                    core::cmp::min(old_size, new_size),
                );
                self.deallocate(ptr, old_size);
                Ok(new_ptr)
            }
        }
    }

    fn total_bytes(&self) -> usize {
        self.arena.heap_size()
    }

    fn used_bytes(&self) -> usize {
        self.allocated_bytes
    }

    fn available_bytes(&self) -> usize {
        self.arena.heap_size().saturating_sub(self.allocated_bytes)
    }
}

impl<S: SystemAllocator> Drop for PoolAllocator<S> {
    fn drop(&mut self) {
        // SAFETY: the chunks came from `self.system`; pooled blocks still
        // held by callers dangle from here on.
        unsafe { self.arena.release(&mut self.system) };
    }
}
