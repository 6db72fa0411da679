//! Backing allocator seam.
//!
//! The pool grows its arena and serves oversized requests through a
//! [`SystemAllocator`]. [`SystemHeap`] forwards to the `alloc` crate's heap.

use alloc::alloc::{alloc, dealloc, realloc};
use core::alloc::Layout;
use core::ptr::NonNull;

use crate::{AllocError, AllocResult, ALIGN};

/// Allocator the pool draws its memory from.
pub trait SystemAllocator {
    /// Allocate `bytes` bytes aligned to [`ALIGN`].
    fn alloc_bytes(&mut self, bytes: usize) -> AllocResult<NonNull<u8>>;

    /// Release a block obtained from [`SystemAllocator::alloc_bytes`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for the same `bytes`.
    unsafe fn dealloc_bytes(&mut self, ptr: NonNull<u8>, bytes: usize);

    /// Resize a block. The default allocates, copies and frees.
    ///
    /// # Safety
    ///
    /// Same contract as [`SystemAllocator::dealloc_bytes`] with `old_size`.
    unsafe fn realloc_bytes(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> AllocResult<NonNull<u8>> {
        let new_ptr = self.alloc_bytes(new_size)?;
        core::ptr::copy_nonoverlapping(
            ptr.as_ptr(),
            new_ptr.as_ptr(),
            core::cmp::min(old_size, new_size),
        );
        self.dealloc_bytes(ptr, old_size);
        Ok(new_ptr)
    }
}

/// A size too large to describe is a request the heap can never satisfy.
fn layout_for(bytes: usize) -> AllocResult<Layout> {
    Layout::from_size_align(bytes.max(1), ALIGN).map_err(|_| AllocError::NoMemory)
}

/// The global heap of the `alloc` crate.
///
/// Do not use as the backing of a pool that is itself installed as the
/// global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHeap;

impl SystemAllocator for SystemHeap {
    fn alloc_bytes(&mut self, bytes: usize) -> AllocResult<NonNull<u8>> {
        let layout = layout_for(bytes)?;
        NonNull::new(unsafe { alloc(layout) }).ok_or(AllocError::NoMemory)
    }

    unsafe fn dealloc_bytes(&mut self, ptr: NonNull<u8>, bytes: usize) {
        if let Ok(layout) = layout_for(bytes) {
            dealloc(ptr.as_ptr(), layout);
        }
    }

    unsafe fn realloc_bytes(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> AllocResult<NonNull<u8>> {
        let layout = layout_for(old_size)?;
        layout_for(new_size)?;
        NonNull::new(realloc(ptr.as_ptr(), layout, new_size.max(1))).ok_or(AllocError::NoMemory)
    }
}
