//! Small-object pool allocator
//!
//! This crate implements a fixed-size-class free-list allocator, featuring:
//! - Size-class routing of requests up to [`MAX_BYTES`] in [`ALIGN`]-byte steps
//! - One LIFO free list per size class, refilled [`NOBJS`] blocks at a time
//! - A growable chunk arena backed by a [`SystemAllocator`]
//! - Larger-class donation when the backing allocator runs dry
//!
//! Requests above [`MAX_BYTES`] bypass the pool and go straight to the
//! backing allocator. The allocator is single-threaded: wrap it in a lock
//! before sharing it.

#![no_std]

extern crate alloc;

use core::ptr::NonNull;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Alignment quantum: every pooled block size is a multiple of this.
pub const ALIGN: usize = 8;

/// Largest request served by the pool; anything above goes to the system allocator.
pub const MAX_BYTES: usize = 128;

/// Number of size classes (one free list each).
pub const NFREELISTS: usize = MAX_BYTES / ALIGN;

/// Number of blocks carved per refill.
pub const NOBJS: usize = 20;

// A free block stores the link to the next one in its first word.
const _: () = assert!(core::mem::size_of::<usize>() <= ALIGN);
const _: () = assert!(ALIGN.is_power_of_two() && MAX_BYTES % ALIGN == 0);

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid size or alignment (e.g. element alignment above [`ALIGN`]).
    InvalidParam,
    /// The system allocator is exhausted and no larger size class can donate.
    NoMemory,
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Byte-granularity allocator, the interface containers are written against.
pub trait ByteAllocator {
    /// Allocate a block of at least `bytes` bytes, aligned to [`ALIGN`].
    fn allocate(&mut self, bytes: usize) -> AllocResult<NonNull<u8>>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`ByteAllocator::allocate`] or
    /// [`ByteAllocator::reallocate`] on this allocator with the same `bytes`,
    /// and must not be used afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, bytes: usize);

    /// Resize a block, preserving the first `min(old_size, new_size)` bytes.
    ///
    /// On success `ptr` is invalid, whether or not the returned address is
    /// the same. On failure `ptr` is untouched and still owned by the caller.
    ///
    /// # Safety
    ///
    /// Same contract as [`ByteAllocator::deallocate`] with `old_size`.
    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> AllocResult<NonNull<u8>>;

    /// Returns total pooled memory size in bytes.
    fn total_bytes(&self) -> usize;

    /// Returns pooled memory currently handed out, in bytes.
    fn used_bytes(&self) -> usize;

    /// Returns pooled memory ready to be handed out, in bytes.
    fn available_bytes(&self) -> usize;
}

#[inline]
const fn align_up(pos: usize, align: usize) -> usize {
    (pos + align - 1) & !(align - 1)
}

pub mod size_class;
pub use size_class::{class_index, round_up, route, Route, SizeClass};

pub mod system;
pub use system::{SystemAllocator, SystemHeap};

pub mod pool;
pub use pool::{PoolAllocator, PoolStats};

pub mod typed;
pub use typed::TypedAllocator;
