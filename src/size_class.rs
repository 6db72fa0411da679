//! Size-class routing.
//!
//! Maps a requested byte count to one of [`NFREELISTS`] size classes, each
//! [`ALIGN`] bytes wider than the last, or to the oversized path served
//! directly by the system allocator.

use crate::{ALIGN, MAX_BYTES, NFREELISTS};

/// Round `bytes` up to the next multiple of [`ALIGN`].
#[inline]
pub const fn round_up(bytes: usize) -> usize {
    crate::align_up(bytes, ALIGN)
}

/// Free-list index serving requests of `bytes`.
///
/// Only meaningful for `bytes` in `1..=MAX_BYTES`; callers check the
/// oversize threshold themselves.
#[inline]
pub const fn class_index(bytes: usize) -> usize {
    round_up(bytes) / ALIGN - 1
}

/// A pooled size class. Class `i` hands out blocks of `(i + 1) * ALIGN` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

impl SizeClass {
    pub const COUNT: usize = NFREELISTS;

    /// Smallest class, also used for zero-byte requests.
    pub const MIN: Self = Self(0);

    /// Largest class, serving requests of exactly [`MAX_BYTES`].
    pub const MAX: Self = Self((NFREELISTS - 1) as u8);

    /// Select the size class for a request, or `None` if it is oversized.
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        if bytes > MAX_BYTES {
            return None;
        }
        if bytes == 0 {
            return Some(Self::MIN);
        }
        Some(Self(class_index(bytes) as u8))
    }

    /// The class whose block size is exactly `bytes`.
    ///
    /// Used to recycle arena leftovers, whose length is always a multiple
    /// of [`ALIGN`] below [`MAX_BYTES`].
    pub const fn exact(bytes: usize) -> Option<Self> {
        if bytes == 0 || bytes % ALIGN != 0 {
            return None;
        }
        Self::from_bytes(bytes)
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        if index < NFREELISTS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn to_index(self) -> usize {
        self.0 as usize
    }

    /// Block size handed out by this class.
    pub const fn size(self) -> usize {
        (self.0 as usize + 1) * ALIGN
    }

    /// Classes strictly larger than this one, smallest first.
    pub fn larger(self) -> impl Iterator<Item = SizeClass> {
        (self.to_index() + 1..NFREELISTS).map(|i| Self(i as u8))
    }

    /// All classes, smallest first.
    pub fn all() -> impl Iterator<Item = SizeClass> {
        (0..NFREELISTS).map(|i| Self(i as u8))
    }
}

/// Where a request of a given size is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Served from the free list of this class.
    Pooled(SizeClass),
    /// Forwarded to the system allocator with the exact requested size.
    Oversized(usize),
}

/// Classify a request.
#[inline]
pub const fn route(bytes: usize) -> Route {
    match SizeClass::from_bytes(bytes) {
        Some(class) => Route::Pooled(class),
        None => Route::Oversized(bytes),
    }
}
