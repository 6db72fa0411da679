//! Chunk arena backing the free lists.
//!
//! The arena keeps the unused tail `[start_free, end_free)` of the most
//! recently acquired chunk. Refills carve batches of same-size blocks from
//! it; when it runs dry a new chunk is requested from the system allocator,
//! sized by [`ChunkArena::growth_bytes`].
//!
//! Every chunk starts with a [`ChunkHeader`] linking it to the previous one,
//! so the whole arena can be handed back when the pool is dropped.

use core::ptr::{self, NonNull};

use crate::size_class::round_up;
use crate::system::SystemAllocator;
use crate::AllocResult;

#[repr(C)]
struct ChunkHeader {
    next: Option<NonNull<ChunkHeader>>,
    /// Bytes requested from the system allocator, header included.
    bytes: usize,
}

/// Bytes reserved at the start of every chunk for its header.
pub(crate) const CHUNK_HEADER_SIZE: usize = round_up(core::mem::size_of::<ChunkHeader>());

pub struct ChunkArena {
    start_free: *mut u8,
    end_free: *mut u8,
    /// Arena bytes ever acquired from the system allocator, headers excluded.
    heap_size: usize,
    growths: usize,
    chunks: Option<NonNull<ChunkHeader>>,
}

impl ChunkArena {
    pub const fn new() -> Self {
        Self {
            start_free: ptr::null_mut(),
            end_free: ptr::null_mut(),
            heap_size: 0,
            growths: 0,
            chunks: None,
        }
    }

    /// Bytes in `[start_free, end_free)`.
    pub fn bytes_left(&self) -> usize {
        self.end_free as usize - self.start_free as usize
    }

    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    /// Number of chunks acquired from the system allocator.
    pub fn growths(&self) -> usize {
        self.growths
    }

    /// Carve `*nobjs` blocks of `size` bytes, or as many whole blocks as
    /// remain if that is fewer (updating `*nobjs`). Returns `None` without
    /// touching the arena if not even one block fits.
    pub fn carve(&mut self, size: usize, nobjs: &mut usize) -> Option<NonNull<u8>> {
        let total_bytes = size * *nobjs;
        let bytes_left = self.bytes_left();

        if bytes_left < total_bytes {
            if bytes_left < size {
                return None;
            }
            *nobjs = bytes_left / size;
        }

        let carved = NonNull::new(self.start_free)?;
        // SAFETY: `size * *nobjs <= bytes_left`, so the cursor stays in the chunk.
        self.start_free = unsafe { carved.as_ptr().add(size * *nobjs) };
        Some(carved)
    }

    /// Take the whole unused region, leaving the arena empty.
    pub fn take_leftover(&mut self) -> Option<(NonNull<u8>, usize)> {
        let bytes_left = self.bytes_left();
        if bytes_left == 0 {
            return None;
        }
        let leftover = NonNull::new(self.start_free)?;
        self.start_free = self.end_free;
        Some((leftover, bytes_left))
    }

    /// Size of the next chunk for a refill that wanted `total_bytes`.
    ///
    /// Twice the request plus a sixteenth of everything acquired so far,
    /// so chunks get larger as the arena grows. [`ChunkArena::grow`] asks
    /// the system allocator for this plus [`CHUNK_HEADER_SIZE`] (16 bytes on
    /// 64-bit targets); `heap_size` counts only the usable part.
    pub fn growth_bytes(&self, total_bytes: usize) -> usize {
        2 * total_bytes + round_up(self.heap_size >> 4)
    }

    /// Acquire a new chunk with `bytes` usable bytes and make it the free region.
    ///
    /// The arena must be empty; recycle any leftover first. On failure the
    /// arena is left untouched.
    pub fn grow<S: SystemAllocator>(&mut self, system: &mut S, bytes: usize) -> AllocResult<()> {
        debug_assert_eq!(self.bytes_left(), 0);

        let request = bytes + CHUNK_HEADER_SIZE;
        let chunk = system.alloc_bytes(request)?;
        let header = chunk.cast::<ChunkHeader>();

        // SAFETY: the chunk is fresh, `ALIGN`-aligned and `request` bytes long.
        unsafe {
            header.as_ptr().write(ChunkHeader {
                next: self.chunks,
                bytes: request,
            });
            self.start_free = chunk.as_ptr().add(CHUNK_HEADER_SIZE);
            self.end_free = self.start_free.add(bytes);
        }

        self.chunks = Some(header);
        self.heap_size += bytes;
        self.growths += 1;
        Ok(())
    }

    /// Make a block taken from a free list the arena's free region.
    ///
    /// # Safety
    ///
    /// The arena must be empty and `block` must be `bytes` bytes of unused
    /// memory inside one of this arena's chunks.
    pub unsafe fn adopt(&mut self, block: NonNull<u8>, bytes: usize) {
        debug_assert_eq!(self.bytes_left(), 0);
        self.start_free = block.as_ptr();
        self.end_free = block.as_ptr().add(bytes);
    }

    /// Return every chunk to the system allocator and reset the arena.
    ///
    /// # Safety
    ///
    /// `system` must be the allocator the chunks came from, and no block
    /// carved from them may be used afterwards.
    pub unsafe fn release<S: SystemAllocator>(&mut self, system: &mut S) {
        let mut cursor = self.chunks.take();
        while let Some(chunk) = cursor {
            let ChunkHeader { next, bytes } = chunk.as_ptr().read();
            system.dealloc_bytes(chunk.cast(), bytes);
            cursor = next;
        }
        *self = Self::new();
    }
}

impl Default for ChunkArena {
    fn default() -> Self {
        Self::new()
    }
}
