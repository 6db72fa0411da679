//! Intrusive free list for a single size class.
//!
//! A free block stores the link to the next free block in its first word;
//! once handed out, the same bytes belong to the client. The list owns a
//! block exactly while it is linked.

use core::ptr::NonNull;

#[repr(C)]
struct FreeNode {
    next: Option<NonNull<FreeNode>>,
}

/// LIFO chain of free blocks of one size class.
pub struct FreeList {
    head: Option<NonNull<FreeNode>>,
    len: usize,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Unlink and return the most recently pushed block.
    pub fn pop(&mut self) -> Option<NonNull<u8>> {
        let head = self.head?;
        // SAFETY: every linked node was written by `push` or `push_run`.
        self.head = unsafe { head.as_ref().next };
        self.len -= 1;
        Some(head.cast())
    }

    /// Push a block onto the head of the list.
    ///
    /// # Safety
    ///
    /// `block` must be valid for writes of one pointer, aligned to
    /// [`crate::ALIGN`], and not referenced by anyone else.
    pub unsafe fn push(&mut self, block: NonNull<u8>) {
        let node = block.cast::<FreeNode>();
        node.as_ptr().write(FreeNode { next: self.head });
        self.head = Some(node);
        self.len += 1;
    }

    /// Link `count` contiguous blocks of `block_size` bytes starting at
    /// `first`, so that `first` is served next and the last block of the
    /// run points to the previous head.
    ///
    /// # Safety
    ///
    /// The range `first .. first + count * block_size` must be unused
    /// memory aligned to [`crate::ALIGN`], and `block_size` a multiple of it.
    pub unsafe fn push_run(&mut self, first: NonNull<u8>, block_size: usize, count: usize) {
        if count == 0 {
            return;
        }
        let base = first.as_ptr();
        let mut next = self.head;
        for i in (0..count).rev() {
            let node = base.add(i * block_size).cast::<FreeNode>();
            node.write(FreeNode { next });
            next = Some(NonNull::new_unchecked(node));
        }
        self.head = next;
        self.len += count;
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}
