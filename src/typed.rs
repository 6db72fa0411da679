//! Element-count allocator for containers.
//!
//! Containers ask for room for `n` values of `T` rather than for bytes.
//! [`TypedAllocator`] translates those requests onto a shared
//! [`ByteAllocator`], so several containers can draw from one pool.

use core::cell::RefCell;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use crate::{AllocError, AllocResult, ByteAllocator, ALIGN};

/// Allocates storage for values of `T` from a shared byte allocator.
pub struct TypedAllocator<'a, T, A: ByteAllocator> {
    pool: &'a RefCell<A>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, A: ByteAllocator> TypedAllocator<'a, T, A> {
    pub fn new(pool: &'a RefCell<A>) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// A typed view of the same pool for another element type.
    pub fn rebind<U>(&self) -> TypedAllocator<'a, U, A> {
        TypedAllocator::new(self.pool)
    }

    fn bytes_for(n: usize) -> AllocResult<usize> {
        if align_of::<T>() > ALIGN {
            return Err(AllocError::InvalidParam);
        }
        size_of::<T>()
            .checked_mul(n)
            .ok_or(AllocError::InvalidParam)
    }

    /// Uninitialized storage for `n` values.
    ///
    /// Zero-sized requests return a dangling, well-aligned pointer without
    /// touching the pool.
    pub fn allocate(&self, n: usize) -> AllocResult<NonNull<T>> {
        let bytes = Self::bytes_for(n)?;
        if bytes == 0 {
            return Ok(NonNull::dangling());
        }
        let ptr = self.pool.borrow_mut().allocate(bytes)?;
        Ok(ptr.cast())
    }

    /// Release storage obtained from [`TypedAllocator::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate(n)` on an allocator sharing this pool,
    /// with the same `n`, and any values in it must already be dropped.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let Ok(bytes) = Self::bytes_for(n) else {
            return;
        };
        if bytes == 0 {
            return;
        }
        self.pool.borrow_mut().deallocate(ptr.cast(), bytes);
    }

    pub fn allocate_one(&self) -> AllocResult<NonNull<T>> {
        self.allocate(1)
    }

    /// # Safety
    ///
    /// See [`TypedAllocator::deallocate`] with `n == 1`.
    pub unsafe fn deallocate_one(&self, ptr: NonNull<T>) {
        self.deallocate(ptr, 1);
    }
}

impl<T, A: ByteAllocator> Clone for TypedAllocator<'_, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A: ByteAllocator> Copy for TypedAllocator<'_, T, A> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PoolAllocator, SizeClass, SystemHeap};

    #[allow(dead_code)]
    #[repr(align(16))]
    struct Overaligned([u8; 16]);

    #[test]
    fn test_allocate_elements() {
        let pool = RefCell::new(PoolAllocator::new(SystemHeap));
        let ints = TypedAllocator::<u32, _>::new(&pool);

        let ptr = ints.allocate(10).unwrap();
        unsafe {
            for i in 0..10 {
                ptr.as_ptr().add(i).write(i as u32 * 3);
            }
            for i in 0..10 {
                assert_eq!(*ptr.as_ptr().add(i), i as u32 * 3);
            }
        }
        assert_eq!(pool.borrow().used_bytes(), 40);

        unsafe { ints.deallocate(ptr, 10) };
        assert_eq!(pool.borrow().used_bytes(), 0);
        assert_eq!(pool.borrow().free_blocks(SizeClass::from_bytes(40).unwrap()), crate::NOBJS);
    }

    #[test]
    fn test_shared_pool_between_types() {
        let pool = RefCell::new(PoolAllocator::new(SystemHeap));
        let longs = TypedAllocator::<u64, _>::new(&pool);
        let pairs = longs.rebind::<(u64, u64)>();

        let a = longs.allocate_one().unwrap();
        let b = pairs.allocate_one().unwrap();
        assert_ne!(a.cast::<u8>(), b.cast::<u8>());

        unsafe {
            longs.deallocate_one(a);
            pairs.deallocate_one(b);
        }
        // u64 is 8 bytes, the pair 16: two different classes. The u64
        // refill grew the arena by 320 bytes and left 160, so the pair
        // refill only carved 160 / 16 blocks without growing again.
        let stats = pool.borrow().stats();
        assert_eq!(stats.free_blocks[0], crate::NOBJS);
        assert_eq!(stats.free_blocks[1], 10);
        assert_eq!(stats.growths, 1);
        assert_eq!(stats.leftover_bytes, 0);
    }

    #[test]
    fn test_zero_sized_requests_skip_pool() {
        let pool = RefCell::new(PoolAllocator::new(SystemHeap));
        let units = TypedAllocator::<(), _>::new(&pool);
        let bytes = TypedAllocator::<u8, _>::new(&pool);

        let unit = units.allocate(100).unwrap();
        let empty = bytes.allocate(0).unwrap();
        unsafe {
            units.deallocate(unit, 100);
            bytes.deallocate(empty, 0);
        }
        assert_eq!(pool.borrow().heap_size(), 0);
    }

    #[test]
    fn test_rejects_overaligned_and_overflowing_requests() {
        let pool = RefCell::new(PoolAllocator::new(SystemHeap));

        let wide = TypedAllocator::<Overaligned, _>::new(&pool);
        assert_eq!(wide.allocate(1).err(), Some(AllocError::InvalidParam));

        let longs = TypedAllocator::<u64, _>::new(&pool);
        assert_eq!(longs.allocate(usize::MAX).err(), Some(AllocError::InvalidParam));
    }

    #[test]
    fn test_large_arrays_bypass_pool() {
        let pool = RefCell::new(PoolAllocator::new(SystemHeap));
        let longs = TypedAllocator::<u64, _>::new(&pool);

        let ptr = longs.allocate(1000).unwrap();
        assert_eq!(pool.borrow().stats().oversized_bytes_in_use, 8000);
        unsafe { longs.deallocate(ptr, 1000) };
        assert_eq!(pool.borrow().stats().oversized_bytes_in_use, 0);
        assert_eq!(pool.borrow().heap_size(), 0);
    }
}
