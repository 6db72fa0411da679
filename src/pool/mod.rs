//! Free-list pool allocator.
//!
//! This module implements the small-object pool: per-size-class free lists
//! refilled in batches from a growable chunk arena.

pub mod chunk_arena;
pub mod free_list;
pub mod pool_allocator;
pub mod stats;

// Re-export public types
pub use pool_allocator::PoolAllocator;
pub use stats::PoolStats;
