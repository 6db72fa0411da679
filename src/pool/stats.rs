//! Statistics and exhaustion reporting for the pool allocator.

use crate::size_class::SizeClass;
use crate::NFREELISTS;

/// Snapshot of the pool's accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Arena bytes ever acquired from the system allocator.
    pub heap_size: usize,
    /// Number of chunks acquired.
    pub growths: usize,
    /// Bytes in the arena not yet carved.
    pub leftover_bytes: usize,
    /// Free blocks per size class.
    pub free_blocks: [usize; NFREELISTS],
    /// Pooled bytes handed out, counted at class size.
    pub pooled_bytes_in_use: usize,
    /// Oversized bytes handed out by the system allocator.
    pub oversized_bytes_in_use: usize,
}

impl PoolStats {
    /// Bytes resident in all free lists.
    pub fn free_list_bytes(&self) -> usize {
        SizeClass::all()
            .map(|class| self.free_blocks[class.to_index()] * class.size())
            .sum()
    }

    /// Every arena byte is either handed out, on a free list, or in the leftover.
    pub fn is_conserved(&self) -> bool {
        self.heap_size == self.pooled_bytes_in_use + self.free_list_bytes() + self.leftover_bytes
    }
}

/// Logs the pool state when a request cannot be served.
pub struct ExhaustionReporter;

impl ExhaustionReporter {
    #[allow(unused_variables)]
    pub fn print_exhaustion_stats(stats: &PoolStats, request_bytes: usize) {
        #[cfg(feature = "log")]
        use log::error;
        error!("========================================");
        error!("Pool exhausted serving a {} byte block", request_bytes);
        error!(
            "  Heap size: {} bytes in {} chunks",
            stats.heap_size, stats.growths
        );
        error!("  Leftover: {} bytes", stats.leftover_bytes);
        error!(
            "  In use: {} pooled bytes, {} oversized bytes",
            stats.pooled_bytes_in_use, stats.oversized_bytes_in_use
        );
        error!("  Free blocks by class:");
        for class in SizeClass::all() {
            let count = stats.free_blocks[class.to_index()];
            if count > 0 {
                error!(
                    "    {} bytes: {} blocks ({} bytes total)",
                    class.size(),
                    count,
                    count * class.size()
                );
            }
        }
        error!("========================================");
    }
}
