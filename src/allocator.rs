//! Best-fit Range Allocator
//!
//! A pure logical structure that does not hold GPU resources; it only hands
//! out row ranges of the shared bone texture.
//!
//! Requests are rounded up to the block granularity. The smallest free block
//! that fits is split and its remainder returned to the free map. Freed blocks
//! are never merged with their neighbours, so fragmentation is bounded by the
//! block size and the total capacity but not eliminated.

use std::collections::BTreeMap;

use smallvec::SmallVec;

/// Fixed-capacity best-fit allocator over `[0, total)`.
#[derive(Debug, Clone)]
pub struct BestFitAllocator {
    block_size: usize,
    total: usize,
    /// Free block starts grouped by block size
    free_blocks: BTreeMap<usize, SmallVec<[usize; 4]>>,
    allocated: usize,
}

impl BestFitAllocator {
    /// Creates an allocator with a single free block covering `total` rows.
    #[must_use]
    pub fn new(block_size: usize, total: usize) -> Self {
        let mut allocator = Self {
            block_size: block_size.max(1),
            total,
            free_blocks: BTreeMap::new(),
            allocated: 0,
        };
        allocator.reset();
        allocator
    }

    /// Releases every allocation.
    pub fn reset(&mut self) {
        self.free_blocks.clear();
        self.allocated = 0;
        if self.total > 0 {
            self.add_free_block(0, self.total);
        }
    }

    /// Rounds `size` up to the block granularity.
    #[inline]
    #[must_use]
    pub fn aligned_size(&self, size: usize) -> usize {
        size.div_ceil(self.block_size) * self.block_size
    }

    /// Reserves `size` rows, returning the first row index.
    ///
    /// Returns `None` when `size` is zero, exceeds the total capacity or no
    /// free block is large enough.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 || size > self.total {
            return None;
        }
        let aligned = self.aligned_size(size);

        // Smallest block >= aligned; an exact size is naturally the first hit.
        let block_size = *self.free_blocks.range(aligned..).next()?.0;
        let starts = self.free_blocks.get_mut(&block_size)?;
        let index = starts.pop()?;
        if starts.is_empty() {
            self.free_blocks.remove(&block_size);
        }

        if block_size > aligned {
            self.add_free_block(index + aligned, block_size - aligned);
        }

        self.allocated += aligned;
        log::trace!("Bone texture: allocated {aligned} rows at {index}");
        Some(index)
    }

    /// Returns a range obtained from [`allocate`](Self::allocate).
    ///
    /// Out of range indices are ignored.
    pub fn free(&mut self, index: usize, size: usize) {
        if index >= self.total || size == 0 {
            return;
        }
        let aligned = self.aligned_size(size).min(self.total - index);
        self.add_free_block(index, aligned);
        self.allocated = self.allocated.saturating_sub(aligned);
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Rows currently handed out.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Number of distinct free blocks; grows with fragmentation.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        self.free_blocks.values().map(SmallVec::len).sum()
    }

    /// Size of the largest free block.
    #[must_use]
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks.keys().next_back().copied().unwrap_or(0)
    }

    fn add_free_block(&mut self, index: usize, size: usize) {
        self.free_blocks.entry(size).or_default().push(index);
    }
}

impl Default for BestFitAllocator {
    fn default() -> Self {
        Self::new(
            crate::settings::DEFAULT_BONE_BLOCK_SIZE,
            crate::settings::DEFAULT_BONE_TEXTURE_SIZE * crate::settings::DEFAULT_BONE_TEXTURE_SIZE,
        )
    }
}
