//! Stack pool allocator for thread stacks.
//!
//! Stacks are carved from the top of a bounded pool downwards, one fixed
//! unit at a time. Nothing is ever returned to the pool: threads live for
//! as long as the system runs.

use crate::config::{KernelConfig, STACK_ALIGN};
use crate::errors::SpawnError;

/// Address range `[base, top)` of one thread stack. The stack grows down
/// from `top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    base: usize,
    top: usize,
}

impl StackRegion {
    pub const fn new(base: usize, top: usize) -> Self {
        Self { base, top }
    }

    /// Lowest address of the region.
    pub const fn base(&self) -> usize {
        self.base
    }

    /// One past the highest address; the initial stack pointer.
    pub const fn top(&self) -> usize {
        self.top
    }

    pub const fn size(&self) -> usize {
        self.top - self.base
    }

    /// Whether `addr` is a valid stack pointer for this region.
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr <= self.top
    }

    /// Whether two regions share any byte.
    pub const fn overlaps(&self, other: &StackRegion) -> bool {
        self.base < other.top && other.base < self.top
    }
}

/// Bump-down allocator over the configured stack pool.
#[derive(Debug, Clone)]
pub struct StackAllocator {
    /// Lowest address handed out so far (pool top when nothing is allocated)
    next_free_boundary: usize,
    /// Lowest address of the pool
    pool_limit: usize,
    pool_top: usize,
    stack_size: usize,
}

impl StackAllocator {
    /// Create an allocator over the pool described by `config`.
    pub const fn new(config: &KernelConfig) -> Self {
        Self {
            next_free_boundary: config.pool_top(),
            pool_limit: config.pool_limit(),
            pool_top: config.pool_top(),
            stack_size: config.stack_size(),
        }
    }

    /// Carve the next stack.
    ///
    /// On failure the boundary is left where it was.
    pub fn allocate(&mut self) -> Result<StackRegion, SpawnError> {
        let candidate = self
            .next_free_boundary
            .checked_sub(self.stack_size)
            .filter(|&candidate| candidate >= self.pool_limit)
            .ok_or(SpawnError::StackPoolExhausted)?;

        let region = StackRegion::new(candidate, self.next_free_boundary);
        self.next_free_boundary = candidate;
        debug_assert_eq!(region.top() % STACK_ALIGN, 0);
        Ok(region)
    }

    /// Return the boundary to the top of the pool.
    pub fn reset(&mut self) {
        self.next_free_boundary = self.pool_top;
    }

    /// Current allocation boundary.
    pub fn boundary(&self) -> usize {
        self.next_free_boundary
    }

    /// Number of stacks handed out since the last reset.
    pub fn allocated(&self) -> usize {
        (self.pool_top - self.next_free_boundary) / self.stack_size
    }

    /// Number of stacks that can still be handed out.
    pub fn remaining(&self) -> usize {
        (self.next_free_boundary - self.pool_limit) / self.stack_size
    }
}

/// Statically allocated, 8-byte aligned backing memory for a stack pool.
///
/// ```ignore
/// static mut STACKS: StackMemory<0x4000> = StackMemory::new();
/// ```
#[repr(C, align(8))]
pub struct StackMemory<const BYTES: usize> {
    data: [u8; BYTES],
}

impl<const BYTES: usize> StackMemory<BYTES> {
    pub const fn new() -> Self {
        Self { data: [0; BYTES] }
    }

    /// One past the last byte of the buffer.
    pub fn top(&mut self) -> usize {
        self.data.as_mut_ptr() as usize + BYTES
    }

    pub const fn size(&self) -> usize {
        BYTES
    }
}

impl<const BYTES: usize> Default for StackMemory<BYTES> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{POOL_SIZE, STACK_SIZE};
    use std::vec::Vec;

    const TOP: usize = 0x2002_0000;

    fn allocator(pool_size: usize, stack_size: usize) -> StackAllocator {
        let config = KernelConfig::new(TOP, pool_size, stack_size).unwrap();
        StackAllocator::new(&config)
    }

    #[test]
    fn test_classic_pool_holds_32_stacks() {
        let mut alloc = allocator(POOL_SIZE, STACK_SIZE);
        let mut regions = Vec::new();

        for i in 0..32 {
            let region = alloc.allocate().expect("pool should hold 32 stacks");
            assert_eq!(region.top(), TOP - i * 0x200);
            assert_eq!(region.size(), 0x200);
            regions.push(region);
        }

        let boundary = alloc.boundary();
        assert_eq!(alloc.allocate(), Err(SpawnError::StackPoolExhausted));
        assert_eq!(alloc.boundary(), boundary);
        assert_eq!(alloc.remaining(), 0);
        assert_eq!(alloc.allocated(), 32);

        for (i, a) in regions.iter().enumerate() {
            assert!(a.base() >= TOP - POOL_SIZE);
            for b in &regions[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_exhaustion_is_sticky_until_reset() {
        let mut alloc = allocator(0x400, 0x200);
        alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        assert!(alloc.allocate().is_err());
        assert!(alloc.allocate().is_err());

        alloc.reset();
        assert_eq!(alloc.remaining(), 2);
        assert_eq!(alloc.allocate().unwrap().top(), TOP);
    }

    #[test]
    fn test_pool_ending_at_address_zero() {
        let config = KernelConfig::new(0x400, 0x400, 0x200).unwrap();
        let mut alloc = StackAllocator::new(&config);
        assert_eq!(alloc.allocate().unwrap(), StackRegion::new(0x200, 0x400));
        assert_eq!(alloc.allocate().unwrap(), StackRegion::new(0, 0x200));
        assert_eq!(alloc.allocate(), Err(SpawnError::StackPoolExhausted));
    }

    #[test]
    fn test_region_overlap() {
        let a = StackRegion::new(0x100, 0x200);
        assert!(a.overlaps(&StackRegion::new(0x1F0, 0x300)));
        assert!(!a.overlaps(&StackRegion::new(0x200, 0x300)));
        assert!(a.contains(0x200));
        assert!(!a.contains(0x201));
    }

    #[test]
    fn test_stack_memory_alignment() {
        let mut memory: std::boxed::Box<StackMemory<0x400>> = std::boxed::Box::new(StackMemory::new());
        assert_eq!(memory.top() % STACK_ALIGN, 0);
        assert_eq!(memory.size(), 0x400);
    }
}
