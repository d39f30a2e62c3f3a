//! Kernel configuration.
//!
//! The defaults are the classic board layout: a 16 KiB pool cut into
//! 512-byte stacks, with SVCall one priority step above PendSV at the
//! weak end of the priority range.

use crate::errors::ConfigError;
use crate::mem::StackMemory;
use crate::thread::frame::INITIAL_FRAME_BYTES;

/// Bytes per thread stack.
pub const STACK_SIZE: usize = 0x200;

/// Bytes in the stack pool.
pub const POOL_SIZE: usize = 0x4000;

/// Threads that fit in the default pool.
pub const DEFAULT_CAPACITY: usize = POOL_SIZE / STACK_SIZE;

/// Stack pointer alignment required at exception entry.
pub const STACK_ALIGN: usize = 8;

/// Default SVCall priority.
pub const SVCALL_PRIORITY: u8 = 0xFD;

/// Default PendSV priority.
pub const PENDSV_PRIORITY: u8 = 0xFE;

/// Where the stack pool lives and how the system handlers are prioritized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pool_top: usize,
    pool_size: usize,
    stack_size: usize,
    svcall_priority: u8,
    pendsv_priority: u8,
    priority_bits: u8,
}

impl KernelConfig {
    /// Configure a pool `[pool_top - pool_size, pool_top)` cut into
    /// `stack_size` stacks, with the default priorities.
    ///
    /// The first stack ends exactly at `pool_top`, so the pool must not
    /// overlap the main stack: `pool_top` cannot be the live MSP.
    pub fn new(pool_top: usize, pool_size: usize, stack_size: usize) -> Result<Self, ConfigError> {
        let config = Self {
            pool_top,
            pool_size,
            stack_size,
            svcall_priority: SVCALL_PRIORITY,
            pendsv_priority: PENDSV_PRIORITY,
            priority_bits: 8,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configure a pool backed by `memory`.
    pub fn for_memory<const BYTES: usize>(
        memory: &'static mut StackMemory<BYTES>,
        stack_size: usize,
    ) -> Result<Self, ConfigError> {
        Self::new(memory.top(), BYTES, stack_size)
    }

    /// Override the SVCall and PendSV priorities.
    pub fn with_priorities(mut self, svcall: u8, pendsv: u8) -> Result<Self, ConfigError> {
        self.svcall_priority = svcall;
        self.pendsv_priority = pendsv;
        self.validate()?;
        Ok(self)
    }

    /// Declare how many priority bits the part implements (`__NVIC_PRIO_BITS`).
    pub fn with_priority_bits(mut self, bits: u8) -> Result<Self, ConfigError> {
        self.priority_bits = bits;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size == 0 {
            return Err(ConfigError::ZeroStackSize);
        }
        if self.stack_size % STACK_ALIGN != 0 {
            return Err(ConfigError::MisalignedStackSize(self.stack_size));
        }
        if self.stack_size < INITIAL_FRAME_BYTES {
            return Err(ConfigError::StackTooSmall(self.stack_size));
        }
        if self.pool_top % STACK_ALIGN != 0 {
            return Err(ConfigError::MisalignedPoolTop(self.pool_top));
        }
        if self.pool_size < self.stack_size {
            return Err(ConfigError::PoolTooSmall);
        }
        if self.pool_top < self.pool_size {
            return Err(ConfigError::PoolUnderflow);
        }
        if !(1..=8).contains(&self.priority_bits) {
            return Err(ConfigError::InvalidPriorityBits(self.priority_bits));
        }

        // Unimplemented low-order bits read as zero, so compare what the
        // hardware will actually hold.
        let mask = 0xFFu8 << (8 - self.priority_bits);
        if self.svcall_priority & mask >= self.pendsv_priority & mask {
            return Err(ConfigError::PriorityInversion {
                svcall: self.svcall_priority,
                pendsv: self.pendsv_priority,
            });
        }
        Ok(())
    }

    pub const fn pool_top(&self) -> usize {
        self.pool_top
    }

    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Lowest address of the pool.
    pub const fn pool_limit(&self) -> usize {
        self.pool_top - self.pool_size
    }

    pub const fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Number of stacks the pool holds.
    pub const fn capacity(&self) -> usize {
        self.pool_size / self.stack_size
    }

    pub const fn svcall_priority(&self) -> u8 {
        self.svcall_priority
    }

    pub const fn pendsv_priority(&self) -> u8 {
        self.pendsv_priority
    }

    pub const fn priority_bits(&self) -> u8 {
        self.priority_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP: usize = 0x2002_0000;

    #[test]
    fn test_default_layout() {
        let config = KernelConfig::new(TOP, POOL_SIZE, STACK_SIZE).unwrap();
        assert_eq!(config.capacity(), 32);
        assert_eq!(DEFAULT_CAPACITY, 32);
        assert_eq!(config.pool_limit(), TOP - 0x4000);
        assert!(config.svcall_priority() < config.pendsv_priority());
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert_eq!(KernelConfig::new(TOP, POOL_SIZE, 0), Err(ConfigError::ZeroStackSize));
        assert_eq!(
            KernelConfig::new(TOP, POOL_SIZE, 0x204),
            Err(ConfigError::MisalignedStackSize(0x204))
        );
        assert_eq!(KernelConfig::new(TOP, POOL_SIZE, 8), Err(ConfigError::StackTooSmall(8)));
        assert_eq!(
            KernelConfig::new(TOP + 4, POOL_SIZE, STACK_SIZE),
            Err(ConfigError::MisalignedPoolTop(TOP + 4))
        );
        assert_eq!(KernelConfig::new(TOP, 0x100, STACK_SIZE), Err(ConfigError::PoolTooSmall));
        assert_eq!(KernelConfig::new(0x2000, POOL_SIZE, STACK_SIZE), Err(ConfigError::PoolUnderflow));
    }

    #[test]
    fn test_priority_order_enforced() {
        let config = KernelConfig::new(TOP, POOL_SIZE, STACK_SIZE).unwrap();
        assert!(config.with_priorities(0x80, 0xFF).is_ok());
        assert_eq!(
            config.with_priorities(0xFE, 0xFD),
            Err(ConfigError::PriorityInversion { svcall: 0xFE, pendsv: 0xFD })
        );
        assert!(config.with_priorities(0xFE, 0xFE).is_err());
    }

    #[test]
    fn test_priorities_compared_at_implemented_width() {
        let config = KernelConfig::new(TOP, POOL_SIZE, STACK_SIZE).unwrap();
        // 0xFD and 0xFE collapse to 0xF0 on a 4-bit part
        assert!(config.with_priority_bits(4).is_err());

        let config = config.with_priorities(0xE0, 0xF0).unwrap().with_priority_bits(4).unwrap();
        assert_eq!(config.priority_bits(), 4);
        assert_eq!(config.with_priority_bits(0), Err(ConfigError::InvalidPriorityBits(0)));
    }
}
