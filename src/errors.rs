//! Error types for the kernel.
//!
//! Only [`SpawnError`] is expected at runtime on a correctly configured
//! board; the others catch misuse that would otherwise corrupt a thread's
//! execution state.

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Top-level error type for all kernel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Thread registration errors
    Spawn(SpawnError),
    /// Scheduling errors
    Schedule(ScheduleError),
    /// Configuration errors
    Config(ConfigError),
}

/// Errors that can occur while registering a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// `initialize()` has not been called on the kernel
    NotInitialized,
    /// The stack pool has no room for another stack
    StackPoolExhausted,
    /// Every slot of the thread registry is populated
    RegistryFull,
}

impl SpawnError {
    /// Whether this is an allocation failure (pool exhausted or registry full).
    pub fn is_allocation_failure(self) -> bool {
        matches!(self, SpawnError::StackPoolExhausted | SpawnError::RegistryFull)
    }
}

/// Errors related to scheduling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The scheduler has not been launched yet
    NotStarted,
    /// No thread has been registered
    NoThreadsAvailable,
    /// The scheduler selected an index with no thread record
    UnknownThread(usize),
}

/// Errors detected while validating a [`KernelConfig`](crate::config::KernelConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stack size is zero
    ZeroStackSize,
    /// Stack size is not a multiple of the stack alignment
    MisalignedStackSize(usize),
    /// Stack size cannot hold the initial register frame
    StackTooSmall(usize),
    /// Pool top is not aligned to the stack alignment
    MisalignedPoolTop(usize),
    /// Pool cannot hold a single stack
    PoolTooSmall,
    /// Pool would extend below address zero
    PoolUnderflow,
    /// Implemented priority bits outside 1..=8
    InvalidPriorityBits(u8),
    /// SVCall would not preempt PendSV
    PriorityInversion {
        /// Requested SVCall priority
        svcall: u8,
        /// Requested PendSV priority
        pendsv: u8,
    },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
            KernelError::Schedule(e) => write!(f, "Scheduling error: {}", e),
            KernelError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::NotInitialized => write!(f, "Kernel not initialized"),
            SpawnError::StackPoolExhausted => write!(f, "Stack pool exhausted"),
            SpawnError::RegistryFull => write!(f, "Thread registry is full"),
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::NotStarted => write!(f, "Scheduler has not been started"),
            ScheduleError::NoThreadsAvailable => write!(f, "No threads registered"),
            ScheduleError::UnknownThread(index) => write!(f, "No thread at index {}", index),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroStackSize => write!(f, "Stack size must be non-zero"),
            ConfigError::MisalignedStackSize(size) => {
                write!(f, "Stack size {:#x} is not 8-byte aligned", size)
            }
            ConfigError::StackTooSmall(size) => {
                write!(f, "Stack size {:#x} cannot hold the initial frame", size)
            }
            ConfigError::MisalignedPoolTop(addr) => {
                write!(f, "Pool top {:#x} is not 8-byte aligned", addr)
            }
            ConfigError::PoolTooSmall => write!(f, "Pool cannot hold a single stack"),
            ConfigError::PoolUnderflow => write!(f, "Pool extends below address zero"),
            ConfigError::InvalidPriorityBits(bits) => {
                write!(f, "Invalid number of priority bits: {}", bits)
            }
            ConfigError::PriorityInversion { svcall, pendsv } => write!(
                f,
                "SVCall priority {:#04x} does not preempt PendSV priority {:#04x}",
                svcall, pendsv
            ),
        }
    }
}

impl From<SpawnError> for KernelError {
    fn from(error: SpawnError) -> Self {
        KernelError::Spawn(error)
    }
}

impl From<ScheduleError> for KernelError {
    fn from(error: ScheduleError) -> Self {
        KernelError::Schedule(error)
    }
}

impl From<ConfigError> for KernelError {
    fn from(error: ConfigError) -> Self {
        KernelError::Config(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_allocation_failure_family() {
        assert!(SpawnError::StackPoolExhausted.is_allocation_failure());
        assert!(SpawnError::RegistryFull.is_allocation_failure());
        assert!(!SpawnError::NotInitialized.is_allocation_failure());
    }

    #[test]
    fn test_display_wraps_inner_error() {
        let err: KernelError = SpawnError::RegistryFull.into();
        assert_eq!(err.to_string(), "Thread spawn error: Thread registry is full");

        let err: KernelError = ConfigError::PriorityInversion { svcall: 0xFE, pendsv: 0xFD }.into();
        assert_eq!(
            err.to_string(),
            "Configuration error: SVCall priority 0xfe does not preempt PendSV priority 0xfd"
        );
    }
}
