#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Cooperative round-robin threads for ARM Cortex-M.
//!
//! This library runs a fixed set of threads on a single ARMv7-M core
//! (Cortex-M3/M4/M7) without an operating system. Threads give up the
//! processor voluntarily; there is no timer and no preemption.
//!
//! # Target Platform
//!
//! - **Architecture**: ARMv7-M, `thumbv7m-none-eabi` / `thumbv7em-none-eabi`
//! - **Environment**: Bare-metal, privileged thread mode on the process stack
//! - **Host**: the scheduler runs against a simulated register file for tests
//!
//! # Features
//!
//! - `std-shim`: Build the simulated architecture on the host outside of tests
//! - `panic-handler`: Install a panic handler that masks interrupts and halts
//!
//! # Quick Start
//!
//! ```ignore
//! use svc_threads::{os_create_thread, os_kernel_initialize, os_kernel_start, os_yield};
//! use svc_threads::{KernelConfig, StackMemory};
//!
//! static mut STACKS: StackMemory<0x4000> = StackMemory::new();
//!
//! fn blink() -> ! {
//!     loop { /* toggle LED */ os_yield(); }
//! }
//!
//! #[cortex_m_rt::entry]
//! fn main() -> ! {
//!     let config = KernelConfig::for_memory(unsafe { &mut STACKS }, 0x200).unwrap();
//!     unsafe { os_kernel_initialize(config) };
//!     os_create_thread(blink);
//!     os_kernel_start()
//! }
//! ```
//!
//! # Architecture
//!
//! - `SVC #1` enters the first thread, `SVC #2` pends PendSV
//! - PendSV saves r4-r11 on the outgoing stack and restores the next thread's
//! - SVCall runs at a higher priority than PendSV, so a switch never
//!   interrupts a supervisor call

// Core modules
pub mod arch;
pub mod config;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod svc;
pub mod thread;

#[cfg(test)]
extern crate std;

// Panic handler for bare-metal
#[cfg(all(target_arch = "arm", feature = "panic-handler", not(test)))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // On panic, mask interrupts and halt
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::wfi();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{Arch, DefaultArch, SystemHandler};

// Configuration
pub use config::KernelConfig;

// Kernel
pub use kernel::{Kernel, KernelStats};

#[cfg(target_arch = "arm")]
pub use kernel::{os_create_thread, os_kernel_initialize, os_kernel_start, os_yield, DefaultKernel};

// Scheduler
pub use sched::{RoundRobinScheduler, Scheduler};

// Supervisor calls
pub use svc::{SvcOperand, SvcOutcome};

// Threads
pub use thread::{ThreadEntry, ThreadId, ThreadRecord, ThreadRegistry};

// Memory management
pub use mem::{StackAllocator, StackMemory, StackRegion};

// Errors
pub use errors::{ConfigError, KernelError, KernelResult, ScheduleError, SpawnError};

// ============================================================================
// Convenience Functions
// ============================================================================

/// Yield the current thread to the next one in round-robin order.
///
/// Cooperative: the calling thread stays runnable and resumes here once
/// every other thread has yielded.
#[cfg(target_arch = "arm")]
#[inline]
pub fn yield_now() {
    kernel::os_yield();
}
