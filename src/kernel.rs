//! Kernel abstraction for managing the threading system.
//!
//! This module provides the main `Kernel` struct that owns every piece of
//! scheduler state: the stack allocator, the thread registry and the
//! round-robin cursor. Operations take the kernel by reference, so any
//! number of independent kernels can exist on the host.
//!
//! # Lifecycle
//!
//! ```text
//! initialize()      priorities + allocator/registry reset
//! register(entry)   x N: carve stack, build frame, append record
//! launch()          PSP = first frame
//! SVC #1            enter thread 0
//! SVC #2            pend PendSV -> context_switch()
//! ```

use crate::arch::sim::SimArch;
use crate::arch::{Arch, SystemHandler};
use crate::config::{KernelConfig, DEFAULT_CAPACITY};
use crate::errors::{ScheduleError, SpawnError};
use crate::mem::StackAllocator;
use crate::sched::{RoundRobinScheduler, Scheduler};
use crate::svc::{self, SvcOperand, SvcOutcome};
use crate::thread::frame::{self, SOFTWARE_FRAME_BYTES};
use crate::thread::{ThreadEntry, ThreadId, ThreadRecord, ThreadRegistry};

/// Main kernel handle that manages the threading system.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
/// * `S` - Scheduler implementation
/// * `N` - Number of thread registry slots
pub struct Kernel<A: Arch, S: Scheduler = RoundRobinScheduler, const N: usize = DEFAULT_CAPACITY> {
    arch: A,
    config: KernelConfig,
    allocator: StackAllocator,
    registry: ThreadRegistry<N>,
    scheduler: S,
    initialized: bool,
    context_switches: u64,
}

/// Snapshot of kernel bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStats {
    /// Threads in the registry
    pub registered: usize,
    /// Threads the kernel can hold
    pub capacity: usize,
    /// Threads the scheduler rotates over
    pub running: usize,
    /// Currently active thread
    pub active: Option<ThreadId>,
    /// Context switches performed since start
    pub context_switches: u64,
}

impl<A: Arch, S: Scheduler, const N: usize> Kernel<A, S, N> {
    /// Create a new kernel instance.
    ///
    /// # Safety
    ///
    /// The stack pool described by `config` must be writable memory that
    /// nothing but this kernel's threads will ever use.
    pub unsafe fn new(arch: A, scheduler: S, config: KernelConfig) -> Self {
        Self {
            arch,
            allocator: StackAllocator::new(&config),
            config,
            registry: ThreadRegistry::new(),
            scheduler,
            initialized: false,
            context_switches: 0,
        }
    }

    /// Initialize the kernel.
    ///
    /// Empties the stack pool and the registry, and gives SVCall a higher
    /// priority than PendSV so a pended switch never runs in the middle of a
    /// supervisor call. Must not be called once threads are running.
    pub fn initialize(&mut self) {
        self.allocator.reset();
        self.registry.clear();
        self.scheduler.reset();
        self.context_switches = 0;

        self.arch
            .set_system_priority(SystemHandler::PendSv, self.config.pendsv_priority());
        self.arch
            .set_system_priority(SystemHandler::SvCall, self.config.svcall_priority());
        self.initialized = true;

        log::debug!(
            "kernel: initialized, pool {:#x}..{:#x}, {} stacks of {:#x} bytes, SVCall {:#04x}, PendSV {:#04x}",
            self.config.pool_limit(),
            self.config.pool_top(),
            self.capacity(),
            self.config.stack_size(),
            self.config.svcall_priority(),
            self.config.pendsv_priority()
        );
    }

    /// Check if the kernel has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Register a thread that starts at `entry`.
    ///
    /// A failed registration leaves the registry and the stack pool exactly
    /// as they were and is reported through the log.
    pub fn register(&mut self, entry: ThreadEntry) -> Result<ThreadId, SpawnError> {
        self.try_register(entry).map_err(|error| {
            log::warn!("kernel: thread registration failed: {}", error);
            error
        })
    }

    fn try_register(&mut self, entry: ThreadEntry) -> Result<ThreadId, SpawnError> {
        if !self.initialized {
            return Err(SpawnError::NotInitialized);
        }
        // Checked before allocating so a full registry never consumes a stack
        if self.registry.is_full() {
            return Err(SpawnError::RegistryFull);
        }

        let stack = self.allocator.allocate()?;
        // Safety: the region was just carved from the pool `new` was given
        // and belongs to no other thread.
        let sp = unsafe { frame::build_initial_frame(stack.top(), entry) };
        let id = self.registry.push(ThreadRecord::new(sp, entry, stack))?;

        log::debug!(
            "kernel: thread {} registered, stack {:#x}..{:#x}, sp {:#x}",
            id.index(),
            stack.base(),
            stack.top(),
            sp
        );
        Ok(id)
    }

    /// Hand every registered thread to the scheduler and point PSP at the
    /// first one's initial frame.
    pub fn launch(&mut self) -> Result<ThreadId, ScheduleError> {
        let first = self
            .scheduler
            .start(self.registry.len())
            .ok_or(ScheduleError::NoThreadsAvailable)?;
        let sp = self.record(first)?.sp;
        // Safety: `sp` addresses the initial frame built at registration.
        unsafe { self.arch.write_psp(sp) };
        Ok(first)
    }

    /// Dispatch a supervisor call against this kernel's architecture.
    pub fn supervisor_call(&mut self, operand: u8) -> SvcOutcome {
        svc::dispatch(&mut self.arch, operand)
    }

    /// Switch to the next thread. This is the body of the PendSV handler.
    ///
    /// PSP holds the active thread's hardware frame with r4-r11 stored in the
    /// eight words below it; afterwards PSP addresses the next thread's
    /// hardware frame in the same way.
    pub fn context_switch(&mut self) -> Result<ThreadId, ScheduleError> {
        let current = self.scheduler.active().ok_or(ScheduleError::NotStarted)?;
        let saved = self.arch.read_psp().wrapping_sub(SOFTWARE_FRAME_BYTES);
        self.record_mut(current)?.sp = saved;

        let next = self.scheduler.pick_next().ok_or(ScheduleError::NotStarted)?;
        let sp = self.record(next)?.sp;
        // Safety: `sp` is an initial frame or a context saved by this function.
        unsafe { self.arch.write_psp(sp.wrapping_add(SOFTWARE_FRAME_BYTES)) };

        self.context_switches = self.context_switches.wrapping_add(1);
        log::trace!("kernel: switch {} -> {}", current.index(), next.index());
        Ok(next)
    }

    fn record(&self, id: ThreadId) -> Result<&ThreadRecord, ScheduleError> {
        self.registry
            .get(id)
            .ok_or(ScheduleError::UnknownThread(id.index()))
    }

    fn record_mut(&mut self, id: ThreadId) -> Result<&mut ThreadRecord, ScheduleError> {
        self.registry
            .get_mut(id)
            .ok_or(ScheduleError::UnknownThread(id.index()))
    }

    /// Record of a registered thread.
    pub fn thread(&self, id: ThreadId) -> Option<&ThreadRecord> {
        self.registry.get(id)
    }

    /// Currently active thread, once started.
    pub fn active_thread(&self) -> Option<ThreadId> {
        self.scheduler.active()
    }

    /// Number of registered threads.
    pub fn thread_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of threads this kernel can register.
    pub fn capacity(&self) -> usize {
        self.registry.capacity().min(self.config.capacity())
    }

    pub fn stats(&self) -> KernelStats {
        KernelStats {
            registered: self.registry.len(),
            capacity: self.capacity(),
            running: self.scheduler.running(),
            active: self.scheduler.active(),
            context_switches: self.context_switches,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn allocator(&self) -> &StackAllocator {
        &self.allocator
    }

    pub fn arch(&self) -> &A {
        &self.arch
    }

    pub fn arch_mut(&mut self) -> &mut A {
        &mut self.arch
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

// The hardware handlers only ever switch the global kernel, so starting and
// yielding a standalone kernel is limited to the simulator. On hardware use
// `os_kernel_start` and `os_yield`.
impl<S: Scheduler, const N: usize> Kernel<SimArch, S, N> {
    /// Launch the scheduler and trap into the first thread.
    pub fn start(&mut self) -> Result<(), ScheduleError> {
        self.launch()?;
        self.arch.trap(SvcOperand::Start);
        Ok(())
    }

    /// Give up the processor to the next thread.
    pub fn yield_now(&mut self) {
        self.arch.trap(SvcOperand::Yield);
    }

    /// Deliver a pending supervisor call and then a pending PendSV, the
    /// order the exception priorities impose on hardware.
    pub fn service_exceptions(&mut self) -> Result<Option<SvcOutcome>, ScheduleError> {
        let outcome = self
            .arch
            .take_trap()
            .map(|operand| svc::dispatch(&mut self.arch, operand));
        if self.arch.take_pendsv() {
            self.context_switch()?;
        }
        Ok(outcome)
    }
}

/// Context switch for the PendSV handler, which has nowhere to return an
/// error to.
#[cfg_attr(not(target_arch = "arm"), allow(dead_code))]
fn switch_logged<A: Arch, S: Scheduler, const N: usize>(
    kernel: Option<&mut Kernel<A, S, N>>,
) -> Option<ThreadId> {
    let Some(kernel) = kernel else {
        log::error!("kernel: context switch failed: not initialized");
        return None;
    };
    kernel
        .context_switch()
        .map_err(|error| log::error!("kernel: context switch failed: {}", error))
        .ok()
}

// ============================================================================
// Global kernel for the exception handlers (hardware only)
// ============================================================================

#[cfg(target_arch = "arm")]
pub use self::global::{os_create_thread, os_kernel_initialize, os_kernel_start, os_yield, DefaultKernel};

#[cfg(target_arch = "arm")]
pub(crate) use self::global::switch_global;

#[cfg(target_arch = "arm")]
mod global {
    use super::Kernel;
    use crate::arch::{Arch, DefaultArch};
    use crate::config::{KernelConfig, DEFAULT_CAPACITY};
    use crate::errors::SpawnError;
    use crate::sched::DefaultScheduler;
    use crate::svc::SvcOperand;
    use crate::thread::ThreadEntry;
    use portable_atomic::{AtomicBool, Ordering};

    /// Kernel type behind the `os_*` functions.
    pub type DefaultKernel = Kernel<DefaultArch, DefaultScheduler, DEFAULT_CAPACITY>;

    static GLOBAL_KERNEL: spin::Mutex<Option<DefaultKernel>> = spin::Mutex::new(None);

    /// Set once the first thread has been entered.
    static STARTED: AtomicBool = AtomicBool::new(false);

    /// Create and initialize the global kernel.
    ///
    /// Ignored, with an error logged, once the kernel has started.
    ///
    /// # Safety
    ///
    /// The stack pool described by `config` must be memory reserved for
    /// thread stacks.
    pub unsafe fn os_kernel_initialize(config: KernelConfig) {
        if STARTED.load(Ordering::Acquire) {
            log::error!("kernel: initialize called after start, ignoring");
            return;
        }
        let mut kernel = unsafe { Kernel::new(DefaultArch::new(), DefaultScheduler::new(), config) };
        kernel.initialize();
        *GLOBAL_KERNEL.lock() = Some(kernel);
    }

    /// Register a thread with the global kernel. Returns `false` (and logs
    /// the reason) if the stack pool or the registry is exhausted.
    pub fn os_create_thread(entry: ThreadEntry) -> bool {
        match GLOBAL_KERNEL.lock().as_mut() {
            Some(kernel) => kernel.register(entry).is_ok(),
            None => {
                log::warn!("kernel: thread registration failed: {}", SpawnError::NotInitialized);
                false
            }
        }
    }

    /// Start running threads. Never returns.
    pub fn os_kernel_start() -> ! {
        // The lock must be released before trapping: the handlers take it.
        let launched = GLOBAL_KERNEL.lock().as_mut().map(|kernel| kernel.launch());
        match launched {
            Some(Ok(_)) => {
                STARTED.store(true, Ordering::Release);
                DefaultArch::new().trap(SvcOperand::Start);
            }
            Some(Err(error)) => log::error!("kernel: cannot start: {}", error),
            None => log::error!("kernel: cannot start: not initialized"),
        }
        loop {
            cortex_m::asm::wfi();
        }
    }

    /// Yield the processor to the next thread.
    pub fn os_yield() {
        DefaultArch::new().trap(SvcOperand::Yield);
    }

    /// Run the scheduler from PendSV.
    ///
    /// Threads only hold the lock before the kernel starts, so a failed
    /// `try_lock` just skips this switch.
    pub(crate) fn switch_global() {
        let Some(mut guard) = GLOBAL_KERNEL.try_lock() else {
            log::trace!("kernel: kernel busy, switch skipped");
            return;
        };
        super::switch_logged(guard.as_mut());
    }
}
