//! Scheduler trait definition.

use crate::thread::ThreadId;

/// Scheduling policy consulted on every context switch.
///
/// The scheduler only tracks *which* thread is active; saving and restoring
/// stack pointers is the kernel's job. All methods run inside the
/// context-switch handler or before the first thread is started, so no
/// internal synchronization is required.
pub trait Scheduler {
    /// Begin scheduling over the first `running` registered threads.
    ///
    /// Returns the thread to enter first, or `None` if `running` is zero.
    fn start(&mut self, running: usize) -> Option<ThreadId>;

    /// Pick the thread to switch to, making it the active one.
    ///
    /// Returns `None` if the scheduler has not been started.
    fn pick_next(&mut self) -> Option<ThreadId>;

    /// Currently active thread, if scheduling has started.
    fn active(&self) -> Option<ThreadId>;

    /// Number of threads being scheduled.
    fn running(&self) -> usize;

    /// Forget all scheduling state.
    fn reset(&mut self);
}
