//! Thread records and the fixed-capacity registry that owns them.

pub mod frame;
pub mod registry;

pub use frame::ThreadEntry;
pub use registry::ThreadRegistry;

use crate::mem::StackRegion;

/// Index of a thread in the registry, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    /// Create a thread ID from a registry index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Registry index of this thread.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Saved stack pointer and entry function of one thread.
///
/// `sp` is written once by the frame builder and afterwards only by the
/// context switch, when the thread is switched out.
#[derive(Debug, Clone, Copy)]
pub struct ThreadRecord {
    /// Stack pointer addressing the thread's saved software frame
    pub sp: usize,
    /// Function the thread was started at
    pub entry: ThreadEntry,
    /// Stack region carved for the thread
    pub stack: StackRegion,
}

impl ThreadRecord {
    /// Create a record for a thread whose initial frame is at `sp`.
    pub const fn new(sp: usize, entry: ThreadEntry, stack: StackRegion) -> Self {
        Self { sp, entry, stack }
    }

    /// Whether the saved stack pointer still lies inside the thread's stack.
    pub fn sp_in_bounds(&self) -> bool {
        self.stack.contains(self.sp)
    }
}
