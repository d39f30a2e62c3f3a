//! Exception-return register frames.
//!
//! A thread that has never run is given a stack that looks exactly like one
//! that was switched out: eight software-saved words (r4-r11) below the
//! eight words the processor stacks on exception entry. Restoring that image
//! "resumes" the thread at its entry point.
//!
//! ```text
//!  high   xPSR   <- stack top - 1 word
//!         PC     (entry)
//!         LR
//!         R12
//!         R3 .. R0
//!         R11 .. R4  <- initial stack pointer
//!  low
//! ```

use core::mem::size_of;

/// Size of one stacked register.
pub const WORD_BYTES: usize = size_of::<usize>();

/// Words stacked by the processor on exception entry.
pub const HARDWARE_FRAME_WORDS: usize = 8;

/// Words saved and restored by the PendSV handler.
pub const SOFTWARE_FRAME_WORDS: usize = 8;

/// Words in a complete saved context.
pub const INITIAL_FRAME_WORDS: usize = HARDWARE_FRAME_WORDS + SOFTWARE_FRAME_WORDS;

/// Distance between a saved stack pointer and the PSP value that addresses
/// the hardware frame above it.
pub const SOFTWARE_FRAME_BYTES: usize = SOFTWARE_FRAME_WORDS * WORD_BYTES;

/// Bytes occupied by an initial frame.
pub const INITIAL_FRAME_BYTES: usize = INITIAL_FRAME_WORDS * WORD_BYTES;

/// xPSR with only the Thumb execution state bit set.
pub const INITIAL_XPSR: usize = 1 << 24;

/// Placeholder for registers a fresh thread does not depend on.
pub const REGISTER_FILL: usize = 0x0000_000A;

/// Entry point of a thread. Threads never return.
pub type ThreadEntry = fn() -> !;

/// Registers stacked by the processor on exception entry.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionFrame {
    pub r0: usize,
    pub r1: usize,
    pub r2: usize,
    pub r3: usize,
    pub r12: usize,
    pub lr: usize,
    pub pc: usize,
    pub xpsr: usize,
}

/// Callee-saved registers pushed by the PendSV handler.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareFrame {
    pub r4: usize,
    pub r5: usize,
    pub r6: usize,
    pub r7: usize,
    pub r8: usize,
    pub r9: usize,
    pub r10: usize,
    pub r11: usize,
}

/// A complete saved context, lowest address first.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InitialFrame {
    pub software: SoftwareFrame,
    pub hardware: ExceptionFrame,
}

const _: () = assert!(size_of::<ExceptionFrame>() == HARDWARE_FRAME_WORDS * WORD_BYTES);
const _: () = assert!(size_of::<SoftwareFrame>() == SOFTWARE_FRAME_BYTES);
const _: () = assert!(size_of::<InitialFrame>() == INITIAL_FRAME_BYTES);

impl InitialFrame {
    /// Register image that resumes at `entry` in Thumb state.
    pub fn new(entry: ThreadEntry) -> Self {
        let fill = SoftwareFrame {
            r4: REGISTER_FILL,
            r5: REGISTER_FILL,
            r6: REGISTER_FILL,
            r7: REGISTER_FILL,
            r8: REGISTER_FILL,
            r9: REGISTER_FILL,
            r10: REGISTER_FILL,
            r11: REGISTER_FILL,
        };
        Self {
            software: fill,
            hardware: ExceptionFrame {
                r0: REGISTER_FILL,
                r1: REGISTER_FILL,
                r2: REGISTER_FILL,
                r3: REGISTER_FILL,
                r12: REGISTER_FILL,
                lr: REGISTER_FILL,
                // Bit 0 marks Thumb in function pointers; the stacked PC must
                // be halfword aligned, the state lives in xPSR.T instead.
                pc: entry as usize & !1,
                xpsr: INITIAL_XPSR,
            },
        }
    }
}

/// Write the initial frame for `entry` below `stack_top` and return the
/// stack pointer the first context restore reads from.
///
/// # Safety
///
/// `[stack_top - INITIAL_FRAME_BYTES, stack_top)` must be writable memory
/// owned by the new thread, and `stack_top` must be word aligned.
pub unsafe fn build_initial_frame(stack_top: usize, entry: ThreadEntry) -> usize {
    let sp = stack_top - INITIAL_FRAME_BYTES;
    unsafe { (sp as *mut InitialFrame).write(InitialFrame::new(entry)) };
    sp
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    fn idle() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn test_frame_word_counts_agree() {
        assert_eq!(INITIAL_FRAME_WORDS, 16);
        assert_eq!(INITIAL_FRAME_BYTES - SOFTWARE_FRAME_BYTES, HARDWARE_FRAME_WORDS * WORD_BYTES);
    }

    #[test]
    fn test_build_initial_frame_layout() {
        let mut stack = vec![0usize; 64];
        let top = stack.as_mut_ptr() as usize + stack.len() * WORD_BYTES;

        let sp = unsafe { build_initial_frame(top, idle) };
        assert_eq!(top - sp, INITIAL_FRAME_BYTES);

        // Words from the new stack pointer upwards
        let words = &stack[stack.len() - INITIAL_FRAME_WORDS..];
        assert!(words[..SOFTWARE_FRAME_WORDS].iter().all(|&w| w == REGISTER_FILL));
        assert_eq!(&words[8..14], &[REGISTER_FILL; 6]);
        assert_eq!(words[14], idle as usize & !1);
        assert_eq!(words[15], INITIAL_XPSR);
    }

    #[test]
    fn test_frame_does_not_touch_memory_below_sp() {
        let mut stack = vec![0x5A5Ausize; 32];
        let top = stack.as_mut_ptr() as usize + stack.len() * WORD_BYTES;

        unsafe { build_initial_frame(top, idle) };
        assert!(stack[..32 - INITIAL_FRAME_WORDS].iter().all(|&w| w == 0x5A5A));
    }

    #[test]
    fn test_hardware_frame_sits_one_software_frame_above_sp() {
        let mut stack = vec![0usize; 32];
        let top = stack.as_mut_ptr() as usize + stack.len() * WORD_BYTES;

        let sp = unsafe { build_initial_frame(top, idle) };
        let hardware = unsafe { &*((sp + SOFTWARE_FRAME_BYTES) as *const ExceptionFrame) };
        assert_eq!(hardware.xpsr, INITIAL_XPSR);
        assert_eq!(hardware.pc, idle as usize & !1);
    }
}
