//! ARMv7-M (Cortex-M3/M4/M7) architecture implementation.
//!
//! Besides the [`Arch`] implementation this module carries the three
//! assembly routines that must not be compiled as ordinary Rust functions:
//!
//! - `SVCall` finds the stacked exception frame (MSP before the kernel is
//!   started, PSP afterwards) and hands it to the dispatcher.
//! - `PendSV` stores r4-r11 just below the interrupted thread's hardware
//!   frame, lets the scheduler move PSP, then reloads r4-r11 from just below
//!   the new PSP.
//! - `run_first_thread` pops the initial software frame and exception-returns
//!   into thread mode on the process stack.
//!
//! Threads must not use the FPU: the handlers always return with the basic
//! (non-FP) frame.

use super::{Arch, SystemHandler, ICSR, ICSR_PENDSVSET};
use crate::svc::{self, SvcOperand};
use crate::thread::frame::{ExceptionFrame, SOFTWARE_FRAME_BYTES};
use core::arch::{asm, global_asm};
use core::ptr::{read_volatile, write_volatile};
use cortex_m::register::psp;

// The handlers below hard-code the 32-byte r4-r11 block.
const _: () = assert!(SOFTWARE_FRAME_BYTES == 32);

global_asm!(
    ".section .text.SVCall,\"ax\",%progbits",
    ".global SVCall",
    ".type SVCall,%function",
    ".thumb_func",
    "SVCall:",
    "    tst lr, #4",
    "    ite eq",
    "    mrseq r0, msp",
    "    mrsne r0, psp",
    "    b svc_handler_main",
    ".size SVCall, . - SVCall",
    "",
    ".section .text.PendSV,\"ax\",%progbits",
    ".global PendSV",
    ".type PendSV,%function",
    ".thumb_func",
    "PendSV:",
    "    mrs r0, psp",
    "    stmdb r0, {{r4-r11}}",
    "    push {{r0, lr}}",
    "    bl kernel_context_switch",
    "    pop {{r0, lr}}",
    "    mrs r0, psp",
    "    sub r0, r0, #32",
    "    ldmia r0, {{r4-r11}}",
    "    bx lr",
    ".size PendSV, . - PendSV",
    "",
    ".section .text.run_first_thread,\"ax\",%progbits",
    ".global run_first_thread",
    ".type run_first_thread,%function",
    ".thumb_func",
    "run_first_thread:",
    "    mrs r0, psp",
    "    ldmia r0!, {{r4-r11}}",
    "    msr psp, r0",
    // EXC_RETURN 0xFFFFFFFD: thread mode, process stack, basic frame
    "    mvn lr, #2",
    "    bx lr",
    ".size run_first_thread, . - run_first_thread",
);

extern "C" {
    fn run_first_thread();
}

/// Rust half of the SVCall handler.
#[no_mangle]
extern "C" fn svc_handler_main(frame: *const ExceptionFrame) {
    // Safety: SVCall passes the frame the processor stacked for this trap.
    let operand = unsafe { svc::decode_operand(&*frame) };
    svc::dispatch(&mut CortexM::new(), operand);
}

/// Rust half of the PendSV handler.
#[no_mangle]
extern "C" fn kernel_context_switch() {
    crate::kernel::switch_global();
}

/// Cortex-M architecture implementation.
pub struct CortexM {
    _private: (),
}

impl CortexM {
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for CortexM {
    fn default() -> Self {
        Self::new()
    }
}

impl Arch for CortexM {
    fn read_shpr(&self, handler: SystemHandler) -> u32 {
        unsafe { read_volatile(handler.register() as *const u32) }
    }

    fn write_shpr(&mut self, handler: SystemHandler, value: u32) {
        unsafe { write_volatile(handler.register() as *mut u32, value) }
    }

    fn pend_context_switch(&mut self) {
        // ICSR bits are write-one-to-set; zeros leave the others alone
        unsafe { write_volatile(ICSR as *mut u32, ICSR_PENDSVSET) }
    }

    fn instruction_barrier(&mut self) {
        cortex_m::asm::isb();
    }

    fn read_psp(&self) -> usize {
        psp::read() as usize
    }

    unsafe fn write_psp(&mut self, sp: usize) {
        #[allow(unused_unsafe)]
        unsafe {
            psp::write(sp as u32)
        }
    }

    unsafe fn enter_first_thread(&mut self) {
        unsafe { run_first_thread() }
    }

    fn trap(&mut self, operand: SvcOperand) {
        // The SVC immediate is part of the instruction encoding
        match operand {
            SvcOperand::Start => unsafe { asm!("svc 1") },
            SvcOperand::Yield => unsafe { asm!("svc 2") },
        }
    }
}
