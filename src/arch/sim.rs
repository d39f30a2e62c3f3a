//! Register-level simulation of the Cortex-M pieces the kernel touches.
//!
//! This lets the scheduler, frame builder and dispatcher run on a host. No
//! code is executed on the simulated thread stacks: PSP is a plain number
//! and entering a thread only records where it would have resumed.

use super::{Arch, SystemHandler, ICSR_PENDSVSET};
use crate::svc::SvcOperand;
use crate::thread::frame::SOFTWARE_FRAME_BYTES;

/// Simulated system control block and stack pointer.
#[derive(Debug, Default, Clone)]
pub struct SimArch {
    shpr2: u32,
    shpr3: u32,
    icsr: u32,
    psp: usize,
    barriers: usize,
    first_entry: Option<usize>,
    pending_trap: Option<u8>,
}

impl SimArch {
    /// Create a simulator with every register cleared.
    pub const fn new() -> Self {
        Self {
            shpr2: 0,
            shpr3: 0,
            icsr: 0,
            psp: 0,
            barriers: 0,
            first_entry: None,
            pending_trap: None,
        }
    }

    /// Create a simulator whose SHPR registers hold reset garbage.
    pub const fn with_shpr(shpr2: u32, shpr3: u32) -> Self {
        Self {
            shpr2,
            shpr3,
            ..Self::new()
        }
    }

    /// Whether PendSV is pending.
    pub fn pendsv_pending(&self) -> bool {
        self.icsr & ICSR_PENDSVSET != 0
    }

    /// Acknowledge a pending PendSV, returning whether one was pending.
    pub fn take_pendsv(&mut self) -> bool {
        let pending = self.pendsv_pending();
        self.icsr &= !ICSR_PENDSVSET;
        pending
    }

    /// Number of instruction barriers executed.
    pub fn barrier_count(&self) -> usize {
        self.barriers
    }

    /// PSP at the moment the first thread was entered, if it was.
    pub fn first_entry(&self) -> Option<usize> {
        self.first_entry
    }

    /// Raise a supervisor call with an arbitrary operand.
    pub fn raise_svc(&mut self, operand: u8) {
        self.pending_trap = Some(operand);
    }

    /// Take the operand of an undelivered supervisor call.
    pub fn take_trap(&mut self) -> Option<u8> {
        self.pending_trap.take()
    }
}

impl Arch for SimArch {
    fn read_shpr(&self, handler: SystemHandler) -> u32 {
        match handler {
            SystemHandler::SvCall => self.shpr2,
            SystemHandler::PendSv => self.shpr3,
        }
    }

    fn write_shpr(&mut self, handler: SystemHandler, value: u32) {
        match handler {
            SystemHandler::SvCall => self.shpr2 = value,
            SystemHandler::PendSv => self.shpr3 = value,
        }
    }

    fn pend_context_switch(&mut self) {
        self.icsr |= ICSR_PENDSVSET;
    }

    fn instruction_barrier(&mut self) {
        self.barriers += 1;
    }

    fn read_psp(&self) -> usize {
        self.psp
    }

    unsafe fn write_psp(&mut self, sp: usize) {
        self.psp = sp;
    }

    unsafe fn enter_first_thread(&mut self) {
        self.first_entry = Some(self.psp);
        // r4-r11 are popped; the hardware frame stays until the thread yields
        // and pushes a new one in its place.
        self.psp = self.psp.wrapping_add(SOFTWARE_FRAME_BYTES);
    }

    fn trap(&mut self, operand: SvcOperand) {
        self.raise_svc(operand.raw());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_read_modify_write() {
        let mut arch = SimArch::with_shpr(0x0000_00AA, 0xC000_0000);
        arch.set_system_priority(SystemHandler::SvCall, 0xFD);
        arch.set_system_priority(SystemHandler::PendSv, 0xFE);

        assert_eq!(arch.read_shpr(SystemHandler::SvCall), 0xFD00_00AA);
        assert_eq!(arch.read_shpr(SystemHandler::PendSv), 0xC0FE_0000);
        assert_eq!(arch.system_priority(SystemHandler::PendSv), 0xFE);
    }

    #[test]
    fn test_trap_is_held_until_taken() {
        let mut arch = SimArch::new();
        arch.trap(SvcOperand::Yield);
        assert_eq!(arch.take_trap(), Some(2));
        assert_eq!(arch.take_trap(), None);
    }

    #[test]
    fn test_pend_sets_only_pendsvset() {
        let mut arch = SimArch::new();
        arch.pend_context_switch();
        assert_eq!(arch.icsr, ICSR_PENDSVSET);
        assert_eq!(ICSR_PENDSVSET, 0x1000_0000);
    }

    #[test]
    fn test_take_pendsv_clears_flag() {
        let mut arch = SimArch::new();
        arch.pend_context_switch();
        assert!(arch.take_pendsv());
        assert!(!arch.take_pendsv());
    }
}
