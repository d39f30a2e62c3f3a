//! Architecture abstraction layer for priority setup and context switching.
//!
//! The scheduling algorithm only ever touches the processor through the
//! [`Arch`] trait: the two system-handler priority fields, the PendSV pend
//! bit, the process stack pointer, and the supervisor-call trap. Real
//! hardware implements it in [`cortex_m`], the host simulator in [`sim`].

use crate::svc::SvcOperand;

/// System Handler Priority Register 2 (SVCall priority in bits 31:24).
pub const SHPR2: usize = 0xE000_ED1C;
/// System Handler Priority Register 3 (PendSV priority in bits 23:16).
pub const SHPR3: usize = 0xE000_ED20;
/// Interrupt Control and State Register.
pub const ICSR: usize = 0xE000_ED04;
/// ICSR bit that sets PendSV pending.
pub const ICSR_PENDSVSET: u32 = 1 << 28;

/// System handlers whose priority the kernel configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemHandler {
    /// Supervisor call (exception 11)
    SvCall,
    /// Pendable service call used for context switching (exception 14)
    PendSv,
}

impl SystemHandler {
    /// Address of the SHPR register holding this handler's priority field.
    pub const fn register(self) -> usize {
        match self {
            SystemHandler::SvCall => SHPR2,
            SystemHandler::PendSv => SHPR3,
        }
    }

    /// Bit offset of the priority field inside its register.
    pub const fn shift(self) -> u32 {
        match self {
            SystemHandler::SvCall => 24,
            SystemHandler::PendSv => 16,
        }
    }

    /// Replace this handler's field in `register` with `priority`.
    pub const fn insert(self, register: u32, priority: u8) -> u32 {
        (register & !(0xFF << self.shift())) | ((priority as u32) << self.shift())
    }

    /// Read this handler's field out of `register`.
    pub const fn extract(self, register: u32) -> u8 {
        (register >> self.shift()) as u8
    }
}

/// Architecture abstraction trait.
///
/// # Safety
///
/// `write_psp` and `enter_first_thread` hand control of the processor to
/// whatever the stack pointer addresses; callers must only pass pointers to
/// frames produced by [`build_initial_frame`](crate::thread::frame::build_initial_frame)
/// or saved by the context-switch handler.
pub trait Arch {
    /// Read a raw system handler priority register.
    fn read_shpr(&self, handler: SystemHandler) -> u32;

    /// Write a raw system handler priority register.
    fn write_shpr(&mut self, handler: SystemHandler, value: u32);

    /// Current priority of a system handler.
    fn system_priority(&self, handler: SystemHandler) -> u8 {
        handler.extract(self.read_shpr(handler))
    }

    /// Set the priority of a system handler, leaving the neighbouring
    /// fields of the register untouched.
    fn set_system_priority(&mut self, handler: SystemHandler, priority: u8) {
        let value = handler.insert(self.read_shpr(handler), priority);
        self.write_shpr(handler, value);
    }

    /// Set the PendSV pending bit.
    fn pend_context_switch(&mut self);

    /// Instruction synchronization barrier.
    fn instruction_barrier(&mut self);

    /// Read the process stack pointer.
    fn read_psp(&self) -> usize;

    /// Write the process stack pointer.
    ///
    /// # Safety
    ///
    /// `sp` must address a saved or initial thread context.
    unsafe fn write_psp(&mut self, sp: usize);

    /// Restore the software-saved registers from PSP and exception-return
    /// into the thread they belong to. Does not return on hardware.
    ///
    /// # Safety
    ///
    /// Must be called from handler mode with PSP pointing at an initial frame.
    unsafe fn enter_first_thread(&mut self);

    /// Raise a supervisor call carrying `operand`.
    fn trap(&mut self, operand: SvcOperand);
}

// Cortex-M (ARMv7-M) hardware
#[cfg(target_arch = "arm")]
pub mod cortex_m;

pub mod sim;

#[cfg(target_arch = "arm")]
pub use self::cortex_m::CortexM as DefaultArch;

#[cfg(all(not(target_arch = "arm"), any(test, feature = "std-shim")))]
pub use self::sim::SimArch as DefaultArch;

// Compile error for unsupported configurations
#[cfg(all(not(target_arch = "arm"), not(test), not(feature = "std-shim")))]
compile_error!("This library only supports ARMv7-M Cortex-M targets. Use --target thumbv7m-none-eabi or enable the std-shim feature for host builds.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_encoding() {
        assert_eq!(SystemHandler::PendSv.insert(0, 0xFE), 0x00FE_0000);
        assert_eq!(SystemHandler::SvCall.insert(0, 0xFD), 0xFD00_0000);
    }

    #[test]
    fn test_insert_preserves_other_fields() {
        // SysTick shares SHPR3 (bits 31:24); it must survive a PendSV update
        let shpr3 = 0x40FF_0012;
        let updated = SystemHandler::PendSv.insert(shpr3, 0xFE);
        assert_eq!(updated, 0x40FE_0012);
        assert_eq!(SystemHandler::PendSv.extract(updated), 0xFE);
    }
}
