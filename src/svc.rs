//! Supervisor call dispatch.
//!
//! Thread code asks the kernel for privileged work by executing `SVC #imm8`.
//! The handler recovers the immediate from the instruction that trapped: the
//! stacked return address points just past the 16-bit Thumb `SVC`
//! instruction, whose low byte is the operand.

use crate::arch::Arch;
use crate::thread::frame::ExceptionFrame;

/// Operands understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SvcOperand {
    /// Enter the first thread. Issued once by kernel start.
    Start = 1,
    /// Pend a context switch. Issued by a yielding thread.
    Yield = 2,
}

impl SvcOperand {
    /// Raw immediate encoded in the `SVC` instruction.
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SvcOperand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SvcOperand::Start),
            2 => Ok(SvcOperand::Yield),
            other => Err(other),
        }
    }
}

/// What the dispatcher did with a supervisor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvcOutcome {
    /// The first thread was entered (only observable off-target)
    Started,
    /// PendSV was pended; the switch runs once the SVC unwinds
    SwitchPended,
    /// The operand is not recognised and was dropped
    Ignored(u8),
}

/// Recover the `SVC` immediate from a stacked exception frame.
///
/// # Safety
///
/// `frame.pc` must be the return address stacked by an `SVC` exception, so
/// the two bytes before it are the trapping instruction.
pub unsafe fn decode_operand(frame: &ExceptionFrame) -> u8 {
    let return_address = frame.pc as *const u8;
    unsafe { return_address.sub(2).read_volatile() }
}

/// Perform the privileged action requested by `operand`.
///
/// Unknown operands are ignored.
pub fn dispatch<A: Arch>(arch: &mut A, operand: u8) -> SvcOutcome {
    match SvcOperand::try_from(operand) {
        Ok(SvcOperand::Start) => {
            // Safety: the start path sets PSP to the first thread's initial
            // frame before raising this operand.
            unsafe { arch.enter_first_thread() };
            SvcOutcome::Started
        }
        Ok(SvcOperand::Yield) => {
            arch.pend_context_switch();
            arch.instruction_barrier();
            SvcOutcome::SwitchPended
        }
        Err(unknown) => {
            log::trace!("svc: ignoring unknown operand {}", unknown);
            SvcOutcome::Ignored(unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimArch;

    #[test]
    fn test_operand_conversion() {
        assert_eq!(SvcOperand::try_from(1), Ok(SvcOperand::Start));
        assert_eq!(SvcOperand::try_from(2), Ok(SvcOperand::Yield));
        assert_eq!(SvcOperand::try_from(0), Err(0));
        assert_eq!(SvcOperand::Yield.raw(), 2);
    }

    #[test]
    fn test_decode_reads_byte_before_return_address() {
        // Thumb `svc #2` is 0xDF02, stored little-endian, followed by a nop
        let code: [u8; 4] = [0x02, 0xDF, 0x00, 0xBF];
        let frame = ExceptionFrame {
            pc: code.as_ptr() as usize + 2,
            ..ExceptionFrame::default()
        };
        assert_eq!(unsafe { decode_operand(&frame) }, 2);
    }

    #[test]
    fn test_yield_pends_then_synchronizes() {
        let mut arch = SimArch::new();
        assert_eq!(dispatch(&mut arch, 2), SvcOutcome::SwitchPended);
        assert!(arch.pendsv_pending());
        assert_eq!(arch.barrier_count(), 1);
    }

    #[test]
    fn test_start_enters_first_thread() {
        let mut arch = SimArch::new();
        unsafe { arch.write_psp(0x2000_1000) };
        assert_eq!(dispatch(&mut arch, 1), SvcOutcome::Started);
        assert_eq!(arch.first_entry(), Some(0x2000_1000));
        assert!(!arch.pendsv_pending());
    }

    #[test]
    fn test_unknown_operand_is_ignored() {
        let mut arch = SimArch::new();
        unsafe { arch.write_psp(0x2000_1000) };
        for operand in [0u8, 3, 0xFF] {
            assert_eq!(dispatch(&mut arch, operand), SvcOutcome::Ignored(operand));
        }
        assert!(!arch.pendsv_pending());
        assert_eq!(arch.barrier_count(), 0);
        assert_eq!(arch.first_entry(), None);
        assert_eq!(arch.read_psp(), 0x2000_1000);
    }
}
