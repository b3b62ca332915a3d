//! Trap related control and status registers
//!
//! Only what the memory fault path needs is modelled: the trap cause, the trap value and the cycle counter.
//! Register access is only available when compiling for `riscv64`, decoding works everywhere.

#[cfg(target_arch = "riscv64")]
use core::arch::asm;

const INTERRUPT_BIT: u64 = 1 << 63;

/// The decoded content of `scause`
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrapEvent {
    Interrupt(Interrupt),
    Exception(Exception),
}

impl TrapEvent {
    /// Whether the trap was caused by a memory access that the MPU did not permit
    pub fn is_memory_fault(&self) -> bool {
        matches!(
            self,
            TrapEvent::Exception(
                Exception::InstructionAccessFault
                    | Exception::InstructionPageFault
                    | Exception::LoadAccessFault
                    | Exception::LoadPageFault
                    | Exception::StoreAccessFault
                    | Exception::StorePageFault
            )
        )
    }
}

impl From<u64> for TrapEvent {
    fn from(raw: u64) -> Self {
        let code = (raw & !INTERRUPT_BIT) as u32;
        match raw & INTERRUPT_BIT != 0 {
            true => TrapEvent::Interrupt(Interrupt::from(code)),
            false => TrapEvent::Exception(Exception::from(code)),
        }
    }
}

/// Interrupt codes that can be delegated to S-mode
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interrupt {
    SupervisorSoftwareInterrupt,
    SupervisorTimerInterrupt,
    SupervisorExternalInterrupt,
    Unknown(u32),
}

impl From<u32> for Interrupt {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::SupervisorSoftwareInterrupt,
            5 => Self::SupervisorTimerInterrupt,
            9 => Self::SupervisorExternalInterrupt,
            _ => Self::Unknown(code),
        }
    }
}

/// Synchronous exception codes
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Exception {
    InstructionAddressMisaligned,
    InstructionAccessFault,
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    LoadAccessFault,
    StoreAddressMisaligned,
    StoreAccessFault,
    EnvCallFromUMode,
    EnvCallFromSMode,
    InstructionPageFault,
    LoadPageFault,
    StorePageFault,
    Unknown(u32),
}

impl From<u32> for Exception {
    fn from(code: u32) -> Self {
        const BY_CODE: [Option<Exception>; 16] = [
            Some(Exception::InstructionAddressMisaligned),
            Some(Exception::InstructionAccessFault),
            Some(Exception::IllegalInstruction),
            Some(Exception::Breakpoint),
            Some(Exception::LoadAddressMisaligned),
            Some(Exception::LoadAccessFault),
            Some(Exception::StoreAddressMisaligned),
            Some(Exception::StoreAccessFault),
            Some(Exception::EnvCallFromUMode),
            Some(Exception::EnvCallFromSMode),
            None,
            None,
            Some(Exception::InstructionPageFault),
            Some(Exception::LoadPageFault),
            None,
            Some(Exception::StorePageFault),
        ];
        BY_CODE
            .get(code as usize)
            .copied()
            .flatten()
            .unwrap_or(Exception::Unknown(code))
    }
}

/// `scause`, written by hardware with the reason of the most recent trap into S-mode
pub struct Scause;

#[cfg(target_arch = "riscv64")]
impl Scause {
    pub fn read_raw() -> u64 {
        let raw: u64;
        unsafe { asm!("csrr {}, scause", out(reg) raw) };
        raw
    }

    pub fn read() -> TrapEvent {
        TrapEvent::from(Self::read_raw())
    }
}

/// `stval`, which holds the faulting address after an access or page fault
pub struct StVal;

#[cfg(target_arch = "riscv64")]
impl StVal {
    pub fn read() -> u64 {
        let raw: u64;
        unsafe { asm!("csrr {}, stval", out(reg) raw) };
        raw
    }
}

/// The free running cycle counter of the executing hart
pub struct Cycle;

#[cfg(target_arch = "riscv64")]
impl Cycle {
    pub fn read() -> u64 {
        let cycles: u64;
        unsafe { asm!("rdcycle {}", out(reg) cycles) };
        cycles
    }
}
