//! Entry point of the trap handler for memory faults

use crate::addr::{Pasid, VAddr};
use crate::context::PagingContext;
use crate::dma::DmaEngine;
use crate::fault::{FaultAccess, FaultError};
use crate::mpu::MpuController;
use crate::victim::VictimSelector;
use ksync::SpinLock;
use riscv::cpu::{Exception, TrapEvent};

/// The kernel global paging state together with the lock that serializes all access to it
pub type PagingLock<'mem, M, D, V> = SpinLock<PagingContext<'mem, M, D, V>>;

/// What the trap handler should do after a fault was processed
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultResolution {
    /// The faulting instruction can be executed again.
    /// Carries the raw page-in result.
    Resume(u64),
    /// The fault cannot be resolved and the faulting task must be terminated
    KillTask(FaultError),
    /// The trap was not caused by a memory access
    NotAPagingFault,
}

/// Determine which kind of access caused a trap
pub fn fault_access(cause: TrapEvent) -> Option<FaultAccess> {
    if !cause.is_memory_fault() {
        return None;
    }
    match cause {
        TrapEvent::Exception(Exception::InstructionPageFault | Exception::InstructionAccessFault) => {
            Some(FaultAccess::Execute)
        }
        TrapEvent::Exception(Exception::StorePageFault | Exception::StoreAccessFault) => {
            Some(FaultAccess::Write)
        }
        _ => Some(FaultAccess::Read),
    }
}

/// Handle a trap that was taken while `pasid` was executing.
///
/// `scause` and `stval` are the raw values of the corresponding registers.
pub fn handle_page_fault<M, D, V>(
    lock: &PagingLock<'_, M, D, V>,
    pasid: Pasid,
    scause: u64,
    stval: u64,
) -> FaultResolution
where
    M: MpuController,
    D: DmaEngine,
    V: VictimSelector,
{
    let Some(access) = fault_access(TrapEvent::from(scause)) else {
        return FaultResolution::NotAPagingFault;
    };
    let vaddr: VAddr = stval;
    log::trace!("{access:?} fault at {vaddr:#x} in pasid {pasid}");

    let mut ctx = lock.spin_lock();
    match ctx.page_in(pasid, vaddr, access) {
        Ok(outcome) => FaultResolution::Resume(outcome.raw()),
        Err(e) => FaultResolution::KillTask(e),
    }
}
