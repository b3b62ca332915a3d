//! Types describing page faults and their outcome

use crate::dma::DmaError;
use crate::entry::{MemoryKind, PageTableEntry};
use crate::mpu::{MpuAttributes, MpuIndex};
use thiserror_no_std::Error;

/// Returned through the trap ABI when a page could not be made accessible
pub const PAGE_IN_FAILED: u64 = u64::MAX;

/// Returned through the trap ABI when a region was mapped directly instead of through a TCM slot.
///
/// TCM offsets are page aligned so this value can never be confused with one.
pub const PAGE_IN_DIRECT: u64 = u64::MAX - 1;

/// The kind of access that caused a fault
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultAccess {
    Read,
    Write,
    Execute,
}

/// Reasons for which a fault cannot be resolved.
///
/// All of them are fatal for the faulting task but not for the kernel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum FaultError {
    #[error("The address is not mapped in the faulting address space")]
    Unmapped,
    #[error("The address belongs to memory that is only accessible through DMA")]
    DmaOnly,
    #[error("A write was attempted on a read-only or demand paged executable mapping")]
    NotWritable,
    #[error("An instruction fetch was attempted from a non-executable mapping")]
    NotExecutable,
    #[error("There is no TCM slot that could hold the page")]
    NoTcmSlots,
    #[error("Paging the data in or out failed")]
    Dma(#[from] DmaError),
}

/// How a fault was resolved
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageInOutcome {
    /// The whole mapping was programmed into an entry of the direct pool
    Direct { mpu_index: MpuIndex },
    /// The page is held in a TCM slot
    Tcm { slot: usize, offset: u64 },
}

impl PageInOutcome {
    /// Encode the outcome as the raw value returned through the trap ABI
    pub fn raw(&self) -> u64 {
        match self {
            PageInOutcome::Direct { .. } => PAGE_IN_DIRECT,
            PageInOutcome::Tcm { offset, .. } => *offset,
        }
    }
}

/// Encode the result of a page-in as the raw value returned through the trap ABI
pub fn raw_result(result: &Result<PageInOutcome, FaultError>) -> u64 {
    match result {
        Ok(outcome) => outcome.raw(),
        Err(_) => PAGE_IN_FAILED,
    }
}

/// Check whether `entry` permits `access` and classify it
pub(crate) fn check_access(entry: &PageTableEntry, access: FaultAccess) -> Result<MemoryKind, FaultError> {
    if entry.is_null() {
        return Err(FaultError::Unmapped);
    }
    let kind = entry.kind();
    if kind == MemoryKind::DmaOnly {
        return Err(FaultError::DmaOnly);
    }
    match access {
        FaultAccess::Write if !entry.is_writable() => Err(FaultError::NotWritable),
        // code slots are never mapped writable
        FaultAccess::Write if kind == MemoryKind::PagedTcm && entry.is_executable() => {
            Err(FaultError::NotWritable)
        }
        FaultAccess::Execute if !entry.is_executable() => Err(FaultError::NotExecutable),
        _ => Ok(kind),
    }
}

/// MPU attributes for mapping `entry` as a whole
pub(crate) fn direct_attributes(entry: &PageTableEntry) -> MpuAttributes {
    let mut attributes = MpuAttributes::READ;
    attributes.set(MpuAttributes::WRITE, entry.is_writable());
    attributes.set(MpuAttributes::EXECUTE, entry.is_executable());
    match entry.kind() {
        MemoryKind::Mmio => {}
        MemoryKind::Cached => attributes |= MpuAttributes::COHERENT | MpuAttributes::CACHEABLE,
        _ => attributes |= MpuAttributes::COHERENT,
    }
    attributes
}
