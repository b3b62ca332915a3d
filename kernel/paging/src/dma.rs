//! Abstraction over the DMA engine which moves pages between TCM and their backing memory

use crate::addr::PAddr;
use bitflags::bitflags;
use thiserror_no_std::Error;

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
    pub struct DmaFlags: u32 {
        /// Copy from TCM to the physical address.
        /// Without this flag data flows from the physical address into TCM.
        const WRITE = 1 << 0;
        /// The TCM side of the transfer is instruction TCM
        const IMEM = 1 << 1;
    }
}

/// Description of one transfer between TCM and backing memory
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DmaTransfer {
    pub physical_address: PAddr,
    /// Byte offset inside the TCM selected by [`DmaFlags::IMEM`]
    pub tcm_offset: u64,
    pub length: u64,
    pub channel: u8,
    pub flags: DmaFlags,
}

impl DmaTransfer {
    pub fn is_writeback(&self) -> bool {
        self.flags.contains(DmaFlags::WRITE)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum DmaError {
    #[error("DMA transfer on channel {channel} did not complete")]
    TransferFailed { channel: u8 },
    #[error("DMA engine reported a bus error at {address:#x}")]
    BusError { address: PAddr },
}

pub trait DmaEngine {
    /// Queue a transfer.
    ///
    /// This does not wait for the transfer to happen, only [`flush`](DmaEngine::flush) does.
    fn start_transfer(&mut self, transfer: DmaTransfer);

    /// Block until every queued transfer has completed
    fn flush(&mut self) -> Result<(), DmaError>;
}
