//! Abstraction over the MPU entries that the paging code programs

use crate::addr::{PAddr, VAddr};
use core::fmt::{Debug, Formatter};
pub use riscv::mpu::{MpuAttributes, MpuIndex};

/// The content of one MPU entry
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct MpuEntry {
    pub virtual_address: VAddr,
    pub valid: bool,
    pub physical_address: PAddr,
    /// Size of the mapped range in bytes
    pub range: u64,
    pub attributes: MpuAttributes,
}

impl MpuEntry {
    /// An entry which maps nothing
    pub const INVALID: Self = Self {
        virtual_address: 0,
        valid: false,
        physical_address: 0,
        range: 0,
        attributes: MpuAttributes::empty(),
    };

    /// Whether `vaddr` is translated by this entry
    pub fn maps(&self, vaddr: VAddr) -> bool {
        self.valid && vaddr.wrapping_sub(self.virtual_address) < self.range
    }
}

impl Debug for MpuEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        if !self.valid {
            return f.write_str("MpuEntry (invalid)");
        }
        write!(
            f,
            "MpuEntry {{ {:#x}+{:#x} -> {:#x} {:?} }}",
            self.virtual_address, self.range, self.physical_address, self.attributes
        )
    }
}

/// Something that holds MPU entries, usually the hardware itself.
///
/// Entries are addressed by their fixed index.
/// The paging code owns the indices of its pools exclusively so it never has to coordinate with other users.
pub trait MpuController {
    fn read(&self, index: MpuIndex) -> MpuEntry;

    fn write(&mut self, index: MpuIndex, entry: MpuEntry);

    /// Mark the entry at `index` as unused
    fn invalidate(&mut self, index: MpuIndex) {
        self.write(index, MpuEntry::INVALID);
    }
}
