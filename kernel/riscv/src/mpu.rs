//! Access to the memory protection unit
//!
//! The MPU replaces a page table walker on this core.
//! It holds a small, fixed number of entries, each mapping one contiguous virtual range onto a physical range.
//! Entries are accessed through a window of custom supervisor CSRs: the entry to operate on is selected by writing
//! its index into `smpuidx` after which the remaining registers read and write that entry.
//!
//! ```text
//!   smpuidx    index of the entry that the other registers refer to
//!   smpuva     virtual start address | VALID (bit 0)
//!   smpupa     physical start address
//!   smpurng    size of the mapped range in bytes
//!   smpuattr   access and caching attributes, see [`MpuAttributes`]
//! ```

use bitflags::bitflags;

#[cfg(target_arch = "riscv64")]
use core::arch::asm;

/// Index of one entry in the MPU
pub type MpuIndex = usize;

/// The bit in `smpuva` which marks an entry as active
pub const MPU_VA_VALID: u64 = 1 << 0;

bitflags! {
    /// Attributes of an MPU entry as they are laid out in the `smpuattr` register
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
    pub struct MpuAttributes: u64 {
        /// User mode may read from the range
        const UR = 1 << 0;
        /// User mode may write to the range
        const UW = 1 << 1;
        /// User mode may execute from the range
        const UX = 1 << 2;
        /// Supervisor mode may read from the range
        const SR = 1 << 3;
        /// Supervisor mode may write to the range
        const SW = 1 << 4;
        /// Supervisor mode may execute from the range
        const SX = 1 << 5;
        /// Accesses may be cached
        const CACHEABLE = 1 << 16;
        /// Accesses participate in cache coherency.
        /// Ranges without this bit are treated as device memory.
        const COHERENT = 1 << 17;

        const READ = Self::UR.bits() | Self::SR.bits();
        const WRITE = Self::UW.bits() | Self::SW.bits();
        const EXECUTE = Self::UX.bits() | Self::SX.bits();
    }
}

/// The MPU register window.
///
/// All methods operate on whatever entry was last selected via [`Mpu::select`].
#[allow(dead_code)]
pub struct Mpu {}

#[cfg(target_arch = "riscv64")]
impl Mpu {
    /// Select the entry that subsequent register accesses refer to
    ///
    /// # Safety
    /// The selection is global CPU state; it must not be changed while another piece of code is in the middle of
    /// programming an entry.
    pub unsafe fn select(index: MpuIndex) {
        asm!("csrw 0x5c0, {}", in(reg) index)
    }

    pub fn read_va() -> u64 {
        let res: u64;
        unsafe { asm!("csrr {}, 0x5c1", out(reg) res) };
        res
    }

    /// # Safety
    /// Changing an MPU entry changes virtual address mappings which can invalidate unrelated references.
    pub unsafe fn write_va(value: u64) {
        asm!("csrw 0x5c1, {}", in(reg) value)
    }

    pub fn read_pa() -> u64 {
        let res: u64;
        unsafe { asm!("csrr {}, 0x5c2", out(reg) res) };
        res
    }

    /// # Safety
    /// Changing an MPU entry changes virtual address mappings which can invalidate unrelated references.
    pub unsafe fn write_pa(value: u64) {
        asm!("csrw 0x5c2, {}", in(reg) value)
    }

    pub fn read_range() -> u64 {
        let res: u64;
        unsafe { asm!("csrr {}, 0x5c3", out(reg) res) };
        res
    }

    /// # Safety
    /// Changing an MPU entry changes virtual address mappings which can invalidate unrelated references.
    pub unsafe fn write_range(value: u64) {
        asm!("csrw 0x5c3, {}", in(reg) value)
    }

    pub fn read_attributes() -> MpuAttributes {
        let res: u64;
        unsafe { asm!("csrr {}, 0x5c4", out(reg) res) };
        MpuAttributes::from_bits_truncate(res)
    }

    /// # Safety
    /// Changing an MPU entry changes virtual address mappings which can invalidate unrelated references.
    pub unsafe fn write_attributes(value: MpuAttributes) {
        asm!("csrw 0x5c4, {}", in(reg) value.bits())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_attribute_groups_cover_both_modes() {
        assert!(MpuAttributes::WRITE.contains(MpuAttributes::UW));
        assert!(MpuAttributes::WRITE.contains(MpuAttributes::SW));
        assert!(!MpuAttributes::READ.intersects(MpuAttributes::WRITE));
    }
}
