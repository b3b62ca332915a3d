//! RISC-V specific code for the lunatix kernel
//!
//! Register accessors that need the `asm!` macro are only compiled for `riscv64` targets.
//! Decoding of register *values* is kept target independent so that it can be tested on the host.
#![no_std]

pub mod cpu;
pub mod mpu;

/// Translation between physical addresses and the kernels own mapping of them.
///
/// The kernel does not run with identity mapped memory which means that a physical address handed to it (e.g. by a
/// task through a syscall) must first be translated before it can be dereferenced.
///
/// # Safety
/// Implementations must return pointers that are valid for the same memory the input pointer described.
pub unsafe trait PhysMapper {
    unsafe fn phys_to_mapped_mut<T>(&self, phys: *mut T) -> *mut T;
    unsafe fn phys_to_mapped<T>(&self, phys: *const T) -> *const T;
    unsafe fn mapped_to_phys_mut<T>(&self, mapped: *mut T) -> *mut T;
    unsafe fn mapped_to_phys<T>(&self, mapped: *const T) -> *const T;
}

/// A [`PhysMapper`] for memory that is mapped at a fixed offset, which is what the boot code sets up.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OffsetMapper {
    /// The virtual address at which physical address `0x0` is mapped
    pub offset: usize,
}

impl OffsetMapper {
    pub const fn new(offset: usize) -> Self {
        Self { offset }
    }
}

unsafe impl PhysMapper for OffsetMapper {
    unsafe fn phys_to_mapped_mut<T>(&self, phys: *mut T) -> *mut T {
        phys.cast::<u8>().wrapping_add(self.offset).cast()
    }

    unsafe fn phys_to_mapped<T>(&self, phys: *const T) -> *const T {
        phys.cast::<u8>().wrapping_add(self.offset).cast()
    }

    unsafe fn mapped_to_phys_mut<T>(&self, mapped: *mut T) -> *mut T {
        mapped.cast::<u8>().wrapping_sub(self.offset).cast()
    }

    unsafe fn mapped_to_phys<T>(&self, mapped: *const T) -> *const T {
        mapped.cast::<u8>().wrapping_sub(self.offset).cast()
    }
}
