//! Addresses, address space identifiers and the two mapping granularities
//!
//! # Granularities
//!
//! The virtual address space of each task is split at [`HUGE_THRESHOLD`]:
//!
//! | VAddr Start | VAddr End | Granularity |
//! | :---------- | :-------- | :---------- |
//! | `0x0000000000000000` | `0x0000FFFFFFFFFFFF` | small, `4KiB` pages |
//! | `0x0001000000000000` | `0xFFFFFFFFFFFFFFFF` | huge, `2^48` byte pages |
//!
//! Every mapping is registered in the inverted pagetable once per granule that it touches so a lookup only
//! needs to round the faulting address down to its granule to find the responsible entry.

/// Type alias for virtual addresses.
pub type VAddr = u64;

/// Type alias for physical addresses.
pub type PAddr = u64;

/// Identifier of an isolated address space
pub type Pasid = u8;

pub const SMALL_PAGE_SHIFT: u32 = 12;
/// Size of a small page which is also the unit in which TCM is paged
pub const SMALL_PAGE_SIZE: u64 = 1 << SMALL_PAGE_SHIFT;
pub const SMALL_PAGE_MASK: u64 = !(SMALL_PAGE_SIZE - 1);

pub const HUGE_PAGE_SHIFT: u32 = 48;
pub const HUGE_PAGE_SIZE: u64 = 1 << HUGE_PAGE_SHIFT;
pub const HUGE_PAGE_MASK: u64 = !(HUGE_PAGE_SIZE - 1);

/// The first virtual address that is managed with huge granularity
pub const HUGE_THRESHOLD: VAddr = HUGE_PAGE_SIZE;

/// Set in every packed key so that no valid key is ever `0`
pub const KEY_PRESENT: u64 = 1 << 11;

/// The granularity with which a region of the virtual address space is managed
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Granularity {
    Small,
    Huge,
}

impl Granularity {
    /// Get the granularity that manages `vaddr`
    #[inline]
    pub const fn of(vaddr: VAddr) -> Self {
        if vaddr < HUGE_THRESHOLD {
            Granularity::Small
        } else {
            Granularity::Huge
        }
    }

    /// Get the number of bytes covered by one granule
    #[inline]
    pub const fn size(&self) -> u64 {
        match self {
            Granularity::Small => SMALL_PAGE_SIZE,
            Granularity::Huge => HUGE_PAGE_SIZE,
        }
    }

    /// Get the mask that rounds an address down to its granule
    #[inline]
    pub const fn mask(&self) -> u64 {
        match self {
            Granularity::Small => SMALL_PAGE_MASK,
            Granularity::Huge => HUGE_PAGE_MASK,
        }
    }
}

/// Round `vaddr` down to the start of its granule
#[inline]
pub const fn granule_base(vaddr: VAddr) -> VAddr {
    vaddr & Granularity::of(vaddr).mask()
}

/// Round `addr` down to the start of its small page
#[inline]
pub const fn small_page_base(addr: u64) -> u64 {
    addr & SMALL_PAGE_MASK
}

/// Whether `addr` is aligned to a small page boundary
#[inline]
pub const fn is_small_page_aligned(addr: u64) -> bool {
    addr & !SMALL_PAGE_MASK == 0
}

/// The key under which a granule of one address space is stored in the inverted pagetable
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PagingKey {
    pub pasid: Pasid,
    pub virtual_page: VAddr,
}

impl PagingKey {
    /// Construct the key of the granule that contains `vaddr`
    #[inline]
    pub const fn containing(pasid: Pasid, vaddr: VAddr) -> Self {
        Self {
            pasid,
            virtual_page: granule_base(vaddr),
        }
    }

    /// Pack the key into a single `u64` for hashing and comparison.
    ///
    /// The pasid is stored in the low bits which are always zero in a page aligned address.
    #[inline]
    pub const fn packed(&self) -> u64 {
        self.virtual_page | KEY_PRESENT | self.pasid as u64
    }
}
