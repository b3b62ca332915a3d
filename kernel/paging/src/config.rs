//! Static layout of the MPU entries and TCM regions that are used for paging
//!
//! The MPU index space is partitioned statically.
//! The kernel owns a few entries for its own code and data, the remaining ones are split into
//!
//! - a *direct* pool used to map cached, uncached and MMIO regions as a whole,
//! - a *data* pool with one entry per DTCM paging slot,
//! - a *code* pool with one entry per ITCM paging slot.

use crate::addr::{PAddr, Pasid, SMALL_PAGE_SIZE};
use crate::resident::MAX_TCM_PAGES;
use core::ops::Range;
use riscv::mpu::MpuIndex;

/// A run of MPU entries
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MpuPool {
    pub first: MpuIndex,
    pub count: usize,
}

impl MpuPool {
    pub const fn indices(&self) -> Range<MpuIndex> {
        self.first..self.first + self.count
    }

    fn overlaps(&self, other: &MpuPool) -> bool {
        self.first < other.first + other.count && other.first < self.first + self.count
    }
}

/// A run of TCM slots, each mapped by one MPU entry
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TcmPool {
    pub mpu: MpuPool,
    /// Physical address of the TCM that holds the slots
    pub tcm_base: PAddr,
    /// Byte offset of the first slot inside its TCM
    pub tcm_offset: u64,
}

impl TcmPool {
    pub const fn slot_count(&self) -> usize {
        self.mpu.count
    }

    /// Byte offset of the `index`-th slot of this pool inside its TCM
    pub const fn slot_offset(&self, index: usize) -> u64 {
        self.tcm_offset + index as u64 * SMALL_PAGE_SIZE
    }
}

/// Everything the paging code needs to know about the board it runs on
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PagingConfig {
    /// Slots in data TCM, used for pages that are not executable
    pub data_pool: TcmPool,
    /// Slots in instruction TCM, used for executable pages
    pub code_pool: TcmPool,
    /// Entries used to map whole non-paged regions
    pub direct_pool: MpuPool,
    /// The DMA channel used for paging transfers
    pub dma_channel: u8,
    /// The only address space that may register a pagetable at runtime
    pub init_pasid: Pasid,
}

impl PagingConfig {
    /// The layout used by the reference board.
    ///
    /// Entries 0..4 belong to the kernel itself.
    pub const fn board_default() -> Self {
        Self {
            direct_pool: MpuPool { first: 4, count: 8 },
            data_pool: TcmPool {
                mpu: MpuPool {
                    first: 12,
                    count: 24,
                },
                tcm_base: 0x0180_0000,
                tcm_offset: 0x8000,
            },
            code_pool: TcmPool {
                mpu: MpuPool {
                    first: 36,
                    count: 16,
                },
                tcm_base: 0x0100_0000,
                tcm_offset: 0x10000,
            },
            dma_channel: 0,
            init_pasid: 1,
        }
    }

    /// The total number of TCM paging slots
    pub const fn tcm_slot_count(&self) -> usize {
        self.data_pool.slot_count() + self.code_pool.slot_count()
    }

    /// Check that the layout can be used.
    ///
    /// # Panics
    /// Pools must not overlap, TCM slot counts must fit into the resident index and the direct pool must not be
    /// empty.
    pub fn validate(&self) {
        assert!(self.direct_pool.count > 0, "direct mpu pool is empty");
        assert!(
            self.tcm_slot_count() <= MAX_TCM_PAGES,
            "{} tcm slots configured but at most {} are supported",
            self.tcm_slot_count(),
            MAX_TCM_PAGES
        );
        let pools = [self.direct_pool, self.data_pool.mpu, self.code_pool.mpu];
        for (i, a) in pools.iter().enumerate() {
            for b in &pools[i + 1..] {
                assert!(!a.overlaps(b), "mpu pools {a:?} and {b:?} overlap");
            }
        }
        assert_eq!(
            self.data_pool.tcm_offset % SMALL_PAGE_SIZE,
            0,
            "data tcm pool is not page aligned"
        );
        assert_eq!(
            self.code_pool.tcm_offset % SMALL_PAGE_SIZE,
            0,
            "code tcm pool is not page aligned"
        );
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::board_default()
    }
}
