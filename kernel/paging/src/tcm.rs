//! The TCM page cache
//!
//! Pages of [`PagedTcm`](crate::entry::MemoryKind::PagedTcm) mappings live in backing memory and are copied into a
//! small number of TCM slots on demand.
//! Every slot is mapped by exactly one MPU entry of its pool.
//! Slots `0..data_pool.count` are located in data TCM, the remaining ones in instruction TCM.
//!
//! Writes are tracked through the MPU: a slot is only mapped writable while it is dirty, so the first write to a
//! clean page faults and marks it dirty.
//!
//! All transfers are flushed before an operation returns which means that the MPU never points at a slot whose
//! content is still in flight.

use crate::addr::{small_page_base, PAddr, VAddr, SMALL_PAGE_SIZE};
use crate::config::{PagingConfig, TcmPool};
use crate::dma::{DmaEngine, DmaError, DmaFlags, DmaTransfer};
use crate::mpu::{MpuAttributes, MpuController, MpuEntry, MpuIndex};
use crate::resident::{ResidentIndex, ResidentPage};
use crate::stats::PagingStats;
use core::ops::Range;

/// Whether the previous content of a page needs to be loaded when it is installed into a slot
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InstallMode {
    /// Copy the page from backing memory into the slot
    Load,
    /// Leave the slot content as it is because the caller overwrites the whole page
    SkipRead,
}

/// Location of a TCM slot in hardware
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct SlotLocation {
    mpu_index: MpuIndex,
    tcm_address: PAddr,
    tcm_offset: u64,
    executable: bool,
}

pub struct TcmCache<M, D> {
    config: PagingConfig,
    index: ResidentIndex,
    mpu: M,
    dma: D,
    pub(crate) stats: PagingStats,
}

impl<M: MpuController, D: DmaEngine> TcmCache<M, D> {
    /// Create a cache in which no slot is resident.
    ///
    /// All MPU entries of both TCM pools are invalidated.
    ///
    /// # Panics
    /// The configuration must pass [`PagingConfig::validate`].
    pub fn new(config: PagingConfig, mut mpu: M, dma: D) -> Self {
        config.validate();
        for index in config
            .data_pool
            .mpu
            .indices()
            .chain(config.code_pool.mpu.indices())
        {
            mpu.invalidate(index);
        }
        Self {
            config,
            index: ResidentIndex::new(),
            mpu,
            dma,
            stats: PagingStats::default(),
        }
    }

    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    pub fn slot_count(&self) -> usize {
        self.config.tcm_slot_count()
    }

    /// The slots which may hold executable or non-executable pages respectively
    pub fn pool_slots(&self, executable: bool) -> Range<usize> {
        let data = self.config.data_pool.slot_count();
        match executable {
            false => 0..data,
            true => data..data + self.config.code_pool.slot_count(),
        }
    }

    pub fn page(&self, slot: usize) -> &ResidentPage {
        self.index.page(slot)
    }

    /// Find the slot holding the page at `paddr`
    pub fn lookup(&self, paddr: PAddr) -> Option<usize> {
        self.index.lookup(paddr)
    }

    pub fn mpu(&self) -> &M {
        &self.mpu
    }

    pub(crate) fn mpu_mut(&mut self) -> &mut M {
        &mut self.mpu
    }

    pub fn dma(&self) -> &D {
        &self.dma
    }

    fn locate(&self, slot: usize) -> SlotLocation {
        let data_count = self.config.data_pool.slot_count();
        let (pool, index, executable): (&TcmPool, usize, bool) = match slot < data_count {
            true => (&self.config.data_pool, slot, false),
            false => (&self.config.code_pool, slot - data_count, true),
        };
        assert!(index < pool.slot_count(), "tcm slot {slot} does not exist");
        SlotLocation {
            mpu_index: pool.mpu.first + index,
            tcm_address: pool.tcm_base + pool.slot_offset(index),
            tcm_offset: pool.slot_offset(index),
            executable,
        }
    }

    /// Byte offset of `slot` inside its TCM
    pub fn slot_offset(&self, slot: usize) -> u64 {
        self.locate(slot).tcm_offset
    }

    /// Whether `slot` lives in instruction TCM
    pub fn is_code_slot(&self, slot: usize) -> bool {
        self.locate(slot).executable
    }

    fn slot_attributes(executable: bool, writable: bool) -> MpuAttributes {
        let mut attributes = MpuAttributes::READ | MpuAttributes::COHERENT;
        attributes.set(MpuAttributes::EXECUTE, executable);
        attributes.set(MpuAttributes::WRITE, writable && !executable);
        attributes
    }

    fn transfer(&mut self, location: SlotLocation, paddr: PAddr, write: bool) {
        let mut flags = DmaFlags::empty();
        flags.set(DmaFlags::WRITE, write);
        flags.set(DmaFlags::IMEM, location.executable);
        let transfer = DmaTransfer {
            physical_address: paddr,
            tcm_offset: location.tcm_offset,
            length: SMALL_PAGE_SIZE,
            channel: self.config.dma_channel,
            flags,
        };
        log::trace!("starting dma transfer {transfer:?}");
        self.dma.start_transfer(transfer);
    }

    fn program(&mut self, index: MpuIndex, entry: MpuEntry) {
        log::trace!("programming mpu entry {index} with {entry:?}");
        self.mpu.write(index, entry);
    }

    /// Write the content of `slot` back to its backing memory if it is dirty.
    ///
    /// The MPU entry of the slot is demoted to read-only before the transfer so that later writes fault again.
    pub fn writeback(&mut self, slot: usize) -> Result<(), DmaError> {
        let page = *self.index.page(slot);
        if !page.is_dirty() {
            return Ok(());
        }
        let location = self.locate(slot);
        log::trace!(
            "writing back tcm slot {slot} to {:#x}",
            page.physical_address()
        );

        self.index.clear_dirty(slot);
        let mut entry = self.mpu.read(location.mpu_index);
        entry.attributes.remove(MpuAttributes::WRITE);
        self.program(location.mpu_index, entry);

        self.transfer(location, page.physical_address(), true);
        self.stats.writebacks += 1;
        if let Err(e) = self.dma.flush() {
            // the data never reached backing memory
            self.index.mark_dirty(slot);
            return Err(e);
        }
        Ok(())
    }

    /// Write `slot` back and then remove it from the MPU and the resident index
    pub fn writeback_and_invalidate(&mut self, slot: usize) -> Result<(), DmaError> {
        if !self.index.page(slot).is_resident() {
            return Ok(());
        }
        self.writeback(slot)?;
        let location = self.locate(slot);
        log::trace!("invalidating tcm slot {slot}");
        self.mpu.invalidate(location.mpu_index);
        self.index.remove(slot);
        Ok(())
    }

    /// Reuse `slot` for the page at `paddr` and map it at `vaddr`.
    ///
    /// If the slot is resident, its current page is written back first.
    /// When `dirty` is set the new page is installed writable and marked as dirty.
    ///
    /// Returns the byte offset of the slot in its TCM.
    pub fn evict_and_install(
        &mut self,
        slot: usize,
        vaddr: VAddr,
        paddr: PAddr,
        mode: InstallMode,
        dirty: bool,
    ) -> Result<u64, DmaError> {
        let location = self.locate(slot);
        let paddr = small_page_base(paddr);

        if self.index.page(slot).is_resident() {
            log::debug!(
                "evicting {:#x} from tcm slot {slot}",
                self.index.page(slot).physical_address()
            );
            self.writeback(slot)?;
            self.index.remove(slot);
            self.stats.evictions += 1;
        }

        self.program(
            location.mpu_index,
            MpuEntry {
                virtual_address: small_page_base(vaddr),
                valid: true,
                physical_address: location.tcm_address,
                range: SMALL_PAGE_SIZE,
                attributes: Self::slot_attributes(location.executable, dirty),
            },
        );
        if mode == InstallMode::Load {
            self.transfer(location, paddr, false);
        }
        self.index.insert(slot, paddr, dirty);

        if let Err(e) = self.dma.flush() {
            self.mpu.invalidate(location.mpu_index);
            self.index.clear_dirty(slot);
            self.index.remove(slot);
            return Err(e);
        }
        Ok(location.tcm_offset)
    }

    /// Point the MPU entry of a resident `slot` at `vaddr`, upgrading it to writable if `write` is set.
    ///
    /// `writable` is the permission of the mapping that `vaddr` belongs to. A dirty slot is only mapped writable if
    /// that mapping permits writes.
    ///
    /// Returns the byte offset of the slot in its TCM.
    pub fn remap(&mut self, slot: usize, vaddr: VAddr, write: bool, writable: bool) -> u64 {
        debug_assert!(writable || !write);
        debug_assert!(self.index.page(slot).is_resident());
        let location = self.locate(slot);
        if write {
            self.index.mark_dirty(slot);
        }
        let dirty = self.index.page(slot).is_dirty();
        self.program(
            location.mpu_index,
            MpuEntry {
                virtual_address: small_page_base(vaddr),
                valid: true,
                physical_address: location.tcm_address,
                range: SMALL_PAGE_SIZE,
                attributes: Self::slot_attributes(location.executable, dirty && writable),
            },
        );
        location.tcm_offset
    }

    /// Write back every dirty slot.
    ///
    /// All slots are attempted, the first error is returned.
    pub fn writeback_all(&mut self) -> Result<(), DmaError> {
        let mut result = Ok(());
        for slot in 0..self.slot_count() {
            let outcome = self.writeback(slot);
            result = result.and(outcome);
        }
        result
    }

    /// Write back and invalidate every resident slot.
    ///
    /// All slots are attempted, the first error is returned.
    pub fn invalidate_all(&mut self) -> Result<(), DmaError> {
        let mut result = Ok(());
        for slot in 0..self.slot_count() {
            let outcome = self.writeback_and_invalidate(slot);
            result = result.and(outcome);
        }
        result
    }
}
