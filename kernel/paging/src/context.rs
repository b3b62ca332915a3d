//! The paging state of the kernel and the fault handler operating on it

use crate::addr::{small_page_base, Pasid, VAddr};
use crate::config::PagingConfig;
use crate::dma::{DmaEngine, DmaError};
use crate::entry::{MemoryKind, PageTableEntry};
use crate::fault::{check_access, direct_attributes, FaultAccess, FaultError, PageInOutcome};
use crate::mpu::{MpuController, MpuEntry};
use crate::pagetable::InvertedPageTable;
use crate::stats::PagingStats;
use crate::tcm::{InstallMode, TcmCache};
use crate::victim::VictimSelector;

/// Everything the paging code operates on.
///
/// There is exactly one instance of this per kernel, guarded by the global paging lock.
pub struct PagingContext<'mem, M, D, V> {
    pub(crate) table: InvertedPageTable<'mem>,
    pub(crate) registered: bool,
    cache: TcmCache<M, D>,
    selector: V,
}

impl<'mem, M, D, V> PagingContext<'mem, M, D, V>
where
    M: MpuController,
    D: DmaEngine,
    V: VictimSelector,
{
    /// Assemble a context from an already populated pagetable.
    ///
    /// # Panics
    /// The configuration must pass [`PagingConfig::validate`].
    pub fn new(
        config: PagingConfig,
        table: InvertedPageTable<'mem>,
        mpu: M,
        dma: D,
        selector: V,
    ) -> Self {
        let mut ctx = Self {
            table,
            registered: false,
            cache: TcmCache::new(config, mpu, dma),
            selector,
        };
        ctx.unmap_direct();
        ctx
    }

    pub fn table(&self) -> &InvertedPageTable<'mem> {
        &self.table
    }

    pub fn cache(&self) -> &TcmCache<M, D> {
        &self.cache
    }

    pub fn config(&self) -> &PagingConfig {
        self.cache.config()
    }

    pub fn stats(&self) -> PagingStats {
        self.cache.stats
    }

    /// Whether a pagetable was registered at runtime
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Look up the mapping of `vaddr` in the address space `pasid`
    pub fn resolve(&self, pasid: Pasid, vaddr: VAddr) -> &PageTableEntry {
        self.table.resolve(pasid, vaddr)
    }

    /// Make the page containing `vaddr` accessible for `access` by the address space `pasid`.
    ///
    /// Regions which are not demand paged are mapped as a whole through the direct pool.
    /// Demand paged regions are loaded into a TCM slot unless they already are resident.
    pub fn page_in(
        &mut self,
        pasid: Pasid,
        vaddr: VAddr,
        access: FaultAccess,
    ) -> Result<PageInOutcome, FaultError> {
        self.cache.stats.faults += 1;
        let result = self.try_page_in(pasid, vaddr, access, InstallMode::Load);
        self.account(pasid, vaddr, &result);
        result
    }

    /// Install the page containing `vaddr` without loading its previous content.
    ///
    /// The page is marked dirty so the new content reaches backing memory once it is evicted.
    /// The mapping must be writable demand paged memory.
    pub fn page_in_for_overwrite(
        &mut self,
        pasid: Pasid,
        vaddr: VAddr,
    ) -> Result<PageInOutcome, FaultError> {
        self.cache.stats.faults += 1;
        let result = self.try_page_in(pasid, vaddr, FaultAccess::Write, InstallMode::SkipRead);
        self.account(pasid, vaddr, &result);
        result
    }

    fn account(&mut self, pasid: Pasid, vaddr: VAddr, result: &Result<PageInOutcome, FaultError>) {
        match result {
            Ok(outcome) => log::debug!("paged in {vaddr:#x} for pasid {pasid}: {outcome:?}"),
            Err(e) => {
                self.cache.stats.failures += 1;
                log::warn!("could not page in {vaddr:#x} for pasid {pasid}: {e}");
            }
        }
    }

    fn try_page_in(
        &mut self,
        pasid: Pasid,
        vaddr: VAddr,
        access: FaultAccess,
        mode: InstallMode,
    ) -> Result<PageInOutcome, FaultError> {
        let page = small_page_base(vaddr);
        let entry = *self.table.resolve(pasid, page);
        let kind = check_access(&entry, access)?;

        if kind != MemoryKind::PagedTcm {
            return Ok(self.map_direct(&entry));
        }

        let paddr = entry.translate(page);
        let executable = entry.is_executable();
        let write = access == FaultAccess::Write;

        if let Some(slot) = self.cache.lookup(paddr) {
            if self.cache.is_code_slot(slot) == executable {
                self.cache.stats.resident_hits += 1;
                let offset = self.cache.remap(slot, page, write, entry.is_writable());
                return Ok(PageInOutcome::Tcm { slot, offset });
            }
            // resident in the wrong kind of TCM
            self.cache.writeback_and_invalidate(slot)?;
        }

        let pool = self.cache.pool_slots(executable);
        if pool.is_empty() {
            return Err(FaultError::NoTcmSlots);
        }
        let slot = pool.start + self.selector.select(pool.len()) % pool.len();
        self.cache.stats.misses += 1;
        let offset = self
            .cache
            .evict_and_install(slot, page, paddr, mode, write)?;
        Ok(PageInOutcome::Tcm { slot, offset })
    }

    fn map_direct(&mut self, entry: &PageTableEntry) -> PageInOutcome {
        let pool = self.cache.config().direct_pool;
        let mpu_index = pool.first + self.selector.select(pool.count) % pool.count;
        let mpu_entry = MpuEntry {
            virtual_address: entry.base_virtual_address,
            valid: true,
            physical_address: entry.physical_address,
            range: entry.size(),
            attributes: direct_attributes(entry),
        };
        log::trace!("programming direct mpu entry {mpu_index} with {mpu_entry:?}");
        self.cache.mpu_mut().write(mpu_index, mpu_entry);
        self.cache.stats.direct_mappings += 1;
        PageInOutcome::Direct { mpu_index }
    }

    /// Remove every mapping of the direct pool
    pub fn unmap_direct(&mut self) {
        for index in self.cache.config().direct_pool.indices() {
            self.cache.mpu_mut().invalidate(index);
        }
    }

    /// Write back the TCM slot with the given index if it is dirty
    pub fn writeback(&mut self, slot: usize) -> Result<(), DmaError> {
        self.cache.writeback(slot)
    }

    /// Write back and unmap the TCM slot with the given index
    pub fn writeback_and_invalidate(&mut self, slot: usize) -> Result<(), DmaError> {
        self.cache.writeback_and_invalidate(slot)
    }

    /// Write back every dirty TCM slot
    pub fn writeback_all(&mut self) -> Result<(), DmaError> {
        self.cache.writeback_all()
    }

    /// Write back and unmap every TCM slot
    pub fn invalidate_all(&mut self) -> Result<(), DmaError> {
        self.cache.invalidate_all()
    }
}
