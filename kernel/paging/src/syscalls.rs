//! The syscall facing side of paging
//!
//! Arguments of these functions are supplied by tasks and therefore untrusted.
//! Malformed input is reported as a [`SyscallError`] and never causes a panic.

use crate::addr::{Pasid, VAddr};
use crate::context::PagingContext;
use crate::dma::DmaEngine;
use crate::entry::PageTableEntry;
use crate::mpu::MpuController;
use crate::pagetable::InvertedPageTable;
use crate::victim::VictimSelector;
use core::mem;
use riscv::PhysMapper;
use syscall_abi::register_pagetable::{RegisterPagetable, RegisterPagetableArgs};
use syscall_abi::{
    IntoRawSysResponse, NoValue, RawSyscallArgs, RawSyscallReturn, SyscallBinding, SyscallError,
    SyscallResult,
};

impl<'mem, M, D, V> PagingContext<'mem, M, D, V>
where
    M: MpuController,
    D: DmaEngine,
    V: VictimSelector,
{
    /// Check that the buffer `vaddr..vaddr + size` is completely covered by one mapping of `pasid` that permits the
    /// requested access.
    ///
    /// Returns the covering mapping so that the caller can translate addresses of the buffer.
    pub fn validate_buffer(
        &self,
        pasid: Pasid,
        vaddr: VAddr,
        size: u64,
        write: bool,
    ) -> Result<&PageTableEntry, SyscallError> {
        if size == 0 || vaddr.checked_add(size).is_none() {
            return Err(SyscallError::InvalidArg);
        }

        let entry = self.table.resolve(pasid, vaddr);
        if entry.is_null() {
            return Err(SyscallError::InvalidAccess);
        }
        let offset = vaddr - entry.base_virtual_address;
        if size > entry.size() - offset {
            return Err(SyscallError::InvalidAccess);
        }
        if write && !entry.is_writable() {
            return Err(SyscallError::InvalidAccess);
        }
        Ok(entry)
    }

    /// Replace the boot time pagetable with one that the init task built.
    ///
    /// Everything that was paged in from the previous table is written back and unmapped.
    ///
    /// # Safety
    /// `args.base` is dereferenced after translating it with `mapper`.
    /// The caller must make sure that it describes memory which stays reserved for the pagetable during `'mem`.
    pub unsafe fn register_pagetable(
        &mut self,
        caller: Pasid,
        args: RegisterPagetableArgs,
        mapper: &impl PhysMapper,
    ) -> SyscallResult<NoValue> {
        if caller != self.config().init_pasid {
            log::warn!("pasid {caller} tried to register a pagetable");
            return Err(SyscallError::InvalidAccess);
        }
        if self.registered {
            return Err(SyscallError::AlreadyRegistered);
        }
        if args.base == 0
            || args.base % mem::align_of::<PageTableEntry>() != 0
            || !args.entry_count.is_power_of_two()
            || args.probe_count >= args.entry_count
        {
            return Err(SyscallError::InvalidArg);
        }
        if args
            .entry_count
            .checked_mul(mem::size_of::<PageTableEntry>())
            .and_then(|size| args.base.checked_add(size))
            .is_none()
        {
            return Err(SyscallError::InvalidArg);
        }

        self.invalidate_all().map_err(|e| {
            log::warn!("could not flush paged data before registering pagetable: {e}");
            SyscallError::UnknownError
        })?;
        self.unmap_direct();

        let entries = mapper.phys_to_mapped_mut(args.base as *mut PageTableEntry);
        let entries = core::slice::from_raw_parts_mut(entries, args.entry_count);
        self.table = InvertedPageTable::from_prebuilt(entries, args.probe_count);
        self.registered = true;
        log::debug!(
            "registered pagetable at {:#x} with {} entries ({} used), max probe distance {}",
            args.base,
            args.entry_count,
            self.table.len(),
            args.probe_count
        );
        Ok(NoValue)
    }
}

/// Handle a syscall if it belongs to the paging subsystem.
///
/// Returns `None` for syscall numbers that are handled elsewhere.
///
/// # Safety
/// See [`PagingContext::register_pagetable`].
pub unsafe fn handle_paging_syscall<M, D, V>(
    ctx: &mut PagingContext<'_, M, D, V>,
    caller: Pasid,
    syscall_no: usize,
    raw_args: RawSyscallArgs,
    mapper: &impl PhysMapper,
) -> Option<RawSyscallReturn>
where
    M: MpuController,
    D: DmaEngine,
    V: VictimSelector,
{
    match syscall_no {
        RegisterPagetable::SYSCALL_NO => {
            let args = match RegisterPagetableArgs::try_from(raw_args) {
                Ok(args) => args,
                Err(never) => match never {},
            };
            log::trace!("handling register_pagetable syscall from pasid {caller}: {args:?}");
            Some(ctx.register_pagetable(caller, args, mapper).into_response())
        }
        _ => None,
    }
}
