//! Definitions for the `register_pagetable` syscall.
//!
//! The init task builds the complete inverted pagetable of the system in its own memory and then hands it to the
//! kernel with this syscall.
//! The kernel accepts exactly one such registration during its lifetime.

use crate::{NoValue, RawSyscallArgs, SyscallBinding, SyscallResult};
use core::convert::Infallible;

pub struct RegisterPagetable;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[repr(C)]
pub struct RegisterPagetableArgs {
    /// Physical address of the first pagetable entry
    pub base: usize,
    /// Number of entries in the table. Must be a power of two.
    pub entry_count: usize,
    /// The largest distance any entry has from its ideal slot
    pub probe_count: usize,
}

impl SyscallBinding for RegisterPagetable {
    const SYSCALL_NO: usize = 24;
    type CallArgs = RegisterPagetableArgs;
    type Return = SyscallResult<NoValue>;
}

impl From<RegisterPagetableArgs> for RawSyscallArgs {
    fn from(args: RegisterPagetableArgs) -> Self {
        [args.base, args.entry_count, args.probe_count, 0, 0, 0, 0]
    }
}

impl TryFrom<RawSyscallArgs> for RegisterPagetableArgs {
    type Error = Infallible;

    fn try_from(args: RawSyscallArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            base: args[0],
            entry_count: args[1],
            probe_count: args[2],
        })
    }
}
