//! ABI definitions for calling into the kernel and interpreting its results
//!
//! # Syscall Overview
//!
//! The memory management subsystem defines the following syscalls:
//!
//! | Syscall | Number | Arguments | Return | Summary |
//! |--------|:-----------:|-----------|--------|---------|
//! | [register_pagetable](register_pagetable::RegisterPagetable) | *24* | [RegisterPagetableArgs](register_pagetable::RegisterPagetableArgs) | [NoValue](NoValue) | Hand the kernel a pre-built inverted pagetable (init task only, at most once) |
//!
//! # Register Usage
//!
//! A syscall is issued with `ecall`.
//! `a0` carries the syscall number and `a1-a7` carry the [`RawSyscallArgs`] whose meaning is defined by the
//! binding of the syscall.
//!
//! On return, `a0` holds `0` for success or a [`SyscallError`] code and `a1-a7` carry the
//! [`SyscallReturnData`] of a successful call.

#![no_std]
#![allow(clippy::enum_clike_unportable_variant)]

mod errors;
pub mod register_pagetable;
mod traits;

pub use errors::SyscallError;
pub use traits::*;
