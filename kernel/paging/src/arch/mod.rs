//! Bindings of the paging collaborators to real hardware

#[cfg(target_arch = "riscv64")]
mod riscv64;

#[cfg(target_arch = "riscv64")]
pub use riscv64::{CsrMpu, CycleCounterSelector};
