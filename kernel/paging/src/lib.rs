//! Software MMU of the lunatix kernel
//!
//! The cores this kernel targets have no page table walker.
//! Instead, a small MPU translates a handful of virtual ranges and everything else faults into the kernel which then
//! decides how the faulting address is made accessible:
//!
//! 1. The address is looked up in the [inverted pagetable](pagetable::InvertedPageTable) which holds every mapping
//!    of every address space.
//! 2. Mappings of normal memory and devices are programmed into an MPU entry as a whole.
//! 3. Demand paged mappings are copied page by page into tightly coupled memory by the [TCM cache](tcm::TcmCache)
//!    which writes dirty pages back via DMA when their slot is needed for another page.
//!
//! All state is bundled in a [`PagingContext`] which the kernel keeps behind a [`PagingLock`].
//! The hardware is accessed through the [`MpuController`], [`DmaEngine`] and [`VictimSelector`] traits so that
//! everything above them can be tested on the host.
#![no_std]

pub mod addr;
pub mod arch;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod dma;
pub mod entry;
pub mod fault;
pub mod hash;
pub mod mpu;
pub mod pagetable;
pub mod resident;
pub mod stats;
pub mod syscalls;
pub mod tcm;
pub mod trap;
pub mod victim;

pub use context::PagingContext;
pub use dma::DmaEngine;
pub use mpu::MpuController;
pub use trap::{handle_page_fault, FaultResolution, PagingLock};
pub use victim::VictimSelector;
