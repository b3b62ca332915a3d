#![allow(dead_code)]

use paging::addr::PAddr;
use paging::config::{MpuPool, PagingConfig, TcmPool};
use paging::dma::{DmaEngine, DmaError, DmaFlags, DmaTransfer};
use paging::mpu::{MpuController, MpuEntry, MpuIndex};
use paging::pagetable::InvertedPageTable;
use paging::{PagingContext, VictimSelector};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

pub const DATA_TCM_BASE: PAddr = 0x10_0000;
pub const CODE_TCM_BASE: PAddr = 0x20_0000;

/// Direct pool 0..2, four data slots on entries 2..6 and two code slots on entries 6..8
pub fn config() -> PagingConfig {
    PagingConfig {
        direct_pool: MpuPool { first: 0, count: 2 },
        data_pool: TcmPool {
            mpu: MpuPool { first: 2, count: 4 },
            tcm_base: DATA_TCM_BASE,
            tcm_offset: 0,
        },
        code_pool: TcmPool {
            mpu: MpuPool { first: 6, count: 2 },
            tcm_base: CODE_TCM_BASE,
            tcm_offset: 0x4000,
        },
        dma_channel: 1,
        init_pasid: 1,
    }
}

#[derive(Default)]
pub struct RecordingMpu {
    pub entries: [MpuEntry; 16],
    pub writes: usize,
}

impl MpuController for RecordingMpu {
    fn read(&self, index: MpuIndex) -> MpuEntry {
        self.entries[index]
    }

    fn write(&mut self, index: MpuIndex, entry: MpuEntry) {
        self.writes += 1;
        self.entries[index] = entry;
    }
}

/// Memory as seen by the simulated DMA engine.
///
/// Every page is represented by a single word.
#[derive(Default)]
pub struct DmaState {
    pub started: Vec<DmaTransfer>,
    pending: Vec<DmaTransfer>,
    pub flushes: usize,
    pub backing: BTreeMap<PAddr, u64>,
    /// Keyed by (is instruction tcm, byte offset)
    pub tcm: BTreeMap<(bool, u64), u64>,
    pub fail_flush: bool,
}

impl DmaState {
    pub fn writebacks(&self) -> usize {
        self.started.iter().filter(|t| t.is_writeback()).count()
    }

    pub fn reads(&self) -> usize {
        self.started.iter().filter(|t| !t.is_writeback()).count()
    }
}

/// A DMA engine which copies page words between `backing` and `tcm` when flushed
#[derive(Default, Clone)]
pub struct SimulatedDma {
    pub state: Rc<RefCell<DmaState>>,
}

impl DmaEngine for SimulatedDma {
    fn start_transfer(&mut self, transfer: DmaTransfer) {
        let mut state = self.state.borrow_mut();
        state.started.push(transfer);
        state.pending.push(transfer);
    }

    fn flush(&mut self) -> Result<(), DmaError> {
        let mut state = self.state.borrow_mut();
        state.flushes += 1;
        if state.fail_flush {
            state.pending.clear();
            return Err(DmaError::TransferFailed { channel: 1 });
        }
        let pending = core::mem::take(&mut state.pending);
        for transfer in pending {
            let tcm_key = (transfer.flags.contains(DmaFlags::IMEM), transfer.tcm_offset);
            if transfer.is_writeback() {
                let value = state.tcm.get(&tcm_key).copied().unwrap_or(0);
                state.backing.insert(transfer.physical_address, value);
            } else {
                let value = state
                    .backing
                    .get(&transfer.physical_address)
                    .copied()
                    .unwrap_or(0);
                state.tcm.insert(tcm_key, value);
            }
        }
        Ok(())
    }
}

/// Hands out a predetermined sequence of indices, then 0
#[derive(Default)]
pub struct ScriptedSelector {
    pub script: VecDeque<usize>,
}

impl ScriptedSelector {
    pub fn new(script: &[usize]) -> Self {
        Self {
            script: script.iter().copied().collect(),
        }
    }
}

impl VictimSelector for ScriptedSelector {
    fn select(&mut self, pool_len: usize) -> usize {
        self.script.pop_front().unwrap_or(0) % pool_len
    }
}

pub type TestContext<'mem> = PagingContext<'mem, RecordingMpu, SimulatedDma, ScriptedSelector>;

pub fn context<'mem>(
    table: InvertedPageTable<'mem>,
    script: &[usize],
) -> (TestContext<'mem>, Rc<RefCell<DmaState>>) {
    let dma = SimulatedDma::default();
    let state = dma.state.clone();
    let ctx = PagingContext::new(
        config(),
        table,
        RecordingMpu::default(),
        dma,
        ScriptedSelector::new(script),
    );
    (ctx, state)
}
