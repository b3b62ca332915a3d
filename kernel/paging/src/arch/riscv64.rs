use crate::mpu::{MpuController, MpuEntry, MpuIndex};
use crate::victim::VictimSelector;
use riscv::cpu::Cycle;
use riscv::mpu::{Mpu, MPU_VA_VALID};

/// The MPU of the executing hart, programmed through its CSR window
pub struct CsrMpu {
    _private: (),
}

impl CsrMpu {
    /// # Safety
    /// There must be only one instance per hart and no other code may program the MPU entries which are handed to
    /// the paging code.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MpuController for CsrMpu {
    fn read(&self, index: MpuIndex) -> MpuEntry {
        unsafe { Mpu::select(index) };
        let va = Mpu::read_va();
        MpuEntry {
            virtual_address: va & !MPU_VA_VALID,
            valid: va & MPU_VA_VALID != 0,
            physical_address: Mpu::read_pa(),
            range: Mpu::read_range(),
            attributes: Mpu::read_attributes(),
        }
    }

    fn write(&mut self, index: MpuIndex, entry: MpuEntry) {
        unsafe {
            Mpu::select(index);
            // disable the entry while it is inconsistent
            Mpu::write_va(0);
            Mpu::write_pa(entry.physical_address);
            Mpu::write_range(entry.range);
            Mpu::write_attributes(entry.attributes);
            if entry.valid {
                Mpu::write_va(entry.virtual_address | MPU_VA_VALID);
            }
        }
    }
}

/// Picks slots based on the free running cycle counter
#[derive(Debug, Default)]
pub struct CycleCounterSelector;

impl VictimSelector for CycleCounterSelector {
    fn select(&mut self, pool_len: usize) -> usize {
        (Cycle::read() % pool_len as u64) as usize
    }
}
