//! Shared fixtures for unit tests

use compactfs_hal::{AlignedFlash, SimFlash};
use embedded_hal::delay::DelayNs;

use crate::config::ChipLayout;

pub const BASE: u32 = 0x0800_0000;

/// Eight 2 KiB sectors: magic + table, scratch, six data sectors
pub type TestFlash = AlignedFlash<SimFlash<16384, 2048>>;

pub fn test_layout() -> ChipLayout {
    ChipLayout::standard(BASE, 8 * 2048, 2048, 1)
}

pub fn test_flash() -> TestFlash {
    AlignedFlash::new(SimFlash::new(), BASE).unwrap()
}

/// Delay that only counts how often it was asked to wait
#[derive(Default)]
pub struct CountingDelay {
    pub calls: u32,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_us(&mut self, _us: u32) {
        self.calls += 1;
    }
}
