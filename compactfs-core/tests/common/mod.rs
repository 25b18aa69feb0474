//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use compactfs_core::{ChipLayout, CompactFs, FsConfig};
use compactfs_hal::{AlignedFlash, FlashError, NoLock, SimFlash, TransactionLock};
use embedded_hal::delay::DelayNs;

pub const BASE: u32 = 0x0800_0000;
pub const SECTOR: u32 = 2048;
/// First data sector of the standard test layout
pub const FILES: u32 = BASE + 2 * SECTOR;

/// Eight 2 KiB sectors: magic + table, scratch, six data sectors
pub type Sim = SimFlash<16384, 2048>;
pub type Flash<L = NoLock> = AlignedFlash<Sim, L>;
pub type Fs<L = NoLock> = CompactFs<Flash<L>>;

pub fn layout() -> ChipLayout {
    ChipLayout::standard(BASE, 8 * SECTOR, SECTOR, 1)
}

pub fn config() -> FsConfig {
    FsConfig::new().with_magic_retries(3, 1000)
}

pub fn flash() -> Flash {
    AlignedFlash::new(Sim::new(), BASE).unwrap()
}

/// Blank chip, formatted by the first init
pub fn mounted() -> Fs {
    let mut fs = Fs::new(flash(), layout(), config()).unwrap();
    fs.init(&mut CountingDelay::default()).unwrap();
    fs
}

/// Drop the engine and mount the same flash again
pub fn remount<L: TransactionLock>(fs: Fs<L>) -> Fs<L> {
    let mut fs = Fs::new(fs.into_transport(), layout(), config()).unwrap();
    fs.init(&mut CountingDelay::default()).unwrap();
    fs
}

/// Device offset of an absolute address
pub fn offset(address: u32) -> usize {
    (address - BASE) as usize
}

#[derive(Debug, Default)]
pub struct CountingDelay {
    pub calls: u32,
    pub total_us: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_us += u64::from(ns / 1000);
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_us += u64::from(us);
    }
}

/// Observable state of a [`ProbeLock`]
#[derive(Debug, Default)]
pub struct LockProbe {
    pub held: Cell<bool>,
    pub acquired: Cell<u32>,
    pub released: Cell<u32>,
    /// Acquisition fails while set, as if another context held the lock
    pub contended: Cell<bool>,
}

/// Transaction lock that records its use
#[derive(Clone, Default)]
pub struct ProbeLock(pub Rc<LockProbe>);

impl TransactionLock for ProbeLock {
    fn acquire(&mut self) -> Result<(), FlashError> {
        if self.0.contended.get() {
            return Err(FlashError::LockTimeout);
        }
        assert!(!self.0.held.get(), "lock taken twice");
        self.0.held.set(true);
        self.0.acquired.set(self.0.acquired.get() + 1);
        Ok(())
    }

    fn release(&mut self) -> Result<(), FlashError> {
        if !self.0.held.replace(false) {
            return Err(FlashError::LockNotHeld);
        }
        self.0.released.set(self.0.released.get() + 1);
        Ok(())
    }
}

/// Engine whose transport goes through a [`ProbeLock`]
pub fn probed() -> (Fs<ProbeLock>, Rc<LockProbe>) {
    let lock = ProbeLock::default();
    let probe = lock.0.clone();
    let flash = AlignedFlash::with_lock(Sim::new(), BASE, lock).unwrap();
    let mut fs = Fs::new(flash, layout(), config()).unwrap();
    fs.init(&mut CountingDelay::default()).unwrap();
    (fs, probe)
}
