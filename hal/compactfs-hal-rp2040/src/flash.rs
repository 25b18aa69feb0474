//! Flash transport for RP2040
//!
//! The RP2040 runs from an external QSPI NOR chip mapped at `0x1000_0000`.
//! The filesystem lives in the last 64KB of it, well clear of the
//! firmware image. Programming is byte granular and erasure is 4KB.
//!
//! Flash operations stall XIP, so code running from flash on the other
//! core must be parked by embassy-rp while a transaction writes.

use compactfs_core::ChipLayout;
use compactfs_hal::{AlignedFlash, FlashError, TimedLock};
use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use embassy_time::Duration;
use portable_atomic::AtomicBool;

/// XIP address of flash offset 0
pub const FLASH_BASE: u32 = 0x1000_0000;

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB flash on Pico-class boards
pub const SETTINGS_PARTITION_SIZE: u32 = 64 * 1024;
pub const SETTINGS_PARTITION_START: u32 = FLASH_BASE + FLASH_SIZE as u32 - SETTINGS_PARTITION_SIZE;

/// Flash erase size for RP2040
pub const FLASH_ERASE_SIZE: u32 = ERASE_SIZE as u32;

/// How long a filesystem operation waits for another flash user
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(500);

static FLASH_LOCK: AtomicBool = AtomicBool::new(false);

/// Filesystem transport over the boot flash
pub type Rp2040Flash<'d> = AlignedFlash<Flash<'d, FLASH, Blocking, FLASH_SIZE>, TimedLock>;

/// Create the transport from the flash peripheral
pub fn new_transport<'d>(flash: Peri<'d, FLASH>) -> Result<Rp2040Flash<'d>, FlashError> {
    AlignedFlash::with_lock(Flash::new_blocking(flash), FLASH_BASE, flash_lock())
}

/// Lock for code that writes flash outside the filesystem (e.g. an updater)
pub fn flash_lock() -> TimedLock {
    TimedLock::new(&FLASH_LOCK, LOCK_TIMEOUT)
}

/// Settings partition: one sector of table (255 entries), one scratch
/// sector, 14 sectors of records
pub const fn settings_layout() -> ChipLayout {
    ChipLayout::standard(
        SETTINGS_PARTITION_START,
        SETTINGS_PARTITION_SIZE,
        FLASH_ERASE_SIZE,
        1,
    )
}
