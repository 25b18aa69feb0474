//! STM32F3 internal flash transport
//!
//! STM32F30x flash programs in halfwords and erases 2 KiB pages. A
//! halfword can only be programmed while erased or to `0x0000`; the
//! filesystem only issues even-aligned writes and zero fills, so the
//! read-modify-write path of [`AlignedFlash`] is never hit on this chip.

use compactfs_core::ChipLayout;
use compactfs_hal::{AlignedFlash, FlashError, TimedLock};
use embassy_stm32::flash::{Blocking, Flash, FLASH_BASE, FLASH_SIZE};
use embassy_stm32::peripherals::FLASH;
use embassy_stm32::Peri;
use embassy_time::Duration;
use portable_atomic::AtomicBool;

/// Flash page size for STM32F30x
pub const FLASH_PAGE_SIZE: u32 = 2 * 1024;

/// Flash reserved for the settings filesystem at the top of the array
pub const SETTINGS_PARTITION_SIZE: u32 = 32 * 1024;

/// First address of the settings partition
pub const SETTINGS_PARTITION_START: u32 =
    FLASH_BASE as u32 + FLASH_SIZE as u32 - SETTINGS_PARTITION_SIZE;

/// How long a filesystem operation waits for another flash user
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared by every transport and any other writer of the flash array
static FLASH_LOCK: AtomicBool = AtomicBool::new(false);

/// Filesystem transport over the internal flash
pub type Stm32f3Flash<'d> = AlignedFlash<Flash<'d, Blocking>, TimedLock>;

/// Create the transport from the flash peripheral
pub fn new_transport<'d>(flash: Peri<'d, FLASH>) -> Result<Stm32f3Flash<'d>, FlashError> {
    AlignedFlash::with_lock(Flash::new_blocking(flash), FLASH_BASE as u32, flash_lock())
}

/// Lock for code that writes the flash array outside the filesystem
pub fn flash_lock() -> TimedLock {
    TimedLock::new(&FLASH_LOCK, LOCK_TIMEOUT)
}

/// Settings partition: one page of table (127 entries), one scratch
/// page, 14 pages of records
pub const fn settings_layout() -> ChipLayout {
    ChipLayout::standard(
        SETTINGS_PARTITION_START,
        SETTINGS_PARTITION_SIZE,
        FLASH_PAGE_SIZE,
        1,
    )
}
