//! CompactFS - demo firmware
//!
//! Mounts the settings filesystem in the top 64KB of the RP2040 boot
//! flash, counts boots, and keeps the run time saved while the board is
//! up. Serves as a smoke test of the filesystem on real flash.

#![no_std]
#![no_main]

use compactfs_core::{CompactFs, FsConfig};
use compactfs_hal_rp2040::settings_layout;
use defmt::*;
use embassy_executor::Spawner;
use embassy_sync::mutex::Mutex;
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::records::{BootRecord, DeviceInfo, UptimeRecord};
use crate::storage::{load_or_default, Fs, SharedFs};

mod records;
mod storage;

// Filesystem shared by every task (must live forever)
static FS: StaticCell<SharedFs> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("CompactFS demo starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let transport = unwrap!(compactfs_hal_rp2040::new_transport(p.FLASH));
    let mut fs: Fs = unwrap!(CompactFs::new(transport, settings_layout(), FsConfig::new()));

    let report = unwrap!(fs.init(&mut Delay));
    if report.recreated {
        warn!("Settings table was invalid, flash reformatted");
    }
    info!("Filesystem mounted: {} objects", report.objects);

    if report.objects == 0 {
        if let Err(e) = fs.save_object(0, &DeviceInfo::default()) {
            error!("Device info save failed: {}", e);
        }
    }
    let device: DeviceInfo = load_or_default(&mut fs, 0);
    info!("Device: {} rev {}", device.name.as_str(), device.hw_rev);

    // Carry the last saved uptime over into the boot record
    let last_run: UptimeRecord = load_or_default(&mut fs, 0);
    let mut boot: BootRecord = load_or_default(&mut fs, 0);
    boot.boots += 1;
    boot.last_uptime_s = last_run.uptime_s;
    match fs.save_object(0, &boot) {
        Ok(()) => info!("Boot #{} (previous run {}s)", boot.boots, boot.last_uptime_s),
        Err(e) => error!("Boot record save failed: {}", e),
    }

    match fs.usage() {
        Ok(usage) => info!(
            "Usage: {}/{} table entries, {} data bytes free",
            usage.objects, usage.table_capacity, usage.free_bytes
        ),
        Err(e) => warn!("Usage report failed: {}", e),
    }

    let fs = FS.init(Mutex::new(fs));
    spawner.spawn(storage::uptime_task(fs)).unwrap();
}
