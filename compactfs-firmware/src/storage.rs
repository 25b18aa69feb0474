//! Shared filesystem and the uptime task
//!
//! The engine is owned by one async mutex; every task that touches
//! settings goes through it. The flash lock inside the transport still
//! guards against writers outside the filesystem.

use compactfs_core::{CompactFs, FsError, StoredObject};
use compactfs_hal_rp2040::Rp2040Flash;
use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Ticker};

use crate::records::UptimeRecord;

/// Uptime save interval in seconds
pub const UPTIME_SAVE_INTERVAL_S: u64 = 60;

pub type Fs = CompactFs<Rp2040Flash<'static>>;
pub type SharedFs = Mutex<CriticalSectionRawMutex, Fs>;

/// Load instance `instance` of `O`, or its default if missing or unreadable
pub fn load_or_default<O: StoredObject + Default>(fs: &mut Fs, instance: u16) -> O {
    match fs.load_object::<O>(instance) {
        Ok(object) => object,
        Err(FsError::NotFound) => O::default(),
        Err(e) => {
            warn!("object {:#x}/{} unreadable: {}", O::OBJECT_ID, instance, e);
            O::default()
        }
    }
}

/// Uptime task - saves the run time once per interval
#[embassy_executor::task]
pub async fn uptime_task(fs: &'static SharedFs) {
    info!("Uptime task started");

    let mut ticker = Ticker::every(Duration::from_secs(UPTIME_SAVE_INTERVAL_S));
    let start = Instant::now();

    loop {
        ticker.next().await;

        let mut fs = fs.lock().await;
        let mut record: UptimeRecord = load_or_default(&mut fs, 0);
        record.uptime_s = start.elapsed().as_secs() as u32;
        record.saves += 1;

        match fs.save_object(0, &record) {
            Ok(()) => debug!("Uptime saved: {}", record),
            Err(e) => error!("Uptime save failed: {}", e),
        }
    }
}
