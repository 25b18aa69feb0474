//! Objects persisted by the firmware
//!
//! Object ids are fixed forever once a board has been flashed; the
//! payload sizes leave headroom for the largest postcard encoding.

use compactfs_core::StoredObject;
use heapless::String;
use serde::{Deserialize, Serialize};

/// Reset counter
#[derive(Debug, Clone, Default, Serialize, Deserialize, defmt::Format)]
pub struct BootRecord {
    pub boots: u32,
    /// Uptime of the previous run in seconds, as last saved
    pub last_uptime_s: u32,
}

impl StoredObject for BootRecord {
    const OBJECT_ID: u32 = 0xB007_0001;
    const SIZE: usize = 12;
}

/// Periodically saved uptime of the current run
#[derive(Debug, Clone, Default, Serialize, Deserialize, defmt::Format)]
pub struct UptimeRecord {
    pub uptime_s: u32,
    pub saves: u32,
}

impl StoredObject for UptimeRecord {
    const OBJECT_ID: u32 = 0xB007_0002;
    const SIZE: usize = 12;
}

/// Board identity, written once on a fresh chip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String<24>,
    pub hw_rev: u8,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        let mut name = String::new();
        // Fits the capacity
        let _ = name.push_str("compactfs-demo");
        Self { name, hw_rev: 1 }
    }
}

impl StoredObject for DeviceInfo {
    const OBJECT_ID: u32 = 0xB007_0003;
    const SIZE: usize = 32;
}
