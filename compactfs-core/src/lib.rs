//! Low-RAM object filesystem for raw flash
//!
//! Stores small, fixed-size objects (settings, calibration, counters)
//! directly in sector-erasable flash without a RAM cache of the flash
//! contents. The only state kept in memory is the chip layout and the
//! number of entries in the on-flash object table.
//!
//! - Object table: append-only index from (object id, instance id) to a
//!   record address
//! - Records: header, payload and an 8-bit CRC, never straddling a sector
//! - Save: scratchpad rewrite of the record's sector
//! - Delete: zero the record in place, keep the table entry
//!
//! Flash access goes through [`compactfs_hal::FlashTransport`].

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod checksum;
pub mod config;
pub mod error;
pub mod fs;
pub mod record;
pub mod table;
pub mod typed;

#[cfg(test)]
mod testing;

pub use checksum::{Checksum, Crc8};
pub use config::{ChipLayout, FsConfig, LayoutError};
pub use error::FsError;
pub use fs::{CompactFs, InitReport, Usage};
pub use typed::{StoredObject, MAX_OBJECT_SIZE};
