//! RP2040-specific HAL for CompactFS
//!
//! This crate adapts the RP2040 boot flash to `compactfs-hal`:
//!
//! - Flash transport over embassy-rp's blocking flash driver
//! - Settings partition layout in the top 64KB of flash
//! - A flash lock shared with other writers of the same chip

#![no_std]

pub mod flash;

pub use flash::{flash_lock, new_transport, settings_layout, Rp2040Flash, FLASH_SIZE};
