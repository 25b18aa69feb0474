//! CompactFS Flash Abstraction Layer
//!
//! This crate defines the flash transport contract the CompactFS engine
//! drives, and the pieces chip-specific HALs (STM32F3, RP2040, etc.) plug
//! into it. This enables the same filesystem code to run on internal MCU
//! flash and on external NOR chips.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  compactfs-core (object filesystem)     │
//! └─────────────────────────────────────────┘
//!                     │  FlashTransport
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  compactfs-hal (this crate)             │
//! │  AlignedFlash<NorFlash, TransactionLock>│
//! └─────────────────────────────────────────┘
//!                     │  embedded-storage NorFlash
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ compactfs-hal-│       │ compactfs-hal-│
//! │    stm32f3    │       │    rp2040     │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Modules
//!
//! - [`flash::FlashTransport`] - Erase/read/write contract with a transaction bracket
//! - [`aligned::AlignedFlash`] - Halfword-aligned writes over any `NorFlash`
//! - [`lock::TransactionLock`] - Mutual exclusion seam for the transaction bracket
//! - `sim::SimFlash` - RAM NOR flash for host tests (feature `sim`)

#![no_std]
#![deny(unsafe_code)]

pub mod aligned;
pub mod flash;
pub mod lock;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Re-export key traits at crate root for convenience
pub use aligned::AlignedFlash;
pub use flash::{FlashError, FlashTransport};
pub use lock::{NoLock, TransactionLock};
#[cfg(feature = "timed-lock")]
pub use lock::TimedLock;
#[cfg(any(test, feature = "sim"))]
pub use sim::SimFlash;
