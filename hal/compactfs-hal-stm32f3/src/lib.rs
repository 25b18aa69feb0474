//! STM32F3-specific HAL for CompactFS
//!
//! Adapts the STM32F30x internal flash to `compactfs-hal`'s
//! [`FlashTransport`](compactfs_hal::FlashTransport) and provides the
//! settings partition layout.
//!
//! # Features
//!
//! - `stm32f303vc` - STM32F303VC (F3 Discovery)
//! - `stm32f303cc` - STM32F303CC
//! - `defmt` - Enable debug formatting support
//!
//! # Usage
//!
//! ```ignore
//! let p = embassy_stm32::init(Default::default());
//! let transport = compactfs_hal_stm32f3::new_transport(p.FLASH)?;
//! let mut fs: CompactFs<_> =
//!     CompactFs::new(transport, compactfs_hal_stm32f3::settings_layout(), FsConfig::new())?;
//! fs.init(&mut embassy_time::Delay)?;
//! ```

#![no_std]

pub mod flash;

pub use flash::{flash_lock, new_transport, settings_layout, Stm32f3Flash};
