//! Flash transport abstractions
//!
//! Provides the trait the object filesystem uses to talk to raw flash.
//! Implementations only need to honour flash physics: erasure is sector
//! granular and programming can only clear bits.

use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// Errors from flash transport operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Address range falls outside the device
    OutOfBounds,
    /// Device rejected the alignment of an operation
    NotAligned,
    /// Read failed
    Read,
    /// Program operation failed
    Write,
    /// Sector erase failed
    Erase,
    /// Transaction lock could not be taken in time
    LockTimeout,
    /// Transaction lock released without being held
    LockNotHeld,
    /// Device geometry not supported by this transport
    Unsupported,
}

impl FlashError {
    /// Map a `NorFlash` error, falling back to `other` for device-specific kinds
    pub fn from_nor<E: NorFlashError>(error: E, other: FlashError) -> Self {
        match error.kind() {
            NorFlashErrorKind::OutOfBounds => FlashError::OutOfBounds,
            NorFlashErrorKind::NotAligned => FlashError::NotAligned,
            _ => other,
        }
    }
}

/// Flash transport trait
///
/// All addresses are absolute (as laid out in the chip's memory map).
/// Every call is synchronous and returns once the physical operation
/// has completed.
pub trait FlashTransport {
    /// Acquire the transaction lock
    ///
    /// Brackets one logical filesystem operation. The default is a no-op
    /// for single-threaded builds.
    fn start_transaction(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    /// Release the transaction lock
    fn end_transaction(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    /// Erase the sector containing `address`
    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError>;

    /// Read `buffer.len()` bytes starting at `address`
    ///
    /// Any alignment and any length.
    fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), FlashError>;

    /// Program `data` starting at `address`
    ///
    /// Must accept an odd start address and an odd length, merging with
    /// the neighbouring byte of the programming unit.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Program several chunks back to back starting at `address`
    ///
    /// Each chunk is padded to an even length with a zero byte before the
    /// next chunk begins. Returns the address following the last chunk.
    fn write_chunks(&mut self, address: u32, chunks: &[&[u8]]) -> Result<u32, FlashError> {
        let mut addr = address;

        for chunk in chunks {
            let even = chunk.len() & !1;
            if even > 0 {
                self.write(addr, &chunk[..even])?;
            }
            if chunk.len() & 1 != 0 {
                // Last byte shares its halfword with the zero pad
                self.write(addr + even as u32, &[chunk[even], 0])?;
            }
            addr += round_up_even(chunk.len()) as u32;
        }

        Ok(addr)
    }
}

/// Round a length up to the next even value
pub const fn round_up_even(len: usize) -> usize {
    (len + 1) & !1
}
