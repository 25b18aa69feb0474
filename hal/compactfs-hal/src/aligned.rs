//! Halfword-aligned flash adapter
//!
//! Wraps any `embedded-storage` NOR flash and turns it into a
//! [`FlashTransport`]. All alignment arithmetic for the write path lives
//! here: callers hand in arbitrary addresses and lengths, the device only
//! ever sees programming units it accepts.
//!
//! An odd start address or an odd trailing byte is merged with the other
//! byte of its halfword (read-modify-write); programming only clears
//! bits, so rewriting the neighbour with its current value leaves it
//! intact.

use embedded_storage::nor_flash::NorFlash;

use crate::flash::{FlashError, FlashTransport};
use crate::lock::{NoLock, TransactionLock};

/// Programming unit this adapter merges partial writes into
const HALFWORD: u32 = 2;

/// Flash transport over a `NorFlash` device
///
/// `base` is the absolute address of device offset 0 (e.g. `0x0800_0000`
/// for STM32 internal flash), so the filesystem can work with the chip's
/// memory map directly.
pub struct AlignedFlash<F, L = NoLock> {
    flash: F,
    base: u32,
    lock: L,
}

impl<F: NorFlash> AlignedFlash<F, NoLock> {
    /// Create an adapter without a transaction lock
    pub fn new(flash: F, base: u32) -> Result<Self, FlashError> {
        Self::with_lock(flash, base, NoLock)
    }
}

impl<F: NorFlash, L: TransactionLock> AlignedFlash<F, L> {
    /// Create an adapter whose transactions go through `lock`
    ///
    /// Fails with [`FlashError::Unsupported`] for devices that cannot
    /// program single halfwords or cannot read single bytes.
    pub fn with_lock(flash: F, base: u32, lock: L) -> Result<Self, FlashError> {
        if F::READ_SIZE != 1 || HALFWORD as usize % F::WRITE_SIZE != 0 {
            return Err(FlashError::Unsupported);
        }
        Ok(Self { flash, base, lock })
    }

    /// Absolute address of device offset 0
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Erase granularity of the underlying device
    pub fn erase_size(&self) -> u32 {
        F::ERASE_SIZE as u32
    }

    /// Get the wrapped device
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Get the wrapped device for low-level access
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Consume the adapter and return the device
    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Translate an absolute range into a device offset
    fn offset(&self, address: u32, len: usize) -> Result<u32, FlashError> {
        let offset = address.checked_sub(self.base).ok_or(FlashError::OutOfBounds)?;
        if offset as usize + len > self.flash.capacity() {
            return Err(FlashError::OutOfBounds);
        }
        Ok(offset)
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        self.flash
            .write(offset, data)
            .map_err(|e| FlashError::from_nor(e, FlashError::Write))
    }

    fn read_raw(&mut self, offset: u32, buffer: &mut [u8]) -> Result<(), FlashError> {
        self.flash
            .read(offset, buffer)
            .map_err(|e| FlashError::from_nor(e, FlashError::Read))
    }

    /// Program one halfword where only one byte is new
    fn merge_byte(&mut self, offset: u32, byte: u8) -> Result<(), FlashError> {
        let unit = offset & !(HALFWORD - 1);
        let mut halfword = [0u8; 2];
        self.read_raw(unit, &mut halfword)?;
        halfword[(offset - unit) as usize] = byte;
        self.program(unit, &halfword)
    }
}

impl<F: NorFlash, L: TransactionLock> FlashTransport for AlignedFlash<F, L> {
    fn start_transaction(&mut self) -> Result<(), FlashError> {
        self.lock.acquire()
    }

    fn end_transaction(&mut self) -> Result<(), FlashError> {
        self.lock.release()
    }

    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError> {
        let offset = self.offset(address, 1)?;
        let erase_size = F::ERASE_SIZE as u32;
        let start = offset - offset % erase_size;

        self.flash
            .erase(start, start + erase_size)
            .map_err(|e| FlashError::from_nor(e, FlashError::Erase))
    }

    fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), FlashError> {
        if buffer.is_empty() {
            return Ok(());
        }
        let offset = self.offset(address, buffer.len())?;
        self.read_raw(offset, buffer)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        if data.is_empty() {
            return Ok(());
        }
        let mut offset = self.offset(address, data.len())?;
        let mut data = data;

        if offset & 1 != 0 {
            self.merge_byte(offset, data[0])?;
            offset += 1;
            data = &data[1..];
        }

        let even = data.len() & !1;
        if even > 0 {
            self.program(offset, &data[..even])?;
        }

        if data.len() & 1 != 0 {
            self.merge_byte(offset + even as u32, data[even])?;
        }

        Ok(())
    }
}
