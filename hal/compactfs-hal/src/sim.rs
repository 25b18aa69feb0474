//! RAM-backed NOR flash for host testing
//!
//! Behaves like a real NOR part as far as the filesystem can tell:
//! - erased bytes read as `0xFF`
//! - programming ANDs new data into the cell (bits only go 1 -> 0)
//! - programming is halfword granular, erasure is `ERASE` granular
//!
//! Adds fault injection and direct memory access for tests.

use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

/// Simulated NOR flash of `SIZE` bytes with `ERASE`-byte sectors
#[derive(Debug, Clone)]
pub struct SimFlash<const SIZE: usize, const ERASE: usize> {
    memory: [u8; SIZE],
    erase_count: u32,
    write_count: u32,
    /// Mutating operations left before an injected failure
    fail_in: Option<u32>,
    /// Byte that no longer takes programming
    dead_cell: Option<usize>,
}

impl<const SIZE: usize, const ERASE: usize> Default for SimFlash<SIZE, ERASE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize, const ERASE: usize> SimFlash<SIZE, ERASE> {
    /// Create a fully erased device
    pub fn new() -> Self {
        Self {
            memory: [0xFF; SIZE],
            erase_count: 0,
            write_count: 0,
            fail_in: None,
            dead_cell: None,
        }
    }

    /// Number of sector erases performed
    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    /// Number of program operations performed
    pub fn write_count(&self) -> u32 {
        self.write_count
    }

    /// Fail the mutating operation that follows `ops` successful ones
    ///
    /// The fault is one-shot: the failing operation leaves memory untouched
    /// and later operations succeed again.
    pub fn fail_after(&mut self, ops: u32) {
        self.fail_in = Some(ops);
    }

    /// Make the byte at `offset` ignore programming
    ///
    /// Writes covering it still report success, so only a read-back
    /// notices. Erase keeps working.
    pub fn kill_cell(&mut self, offset: usize) {
        self.dead_cell = Some(offset);
    }

    /// Inspect raw memory
    pub fn peek(&self, offset: usize, len: usize) -> &[u8] {
        &self.memory[offset..offset + len]
    }

    /// Overwrite raw memory, bypassing flash semantics
    pub fn poke(&mut self, offset: usize, data: &[u8]) {
        self.memory[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Flip bits of one byte, bypassing flash semantics
    pub fn corrupt(&mut self, offset: usize, mask: u8) {
        self.memory[offset] ^= mask;
    }

    fn inject_fault(&mut self) -> Result<(), NorFlashErrorKind> {
        match self.fail_in {
            Some(0) => {
                self.fail_in = None;
                Err(NorFlashErrorKind::Other)
            }
            Some(n) => {
                self.fail_in = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<const SIZE: usize, const ERASE: usize> ErrorType for SimFlash<SIZE, ERASE> {
    type Error = NorFlashErrorKind;
}

impl<const SIZE: usize, const ERASE: usize> ReadNorFlash for SimFlash<SIZE, ERASE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.memory[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl<const SIZE: usize, const ERASE: usize> NorFlash for SimFlash<SIZE, ERASE> {
    const WRITE_SIZE: usize = 2;
    const ERASE_SIZE: usize = ERASE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        self.inject_fault()?;
        self.memory[from as usize..to as usize].fill(0xFF);
        self.erase_count += (to - from) / ERASE as u32;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        self.inject_fault()?;
        let start = offset as usize;
        for (i, byte) in bytes.iter().enumerate() {
            if self.dead_cell != Some(start + i) {
                self.memory[start + i] &= *byte;
            }
        }
        self.write_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Sim = SimFlash<2048, 512>;

    #[test]
    fn test_starts_erased() {
        let flash = Sim::new();
        assert!(flash.peek(0, 2048).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_write_only_clears_bits() {
        let mut flash = Sim::new();
        flash.write(0, &[0b1010_1010, 0xFF]).unwrap();
        flash.write(0, &[0b0101_0101, 0x0F]).unwrap();
        assert_eq!(flash.peek(0, 2), &[0x00, 0x0F]);
    }

    #[test]
    fn test_erase_restores_sector_only() {
        let mut flash = Sim::new();
        flash.write(510, &[0, 0, 0, 0]).unwrap();
        flash.erase(512, 1024).unwrap();
        assert_eq!(flash.peek(510, 4), &[0, 0, 0xFF, 0xFF]);
        assert_eq!(flash.erase_count(), 1);
    }

    #[test]
    fn test_rejects_misaligned() {
        let mut flash = Sim::new();
        assert_eq!(flash.write(1, &[0, 0]), Err(NorFlashErrorKind::NotAligned));
        assert_eq!(flash.write(0, &[0]), Err(NorFlashErrorKind::NotAligned));
        assert_eq!(flash.erase(100, 612), Err(NorFlashErrorKind::NotAligned));
        assert_eq!(flash.erase(0, 4096), Err(NorFlashErrorKind::OutOfBounds));
    }

    #[test]
    fn test_fault_is_one_shot() {
        let mut flash = Sim::new();
        flash.fail_after(1);
        assert!(flash.write(0, &[0, 0]).is_ok());
        assert_eq!(flash.write(2, &[0, 0]), Err(NorFlashErrorKind::Other));
        assert_eq!(flash.peek(2, 2), &[0xFF, 0xFF]);
        assert!(flash.write(2, &[0, 0]).is_ok());
    }

    #[test]
    fn test_dead_cell_ignores_writes() {
        let mut flash = Sim::new();
        flash.kill_cell(3);
        assert!(flash.write(2, &[0x12, 0x34]).is_ok());
        assert_eq!(flash.peek(2, 2), &[0x12, 0xFF]);
        assert_eq!(flash.write_count(), 1);
    }
}
