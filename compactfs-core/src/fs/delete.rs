//! Logical delete
//!
//! The record is zeroed in place; its sector is not erased and its table
//! entry stays. The next save of the same instance reuses the slot.

use compactfs_hal::FlashTransport;

use super::CompactFs;
use crate::checksum::Checksum;
use crate::error::FsError;
use crate::table::read_header;

const ZEROS: [u8; 32] = [0; 32];

impl<T: FlashTransport, C: Checksum> CompactFs<T, C> {
    /// Zero the record of an object instance
    ///
    /// Deleting an already deleted instance succeeds without writing.
    /// A header that names nothing, such as the erased header left by a
    /// first save that never completed, is reported as `IdentityMismatch`
    /// and left alone: its size field cannot be trusted.
    pub fn delete(&mut self, object_id: u32, instance_id: u16) -> Result<(), FsError> {
        self.transaction(|fs| fs.delete_record(object_id, instance_id))
    }

    fn delete_record(&mut self, object_id: u32, instance_id: u16) -> Result<(), FsError> {
        let address = self.locate(object_id, instance_id)?;
        let header = read_header(&mut self.transport, address)?;

        if header.is_cleared() {
            return Ok(());
        }
        if !header.names(object_id, instance_id) {
            return Err(FsError::IdentityMismatch);
        }

        let sector_end = self.layout.sector_base(address) + self.layout.sector_size;
        let end = (address + header.size as u32).min(sector_end);
        let mut at = address;
        while at < end {
            let n = ((end - at) as usize).min(ZEROS.len());
            self.transport.write(at, &ZEROS[..n])?;
            at += n as u32;
        }

        debug!("deleted {:#x}/{} at {:#x}", object_id, instance_id, address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::testing::{test_flash, test_layout, CountingDelay, TestFlash, BASE};

    const FILES: u32 = BASE + 2 * 2048;

    fn mounted() -> CompactFs<TestFlash> {
        let config = FsConfig::new().with_magic_retries(0, 0);
        let mut fs = CompactFs::new(test_flash(), test_layout(), config).unwrap();
        fs.init(&mut CountingDelay::default()).unwrap();
        fs
    }

    #[test]
    fn test_delete_zeroes_record_only() {
        let mut fs = mounted();
        fs.save(1, 0, &[7; 50]).unwrap();
        fs.save(2, 0, &[8; 4]).unwrap();
        let erases = fs.transport_mut().flash().erase_count();

        fs.delete(1, 0).unwrap();

        let flash = fs.transport_mut().flash();
        assert_eq!(flash.erase_count(), erases);
        assert!(flash.peek((FILES - BASE) as usize, 60).iter().all(|&b| b == 0));
        assert_eq!(flash.peek((FILES + 60 + 8 - BASE) as usize, 4), &[8; 4]);
    }

    #[test]
    fn test_delete_keeps_table_entry() {
        let mut fs = mounted();
        fs.save(1, 0, &[7; 4]).unwrap();
        fs.delete(1, 0).unwrap();

        assert_eq!(fs.object_count(), Some(1));
        assert_eq!(fs.lookup(1, 0), Ok(Some(FILES)));
        let mut out = [0u8; 4];
        assert_eq!(fs.load(1, 0, &mut out), Err(FsError::IdentityMismatch));
    }

    #[test]
    fn test_delete_twice() {
        let mut fs = mounted();
        fs.save(1, 0, &[7; 4]).unwrap();
        fs.delete(1, 0).unwrap();

        let writes = fs.transport_mut().flash().write_count();
        assert_eq!(fs.delete(1, 0), Ok(()));
        assert_eq!(fs.transport_mut().flash().write_count(), writes);
    }

    #[test]
    fn test_delete_unknown() {
        let mut fs = mounted();
        assert_eq!(fs.delete(9, 9), Err(FsError::NotFound));
    }

    #[test]
    fn test_delete_erased_header() {
        let mut fs = mounted();
        fs.save(1, 0, &[7; 4]).unwrap();
        // Record region as an interrupted first save leaves it
        fs.transport_mut().erase_sector(FILES).unwrap();

        let writes = fs.transport_mut().flash().write_count();
        assert_eq!(fs.delete(1, 0), Err(FsError::IdentityMismatch));
        assert_eq!(fs.transport_mut().flash().write_count(), writes);
    }
}
