//! Load: checksum-verified read
//!
//! The checksum is streamed through a small window before anything is
//! copied out, so the caller's buffer never sees unverified data.

use compactfs_hal::FlashTransport;

use super::CompactFs;
use crate::checksum::Checksum;
use crate::error::FsError;
use crate::record::{checksum_offset, payload_offset, record_size, FileHeader, FILE_HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Bytes fed to the checksum per read
const VERIFY_CHUNK: usize = 16;

impl<T: FlashTransport, C: Checksum> CompactFs<T, C> {
    /// Read an object instance into `out`
    ///
    /// `out.len()` is the payload length the object was saved with. On any
    /// error `out` is left untouched.
    pub fn load(&mut self, object_id: u32, instance_id: u16, out: &mut [u8]) -> Result<(), FsError> {
        self.transaction(|fs| fs.load_record(object_id, instance_id, out))
    }

    fn load_record(&mut self, object_id: u32, instance_id: u16, out: &mut [u8]) -> Result<(), FsError> {
        let address = self.locate(object_id, instance_id)?;

        let mut header_bytes = [0u8; FILE_HEADER_SIZE];
        self.transport.read(address, &mut header_bytes)?;
        let header = FileHeader::from_bytes(&header_bytes);

        if !header.names(object_id, instance_id) {
            warn!(
                "{:#x}/{}: header at {:#x} names {:#x}/{}",
                object_id, instance_id, address, header.object_id, header.instance_id
            );
            return Err(FsError::IdentityMismatch);
        }
        if out.len() > MAX_PAYLOAD_SIZE || header.size as usize != record_size(out.len()) {
            return Err(FsError::SizeMismatch);
        }

        let payload = address + payload_offset() as u32;
        let mut crc = C::update(0, &header_bytes);
        let mut window = [0u8; VERIFY_CHUNK];
        let mut done = 0;
        while done < out.len() {
            let n = (out.len() - done).min(VERIFY_CHUNK);
            self.transport.read(payload + done as u32, &mut window[..n])?;
            crc = C::update(crc, &window[..n]);
            done += n;
        }

        let mut stored = [0u8; 1];
        self.transport
            .read(address + checksum_offset(out.len()) as u32, &mut stored)?;
        if stored[0] != crc {
            warn!(
                "{:#x}/{}: checksum {:#x} != {:#x}",
                object_id, instance_id, stored[0], crc
            );
            return Err(FsError::ChecksumMismatch);
        }

        self.transport.read(payload, out)?;
        Ok(())
    }
}
