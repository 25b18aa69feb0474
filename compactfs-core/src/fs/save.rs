//! Save: scratchpad sector rewrite
//!
//! Flash can only be erased a sector at a time and the target sector may
//! hold other records, so a save rewrites the whole sector:
//!
//! 1. erase the scratch sector
//! 2. copy the target sector into scratch
//! 3. erase the target sector
//! 4. copy back everything before the record
//! 5. write header, payload and checksum
//! 6. copy back everything after the record
//!
//! Between steps 3 and 6 the siblings only exist in scratch. Losing power
//! there loses the whole sector; a transport error there aborts without
//! rollback and the sector must be considered unreliable.

use compactfs_hal::FlashTransport;

use super::CompactFs;
use crate::checksum::Checksum;
use crate::error::FsError;
use crate::record::FileHeader;
use crate::table::{checked_record_size, read_header};

/// Bytes moved per read/program during a sector copy
const COPY_CHUNK: usize = 32;

impl<T: FlashTransport, C: Checksum> CompactFs<T, C> {
    /// Store `payload` as the contents of an object instance
    ///
    /// The first save of an instance appends a table entry; later saves
    /// rewrite the record in place and must use the same payload length.
    pub fn save(&mut self, object_id: u32, instance_id: u16, payload: &[u8]) -> Result<(), FsError> {
        self.transaction(|fs| fs.save_record(object_id, instance_id, payload))
    }

    fn save_record(&mut self, object_id: u32, instance_id: u16, payload: &[u8]) -> Result<(), FsError> {
        let record_len = checked_record_size(&self.layout, payload.len())?;

        let address = match self
            .table
            .lookup(&mut self.transport, &self.layout, object_id, instance_id)?
        {
            Some(address) => {
                self.check_rewrite(address, object_id, instance_id, record_len)?;
                address
            }
            None => self.table.allocate(
                &mut self.transport,
                &self.layout,
                object_id,
                instance_id,
                payload.len(),
            )?,
        };

        let header = FileHeader {
            object_id,
            instance_id,
            size: record_len as u16,
        }
        .to_bytes();
        let crc = C::update(C::update(0, &header), payload);

        trace!("saving {:#x}/{} at {:#x}", object_id, instance_id, address);
        self.rewrite_sector(address, record_len, &[&header, payload, &[crc]])
    }

    /// Check that a new record of `record_len` bytes fits the existing slot
    fn check_rewrite(
        &mut self,
        address: u32,
        object_id: u32,
        instance_id: u16,
        record_len: u32,
    ) -> Result<(), FsError> {
        let layout = self.layout;
        let end = address as u64 + record_len as u64;
        let sector_end = layout.sector_base(address) as u64 + layout.sector_size as u64;
        if end > sector_end {
            return Err(FsError::RecordTooLarge);
        }

        let header = read_header(&mut self.transport, address)?;
        if header.names(object_id, instance_id) {
            if header.size as u32 != record_len {
                warn!(
                    "{:#x}/{}: stored size {} != {}",
                    object_id, instance_id, header.size, record_len
                );
                return Err(FsError::SizeMismatch);
            }
            return Ok(());
        }

        // Deleted or never completed: the old length is gone, so the next
        // record in the table bounds the slot
        let next = self
            .table
            .following_record(&mut self.transport, &layout, address)?;
        match next {
            Some(next) if end > next as u64 => Err(FsError::SizeMismatch),
            _ => Ok(()),
        }
    }

    /// Replace `record_len` bytes at `address` with `chunks`, keeping the
    /// rest of the sector
    fn rewrite_sector(&mut self, address: u32, record_len: u32, chunks: &[&[u8]]) -> Result<(), FsError> {
        let sector_len = self.layout.sector_size;
        let scratch = self.layout.scratch_addr;
        let sector = self.layout.sector_base(address);
        let head = address - sector;
        let tail = head + record_len;

        self.transport.erase_sector(scratch).map_err(|e| {
            error!("scratch erase failed: {}", e);
            e
        })?;
        self.copy(sector, scratch, sector_len)?;

        self.transport.erase_sector(sector).map_err(|e| {
            error!("sector {:#x} erase failed: {}", sector, e);
            e
        })?;
        self.copy(scratch, sector, head)?;

        self.transport.write_chunks(address, chunks).map_err(|e| {
            error!("record write at {:#x} failed: {}", address, e);
            e
        })?;

        self.copy(scratch + tail, sector + tail, sector_len - tail)
    }

    /// Copy `len` bytes between flash ranges in small chunks
    fn copy(&mut self, from: u32, to: u32, len: u32) -> Result<(), FsError> {
        let mut buffer = [0u8; COPY_CHUNK];
        let mut done = 0;

        while done < len {
            let n = (len - done).min(COPY_CHUNK as u32) as usize;
            let chunk = &mut buffer[..n];
            self.transport.read(from + done, chunk)?;
            // Erased runs need no programming
            if chunk.iter().any(|&b| b != 0xFF) {
                self.transport.write(to + done, chunk).map_err(|e| {
                    error!("copy to {:#x} failed: {}", to + done, e);
                    e
                })?;
            }
            done += n as u32;
        }

        Ok(())
    }
}
