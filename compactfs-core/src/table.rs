//! Object table manager
//!
//! The table is an append-only run of fixed-size entries starting at
//! `table_region_start`. The first entry whose magic does not match marks
//! the end of the table; entries are never edited or removed, so the
//! first hit for an object instance is authoritative.
//!
//! Only the number of valid entries is cached in RAM. It is recomputed by
//! [`ObjectTable::scan`] at init and bumped by [`ObjectTable::allocate`]
//! once a new entry has been read back from flash.

use compactfs_hal::FlashTransport;

use crate::config::ChipLayout;
use crate::error::FsError;
use crate::record::{record_size, FileHeader, TableEntry, FILE_HEADER_SIZE, MAX_PAYLOAD_SIZE, TABLE_ENTRY_SIZE};

/// Read table slot `index`
pub(crate) fn read_entry<T: FlashTransport>(
    transport: &mut T,
    layout: &ChipLayout,
    index: u32,
) -> Result<TableEntry, FsError> {
    let mut bytes = [0u8; TABLE_ENTRY_SIZE];
    transport.read(layout.table_slot(index), &mut bytes)?;
    Ok(TableEntry::from_bytes(&bytes))
}

/// Read the file record header at `address`
pub(crate) fn read_header<T: FlashTransport>(
    transport: &mut T,
    address: u32,
) -> Result<FileHeader, FsError> {
    let mut bytes = [0u8; FILE_HEADER_SIZE];
    transport.read(address, &mut bytes)?;
    Ok(FileHeader::from_bytes(&bytes))
}

/// Record length for `payload_len`, checked against the format and sector size
pub(crate) fn checked_record_size(layout: &ChipLayout, payload_len: usize) -> Result<u32, FsError> {
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(FsError::RecordTooLarge);
    }
    let len = record_size(payload_len) as u32;
    if len > layout.sector_size {
        return Err(FsError::RecordTooLarge);
    }
    Ok(len)
}

/// Move `candidate` forward until a record of `record_len` bytes fits
///
/// Records never straddle a sector boundary and never land in the
/// scratch sector. `record_len` must not exceed the sector size.
pub fn place_record(layout: &ChipLayout, candidate: u32, record_len: u32) -> u32 {
    let mut address = candidate;

    let offset = layout.sector_offset(address);
    if record_len > layout.sector_size - offset {
        address = address - offset + layout.sector_size;
    }

    if layout.overlaps_scratch(address, address.saturating_add(record_len)) {
        address = layout.scratch_addr + layout.sector_size;
    }

    address
}

/// Cached view of the object table
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectTable {
    /// Valid entries, `None` until scanned
    count: Option<u32>,
}

impl ObjectTable {
    /// Create an unscanned table
    pub const fn new() -> Self {
        Self { count: None }
    }

    /// Number of valid entries, if the table has been scanned
    pub fn count(&self) -> Option<u32> {
        self.count
    }

    /// Forget the cached count; the table must be scanned again
    pub fn invalidate(&mut self) {
        self.count = None;
    }

    fn require(&self) -> Result<u32, FsError> {
        self.count.ok_or(FsError::NotInitialized)
    }

    /// Count consecutive valid entries from the table start
    pub fn scan<T: FlashTransport>(
        &mut self,
        transport: &mut T,
        layout: &ChipLayout,
    ) -> Result<u32, FsError> {
        let mut count = 0;
        while count < layout.table_capacity() {
            let entry = read_entry(transport, layout, count)?;
            if entry.magic != layout.object_magic {
                break;
            }
            count += 1;
        }

        self.count = Some(count);
        Ok(count)
    }

    /// Find the record address of an object instance
    pub fn lookup<T: FlashTransport>(
        &self,
        transport: &mut T,
        layout: &ChipLayout,
        object_id: u32,
        instance_id: u16,
    ) -> Result<Option<u32>, FsError> {
        let count = self.require()?;

        for index in 0..count {
            let entry = read_entry(transport, layout, index)?;
            if entry.magic != layout.object_magic {
                break;
            }
            if entry.names(object_id, instance_id) {
                return Ok(Some(entry.address));
            }
        }

        Ok(None)
    }

    /// First data address past every record the table references
    ///
    /// A record whose header no longer carries its own identity (deleted,
    /// or its first save never completed) has no trustworthy length, so it
    /// is taken to reserve the rest of its sector.
    pub fn next_free_address<T: FlashTransport>(
        &self,
        transport: &mut T,
        layout: &ChipLayout,
    ) -> Result<u32, FsError> {
        let count = self.require()?;
        let files = layout.files_region_start..layout.chip_end();
        let mut next = layout.files_region_start;

        for index in 0..count {
            let entry = read_entry(transport, layout, index)?;
            if entry.magic != layout.object_magic {
                break;
            }
            if !files.contains(&entry.address) {
                warn!("table entry {} points outside the files region", index);
                continue;
            }

            let header = read_header(transport, entry.address)?;
            let intact = entry.instance_id <= u16::MAX as u32
                && header.names(entry.object_id, entry.instance_id as u16);
            let end = if intact {
                entry.address + header.size as u32
            } else {
                layout.sector_base(entry.address) + layout.sector_size
            };
            next = next.max(end);
        }

        Ok(next)
    }

    /// Lowest record address the table references above `address`
    pub fn following_record<T: FlashTransport>(
        &self,
        transport: &mut T,
        layout: &ChipLayout,
        address: u32,
    ) -> Result<Option<u32>, FsError> {
        let count = self.require()?;
        let mut following: Option<u32> = None;

        for index in 0..count {
            let entry = read_entry(transport, layout, index)?;
            if entry.magic != layout.object_magic {
                break;
            }
            if entry.address > address {
                following = Some(following.map_or(entry.address, |f| f.min(entry.address)));
            }
        }

        Ok(following)
    }

    /// Append a table entry for a new object instance
    ///
    /// Returns the record address reserved for it. The cached count only
    /// moves once the entry has been read back intact.
    pub fn allocate<T: FlashTransport>(
        &mut self,
        transport: &mut T,
        layout: &ChipLayout,
        object_id: u32,
        instance_id: u16,
        payload_len: usize,
    ) -> Result<u32, FsError> {
        let count = self.require()?;
        let record_len = checked_record_size(layout, payload_len)?;

        if count >= layout.table_capacity() {
            return Err(FsError::TableFull);
        }

        let candidate = self.next_free_address(transport, layout)?;
        let address = place_record(layout, candidate, record_len);

        if address as u64 + record_len as u64 > layout.chip_end() as u64 {
            return Err(FsError::FileSpaceExhausted);
        }

        let entry = TableEntry {
            magic: layout.object_magic,
            object_id,
            instance_id: instance_id as u32,
            address,
        };

        if let Err(e) = transport.write(layout.table_slot(count), &entry.to_bytes()) {
            error!("table slot {} write failed: {}", count, e);
            return Err(FsError::TableWriteFailed);
        }

        if read_entry(transport, layout, count)? != entry {
            error!("table slot {} did not read back", count);
            return Err(FsError::TableWriteFailed);
        }

        self.count = Some(count + 1);
        debug!(
            "allocated object {:#x}/{} at {:#x} ({} bytes)",
            object_id, instance_id, address, record_len
        );
        Ok(address)
    }
}
