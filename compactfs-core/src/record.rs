//! On-flash record formats
//!
//! Explicit little-endian codecs for the two fixed structures the
//! filesystem persists. Field order and sizes are part of the on-flash
//! format and never depend on in-memory struct layout.
//!
//! Table entry (16 bytes):
//! ```text
//! ┌───────────┬────────────┬──────────────┬─────────────┐
//! │ magic u32 │ object u32 │ instance u32 │ address u32 │
//! └───────────┴────────────┴──────────────┴─────────────┘
//! ```
//!
//! File record (header + payload + checksum, each padded to even length):
//! ```text
//! ┌────────────┬──────────────┬──────────┬─────────────────┬─────────────┐
//! │ object u32 │ instance u16 │ size u16 │ payload [+ pad] │ crc [+ pad] │
//! └────────────┴──────────────┴──────────┴─────────────────┴─────────────┘
//! ```
//! `size` is the total padded record length.

use compactfs_hal::flash::round_up_even;

/// Size of one object table entry
pub const TABLE_ENTRY_SIZE: usize = 16;

/// Size of a file record header
pub const FILE_HEADER_SIZE: usize = 8;

/// Size of the record checksum
pub const CHECKSUM_SIZE: usize = 1;

/// Largest payload whose record length still fits the header's `size` field
pub const MAX_PAYLOAD_SIZE: usize =
    u16::MAX as usize - FILE_HEADER_SIZE - round_up_even(CHECKSUM_SIZE) - 1;

/// Object table entry binding an object instance to its record address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableEntry {
    pub magic: u32,
    pub object_id: u32,
    pub instance_id: u32,
    pub address: u32,
}

impl TableEntry {
    /// Encode to the on-flash byte layout
    pub fn to_bytes(&self) -> [u8; TABLE_ENTRY_SIZE] {
        let mut bytes = [0u8; TABLE_ENTRY_SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.object_id.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.instance_id.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.address.to_le_bytes());
        bytes
    }

    /// Decode from the on-flash byte layout
    pub fn from_bytes(bytes: &[u8; TABLE_ENTRY_SIZE]) -> Self {
        Self {
            magic: read_u32(bytes, 0),
            object_id: read_u32(bytes, 4),
            instance_id: read_u32(bytes, 8),
            address: read_u32(bytes, 12),
        }
    }

    /// Whether this entry names the given object instance
    pub fn names(&self, object_id: u32, instance_id: u16) -> bool {
        self.object_id == object_id && self.instance_id == instance_id as u32
    }
}

/// Header at the start of every file record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FileHeader {
    pub object_id: u32,
    pub instance_id: u16,
    /// Total padded record length
    pub size: u16,
}

impl FileHeader {
    /// Encode to the on-flash byte layout
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut bytes = [0u8; FILE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.object_id.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.instance_id.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.size.to_le_bytes());
        bytes
    }

    /// Decode from the on-flash byte layout
    pub fn from_bytes(bytes: &[u8; FILE_HEADER_SIZE]) -> Self {
        Self {
            object_id: read_u32(bytes, 0),
            instance_id: u16::from_le_bytes([bytes[4], bytes[5]]),
            size: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// Whether this header belongs to the given object instance
    ///
    /// A cleared (all-zero) header belongs to nothing, not even object 0.
    pub fn names(&self, object_id: u32, instance_id: u16) -> bool {
        !self.is_cleared() && self.object_id == object_id && self.instance_id == instance_id
    }

    /// Whether the header was zeroed by a delete
    pub fn is_cleared(&self) -> bool {
        self.object_id == 0 && self.instance_id == 0 && self.size == 0
    }
}

/// Total record length for a payload of `payload_len` bytes
///
/// Header, payload and checksum are each rounded up to an even length.
pub const fn record_size(payload_len: usize) -> usize {
    round_up_even(FILE_HEADER_SIZE) + round_up_even(payload_len) + round_up_even(CHECKSUM_SIZE)
}

/// Offset of the payload from the record start
pub const fn payload_offset() -> usize {
    round_up_even(FILE_HEADER_SIZE)
}

/// Offset of the checksum byte from the record start
pub const fn checksum_offset(payload_len: usize) -> usize {
    payload_offset() + round_up_even(payload_len)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_entry_layout() {
        let entry = TableEntry {
            magic: 0x0B7E_C75A,
            object_id: 0x1122_3344,
            instance_id: 7,
            address: 0x0800_1000,
        };
        let bytes = entry.to_bytes();

        assert_eq!(&bytes[0..4], &[0x5A, 0xC7, 0x7E, 0x0B]);
        assert_eq!(&bytes[4..8], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(&bytes[8..12], &[7, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0x00, 0x10, 0x00, 0x08]);
        assert_eq!(TableEntry::from_bytes(&bytes), entry);
    }

    #[test]
    fn test_file_header_layout() {
        let header = FileHeader {
            object_id: 0xDEAD_BEEF,
            instance_id: 0x0102,
            size: 0x0030,
        };
        let bytes = header.to_bytes();

        assert_eq!(bytes, [0xEF, 0xBE, 0xAD, 0xDE, 0x02, 0x01, 0x30, 0x00]);
        assert_eq!(FileHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn test_erased_header_names_nothing() {
        let header = FileHeader::from_bytes(&[0xFF; FILE_HEADER_SIZE]);
        assert!(!header.names(0, 0));
        assert_eq!(header.size, 0xFFFF);
    }

    #[test]
    fn test_cleared_header_names_nothing() {
        let header = FileHeader::from_bytes(&[0; FILE_HEADER_SIZE]);
        assert!(header.is_cleared());
        assert!(!header.names(0, 0));
    }

    #[test]
    fn test_record_size_padding() {
        assert_eq!(record_size(0), 10);
        assert_eq!(record_size(1), 12);
        assert_eq!(record_size(2), 12);
        assert_eq!(record_size(3), 14);
        assert_eq!(record_size(90), 100);
        assert!(record_size(MAX_PAYLOAD_SIZE) <= u16::MAX as usize);
    }

    #[test]
    fn test_checksum_offset() {
        assert_eq!(payload_offset(), 8);
        assert_eq!(checksum_offset(3), 12);
        assert_eq!(checksum_offset(4), 12);
    }

    #[test]
    fn test_entry_names_widened_instance() {
        let entry = TableEntry {
            magic: 0,
            object_id: 5,
            instance_id: 0x1_0003,
            address: 0,
        };
        // Instance ids are 16-bit on the record side; a wider table value never matches
        assert!(!entry.names(5, 3));
    }
}
