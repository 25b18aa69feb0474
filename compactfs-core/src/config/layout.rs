//! Chip layout
//!
//! Static description of the flash address ranges the filesystem owns.
//!
//! ```text
//! chip_begin                                                    chip end
//! ┌───────┬──────────────────┬─────────┬───────────────────────────────┐
//! │ magic │ object table ... │ scratch │ file records ...              │
//! └───────┴──────────────────┴─────────┴───────────────────────────────┘
//!         table_region_start  scratch   files_region_start
//! ```
//!
//! The order above is what [`ChipLayout::standard`] builds; any order that
//! passes [`ChipLayout::validate`] works.

use crate::record::TABLE_ENTRY_SIZE;

/// Size of the table magic slot in bytes
pub const TABLE_MAGIC_SIZE: u32 = 4;

/// Default table magic
pub const DEFAULT_TABLE_MAGIC: u32 = 0x7AB1_E5C5;

/// Default per-entry object magic
pub const DEFAULT_OBJECT_MAGIC: u32 = 0x0B7E_C75A;

/// Value an erased 32-bit word reads as
const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Layout validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutError {
    /// Sector size is zero or odd
    BadSectorSize,
    /// Chip range is not sector aligned or overflows the address space
    ChipRange,
    /// Magic slot is outside the chip or overlaps the table
    MagicSlot,
    /// Table region is misaligned, empty or outside the chip
    TableRegion,
    /// Files region is misaligned, overlaps the table or is outside the chip
    FilesRegion,
    /// Scratch sector is misaligned, outside the chip or overlaps the table
    Scratch,
    /// A magic constant equals the erased pattern
    ErasedMagic,
}

/// Flash address map of one filesystem instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipLayout {
    /// First address of the flash range owned by the filesystem
    pub chip_begin: u32,
    /// Size of the owned range in bytes
    pub chip_size: u32,
    /// Erase unit in bytes
    pub sector_size: u32,
    /// Address of the 4-byte table magic
    pub table_magic_addr: u32,
    /// First table entry
    pub table_region_start: u32,
    /// End (exclusive) of the table region
    pub table_region_end: u32,
    /// Base of the scratch sector
    pub scratch_addr: u32,
    /// First address available for file records
    pub files_region_start: u32,
    /// Value marking a formatted table
    pub table_magic: u32,
    /// Value marking a valid table entry
    pub object_magic: u32,
}

impl ChipLayout {
    /// Build the standard arrangement over `chip_size` bytes at `chip_begin`
    ///
    /// Sector 0 starts with the table magic, the table fills the rest of
    /// the first `table_sectors` sectors, the next sector is scratch, and
    /// every remaining sector holds file records.
    pub const fn standard(
        chip_begin: u32,
        chip_size: u32,
        sector_size: u32,
        table_sectors: u32,
    ) -> Self {
        let table_region_end = chip_begin + table_sectors * sector_size;
        Self {
            chip_begin,
            chip_size,
            sector_size,
            table_magic_addr: chip_begin,
            table_region_start: chip_begin + TABLE_MAGIC_SIZE,
            table_region_end,
            scratch_addr: table_region_end,
            files_region_start: table_region_end + sector_size,
            table_magic: DEFAULT_TABLE_MAGIC,
            object_magic: DEFAULT_OBJECT_MAGIC,
        }
    }

    /// Replace the magic constants
    pub const fn with_magics(mut self, table_magic: u32, object_magic: u32) -> Self {
        self.table_magic = table_magic;
        self.object_magic = object_magic;
        self
    }

    /// End (exclusive) of the owned flash range
    pub const fn chip_end(&self) -> u32 {
        self.chip_begin + self.chip_size
    }

    /// Base address of the sector containing `address`
    pub const fn sector_base(&self, address: u32) -> u32 {
        address - self.sector_offset(address)
    }

    /// Offset of `address` within its sector
    pub const fn sector_offset(&self, address: u32) -> u32 {
        (address - self.chip_begin) % self.sector_size
    }

    /// Number of entries the table region can hold
    pub const fn table_capacity(&self) -> u32 {
        (self.table_region_end - self.table_region_start) / TABLE_ENTRY_SIZE as u32
    }

    /// Address of table slot `index`
    pub const fn table_slot(&self, index: u32) -> u32 {
        self.table_region_start + index * TABLE_ENTRY_SIZE as u32
    }

    /// Whether `[start, end)` touches the scratch sector
    pub const fn overlaps_scratch(&self, start: u32, end: u32) -> bool {
        start < self.scratch_addr + self.sector_size && end > self.scratch_addr
    }

    /// Check the layout invariants
    pub fn validate(&self) -> Result<(), LayoutError> {
        let sector = self.sector_size;
        if sector == 0 || sector % 2 != 0 {
            return Err(LayoutError::BadSectorSize);
        }

        let aligned = |address: u32| address.wrapping_sub(self.chip_begin) % sector == 0;

        if self.chip_size == 0
            || self.chip_size % sector != 0
            || self.chip_begin.checked_add(self.chip_size).is_none()
        {
            return Err(LayoutError::ChipRange);
        }
        let chip = self.chip_begin..self.chip_end();

        if self.table_magic == ERASED_WORD || self.object_magic == ERASED_WORD {
            return Err(LayoutError::ErasedMagic);
        }

        if !chip.contains(&self.table_magic_addr)
            || self.table_magic_addr % 2 != 0
            || self.table_magic_addr + TABLE_MAGIC_SIZE > self.table_region_start
        {
            return Err(LayoutError::MagicSlot);
        }

        if self.table_region_start % 2 != 0
            || !aligned(self.table_region_end)
            || self.table_region_end > self.chip_end()
            || self.table_region_end < self.table_region_start.saturating_add(TABLE_ENTRY_SIZE as u32)
        {
            return Err(LayoutError::TableRegion);
        }

        if !aligned(self.files_region_start)
            || self.files_region_start < self.table_region_end
            || self.files_region_start >= self.chip_end()
        {
            return Err(LayoutError::FilesRegion);
        }

        if !aligned(self.scratch_addr)
            || !chip.contains(&self.scratch_addr)
            || self.overlaps_scratch(self.table_magic_addr, self.table_region_end)
        {
            return Err(LayoutError::Scratch);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 0x0800_0000;

    fn layout() -> ChipLayout {
        ChipLayout::standard(BASE, 8 * 2048, 2048, 1)
    }

    #[test]
    fn test_standard_layout() {
        let layout = layout();
        assert_eq!(layout.validate(), Ok(()));
        assert_eq!(layout.table_magic_addr, BASE);
        assert_eq!(layout.table_region_start, BASE + 4);
        assert_eq!(layout.table_region_end, BASE + 2048);
        assert_eq!(layout.scratch_addr, BASE + 2048);
        assert_eq!(layout.files_region_start, BASE + 4096);
        assert_eq!(layout.table_capacity(), 127);
        assert_eq!(layout.chip_end(), BASE + 0x4000);
    }

    #[test]
    fn test_sector_math() {
        let layout = layout();
        assert_eq!(layout.sector_base(BASE + 4096 + 2000), BASE + 4096);
        assert_eq!(layout.sector_offset(BASE + 4096 + 2000), 2000);
        assert_eq!(layout.table_slot(2), BASE + 4 + 32);
        assert!(layout.overlaps_scratch(BASE + 2040, BASE + 2050));
        assert!(!layout.overlaps_scratch(BASE + 4096, BASE + 4200));
    }

    #[test]
    fn test_rejects_odd_sector() {
        let mut layout = layout();
        layout.sector_size = 2047;
        assert_eq!(layout.validate(), Err(LayoutError::BadSectorSize));
    }

    #[test]
    fn test_rejects_table_past_files() {
        let mut layout = layout();
        layout.files_region_start = BASE;
        assert_eq!(layout.validate(), Err(LayoutError::FilesRegion));
    }

    #[test]
    fn test_rejects_scratch_in_table() {
        let mut layout = layout();
        layout.scratch_addr = BASE;
        assert_eq!(layout.validate(), Err(LayoutError::Scratch));
    }

    #[test]
    fn test_rejects_magic_inside_table() {
        let mut layout = layout();
        layout.table_region_start = BASE + 2;
        assert_eq!(layout.validate(), Err(LayoutError::MagicSlot));
    }

    #[test]
    fn test_rejects_erased_magic() {
        let layout = layout().with_magics(0xFFFF_FFFF, 1);
        assert_eq!(layout.validate(), Err(LayoutError::ErasedMagic));
    }
}
