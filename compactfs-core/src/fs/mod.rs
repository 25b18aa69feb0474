//! Storage engine
//!
//! [`CompactFs`] owns the flash transport, the chip layout and the cached
//! table count. Every public operation runs inside one transaction
//! bracket, so a [`TransactionLock`](compactfs_hal::TransactionLock) on
//! the transport is enough to serialize engines sharing one chip.
//!
//! The operations themselves live in submodules:
//! - `save`: scratchpad sector rewrite
//! - `load`: checksum-verified read
//! - `delete`: logical delete

mod delete;
mod load;
mod save;

use core::marker::PhantomData;

use compactfs_hal::FlashTransport;
use embedded_hal::delay::DelayNs;

use crate::config::{ChipLayout, FsConfig, TABLE_MAGIC_SIZE};
use crate::checksum::{Checksum, Crc8};
use crate::error::FsError;
use crate::table::ObjectTable;

/// Outcome of [`CompactFs::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitReport {
    /// Valid table entries found
    pub objects: u32,
    /// Table magic was bad and the chip was reformatted
    pub recreated: bool,
}

/// Space report from [`CompactFs::usage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Usage {
    /// Table entries in use
    pub objects: u32,
    /// Table entries the region can hold
    pub table_capacity: u32,
    /// Address the next new record would start from
    pub next_free: u32,
    /// Data bytes past `next_free`, excluding the scratch sector
    ///
    /// Records never straddle sectors, so less than this may be usable.
    pub free_bytes: u32,
}

/// Object filesystem over one flash region
pub struct CompactFs<T, C = Crc8> {
    transport: T,
    layout: ChipLayout,
    config: FsConfig,
    table: ObjectTable,
    checksum: PhantomData<C>,
}

impl<T: FlashTransport, C: Checksum> CompactFs<T, C> {
    /// Create an engine; `init` must run before any other operation
    pub fn new(transport: T, layout: ChipLayout, config: FsConfig) -> Result<Self, FsError> {
        layout.validate()?;
        Ok(Self {
            transport,
            layout,
            config,
            table: ObjectTable::new(),
            checksum: PhantomData,
        })
    }

    /// Mount the filesystem
    ///
    /// A mismatching table magic is re-read up to `max_magic_retries`
    /// times, `magic_retry_delay_us` apart. If it never matches, the whole
    /// chip is erased and an empty table is written.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<InitReport, FsError> {
        self.transaction(|fs| fs.mount(delay))
    }

    /// Erase the whole chip and write an empty table
    ///
    /// The engine is left uninitialized; call `init` again afterwards.
    pub fn format(&mut self) -> Result<(), FsError> {
        self.transaction(|fs| {
            fs.table.invalidate();
            fs.reset_chip()
        })
    }

    /// Record address of an object instance, if it has a table entry
    pub fn lookup(&mut self, object_id: u32, instance_id: u16) -> Result<Option<u32>, FsError> {
        self.transaction(|fs| fs.table.lookup(&mut fs.transport, &fs.layout, object_id, instance_id))
    }

    /// Whether an object instance has a table entry
    ///
    /// A deleted instance keeps its entry and still exists here.
    pub fn exists(&mut self, object_id: u32, instance_id: u16) -> Result<bool, FsError> {
        Ok(self.lookup(object_id, instance_id)?.is_some())
    }

    /// Report table and data region usage
    pub fn usage(&mut self) -> Result<Usage, FsError> {
        self.transaction(|fs| {
            let objects = fs.table.count().ok_or(FsError::NotInitialized)?;
            let next_free = fs.table.next_free_address(&mut fs.transport, &fs.layout)?;
            let layout = &fs.layout;

            let chip_end = layout.chip_end();
            let start = next_free.min(chip_end);
            let scratch_end = layout.scratch_addr + layout.sector_size;
            let scratch = scratch_end
                .min(chip_end)
                .saturating_sub(layout.scratch_addr.max(start));

            Ok(Usage {
                objects,
                table_capacity: layout.table_capacity(),
                next_free,
                free_bytes: chip_end - start - scratch,
            })
        })
    }

    /// Valid table entries, or `None` before `init`
    pub fn object_count(&self) -> Option<u32> {
        self.table.count()
    }

    pub fn layout(&self) -> &ChipLayout {
        &self.layout
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Direct access to the transport
    ///
    /// Writing through it behind the engine's back invalidates nothing;
    /// run `init` again if the table may have changed.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run `op` between `start_transaction` and `end_transaction`
    ///
    /// The bracket is always closed. A failure to close it is only
    /// reported when `op` itself succeeded.
    fn transaction<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<R, FsError>,
    ) -> Result<R, FsError> {
        self.transport.start_transaction()?;
        let result = op(self);
        let ended = self.transport.end_transaction();
        let value = result?;
        ended?;
        Ok(value)
    }

    fn mount<D: DelayNs>(&mut self, delay: &mut D) -> Result<InitReport, FsError> {
        self.table.invalidate();
        let mut retries = 0;
        let recreated = loop {
            if self.read_table_magic()? == self.layout.table_magic {
                break false;
            }
            if retries >= self.config.max_magic_retries {
                warn!("table magic still bad after {} retries, reformatting", retries);
                self.reset_chip()?;
                break true;
            }
            retries += 1;
            delay.delay_us(self.config.magic_retry_delay_us);
        };

        let objects = self.table.scan(&mut self.transport, &self.layout)?;
        info!("mounted: {} objects, recreated={}", objects, recreated);
        Ok(InitReport { objects, recreated })
    }

    /// Erase every sector of the chip and write the table magic
    fn reset_chip(&mut self) -> Result<(), FsError> {
        let mut sector = self.layout.chip_begin;
        while sector < self.layout.chip_end() {
            self.transport.erase_sector(sector)?;
            sector += self.layout.sector_size;
        }

        let magic = self.layout.table_magic.to_le_bytes();
        if let Err(e) = self.transport.write(self.layout.table_magic_addr, &magic) {
            error!("table magic write failed: {}", e);
            return Err(FsError::TableWriteFailed);
        }
        if self.read_table_magic()? != self.layout.table_magic {
            error!("table magic did not read back");
            return Err(FsError::TableWriteFailed);
        }
        Ok(())
    }

    fn read_table_magic(&mut self) -> Result<u32, FsError> {
        let mut bytes = [0u8; TABLE_MAGIC_SIZE as usize];
        self.transport.read(self.layout.table_magic_addr, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Record address of an object instance or `NotFound`
    fn locate(&mut self, object_id: u32, instance_id: u16) -> Result<u32, FsError> {
        self.table
            .lookup(&mut self.transport, &self.layout, object_id, instance_id)?
            .ok_or(FsError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compactfs_hal::FlashError;
    use crate::testing::{test_flash, test_layout, CountingDelay, TestFlash, BASE};

    fn engine(retries: u32) -> CompactFs<TestFlash> {
        let config = FsConfig::new().with_magic_retries(retries, 10);
        CompactFs::new(test_flash(), test_layout(), config).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_layout() {
        let mut layout = test_layout();
        layout.sector_size = 0;
        let result: Result<CompactFs<TestFlash>, _> =
            CompactFs::new(test_flash(), layout, FsConfig::new());
        assert!(matches!(result, Err(FsError::InvalidLayout(_))));
    }

    #[test]
    fn test_blank_chip_is_formatted_on_init() {
        let mut fs = engine(2);
        let mut delay = CountingDelay::default();

        let report = fs.init(&mut delay).unwrap();
        assert_eq!(report, InitReport { objects: 0, recreated: true });
        assert_eq!(delay.calls, 2);
        assert_eq!(fs.object_count(), Some(0));

        let magic = test_layout().table_magic.to_le_bytes();
        assert_eq!(fs.transport_mut().flash().peek(0, 4), &magic);
    }

    #[test]
    fn test_good_magic_needs_no_retry() {
        let mut fs = engine(5);
        fs.init(&mut CountingDelay::default()).unwrap();

        let mut delay = CountingDelay::default();
        let report = fs.init(&mut delay).unwrap();
        assert!(!report.recreated);
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn test_operations_need_init() {
        let mut fs = engine(0);
        assert_eq!(fs.lookup(1, 0), Err(FsError::NotInitialized));
        assert_eq!(fs.usage(), Err(FsError::NotInitialized));
        assert_eq!(fs.object_count(), None);

        fs.init(&mut CountingDelay::default()).unwrap();
        assert_eq!(fs.lookup(1, 0), Ok(None));
        assert_eq!(fs.exists(1, 0), Ok(false));

        fs.format().unwrap();
        assert_eq!(fs.lookup(1, 0), Err(FsError::NotInitialized));
    }

    #[test]
    fn test_format_erases_whole_chip() {
        let mut fs = engine(0);
        fs.init(&mut CountingDelay::default()).unwrap();
        fs.transport_mut().flash_mut().poke(8 * 1024, &[0x12, 0x34]);

        let before = fs.transport_mut().flash().erase_count();
        fs.format().unwrap();
        let flash = fs.transport_mut().flash();
        assert_eq!(flash.erase_count() - before, 8);
        assert_eq!(flash.peek(8 * 1024, 2), &[0xFF, 0xFF]);
    }

    #[test]
    fn test_usage_on_empty_chip() {
        let mut fs = engine(0);
        fs.init(&mut CountingDelay::default()).unwrap();

        let usage = fs.usage().unwrap();
        assert_eq!(usage.objects, 0);
        assert_eq!(usage.table_capacity, 127);
        assert_eq!(usage.next_free, BASE + 2 * 2048);
        assert_eq!(usage.free_bytes, 6 * 2048);
    }

    #[test]
    fn test_usage_excludes_scratch_ahead() {
        let mut layout = test_layout();
        layout.files_region_start = BASE + 2048;
        layout.scratch_addr = BASE + 7 * 2048;
        let mut fs: CompactFs<TestFlash> =
            CompactFs::new(test_flash(), layout, FsConfig::new().with_magic_retries(0, 0)).unwrap();
        fs.init(&mut CountingDelay::default()).unwrap();

        let usage = fs.usage().unwrap();
        assert_eq!(usage.next_free, BASE + 2048);
        // Sectors 1..=6 hold data, sector 7 is scratch
        assert_eq!(usage.free_bytes, 6 * 2048);
    }

    #[test]
    fn test_erase_failure_during_reformat() {
        let mut fs = engine(0);
        fs.transport_mut().flash_mut().fail_after(2);

        let result = fs.init(&mut CountingDelay::default());
        assert_eq!(result, Err(FsError::Transport(FlashError::Erase)));
        assert_eq!(fs.object_count(), None);
        assert_eq!(fs.lookup(1, 0), Err(FsError::NotInitialized));

        let report = fs.init(&mut CountingDelay::default()).unwrap();
        assert!(report.recreated);
        assert_eq!(fs.object_count(), Some(0));
    }

    #[test]
    fn test_magic_write_failure() {
        let mut fs = engine(0);
        // All eight sector erases succeed, the magic write fails
        fs.transport_mut().flash_mut().fail_after(8);

        assert_eq!(fs.init(&mut CountingDelay::default()), Err(FsError::TableWriteFailed));
        assert_eq!(fs.object_count(), None);
    }

    #[test]
    fn test_magic_read_back_mismatch() {
        let mut fs = engine(0);
        fs.transport_mut().flash_mut().kill_cell(0);

        assert_eq!(fs.init(&mut CountingDelay::default()), Err(FsError::TableWriteFailed));
        assert_eq!(fs.object_count(), None);
        assert_eq!(fs.format(), Err(FsError::TableWriteFailed));
    }
}
