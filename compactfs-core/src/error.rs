//! Filesystem error kinds

use compactfs_hal::FlashError;

use crate::config::LayoutError;

/// Errors returned by filesystem operations
///
/// Nothing is retried internally except the table magic check during
/// [`init`](crate::CompactFs::init). A transport failure in the middle of a
/// rewrite aborts without rollback; the affected sector should be
/// considered unreliable and the object saved again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    /// `init` has not run (or `format` invalidated the table count)
    NotInitialized,
    /// No table entry for this object/instance
    NotFound,
    /// Object table region has no room for another entry
    TableFull,
    /// Data region has no room for the record
    FileSpaceExhausted,
    /// Writing or verifying a table entry or the table magic failed
    TableWriteFailed,
    /// Underlying flash read/erase/write or lock failure
    Transport(FlashError),
    /// Stored record header names a different object/instance
    IdentityMismatch,
    /// Stored checksum does not match the record contents
    ChecksumMismatch,
    /// Stored record was written for a different payload size
    SizeMismatch,
    /// Record can never fit inside one sector
    RecordTooLarge,
    /// Chip layout failed validation
    InvalidLayout(LayoutError),
    /// Typed object did not fit its reserved payload size
    Serialize,
    /// Typed object payload could not be decoded
    Deserialize,
}

impl From<FlashError> for FsError {
    fn from(e: FlashError) -> Self {
        FsError::Transport(e)
    }
}

impl From<LayoutError> for FsError {
    fn from(e: LayoutError) -> Self {
        FsError::InvalidLayout(e)
    }
}
