//! Typed objects
//!
//! Binds a Rust type to an object id and a fixed payload size, and moves
//! it through `postcard`. The payload size is part of the stored record,
//! so pick `SIZE` with room for the largest encoding the type can take.

use compactfs_hal::FlashTransport;
use serde::{de::DeserializeOwned, Serialize};

use crate::checksum::Checksum;
use crate::error::FsError;
use crate::fs::CompactFs;

/// Largest typed payload; bounds the stack buffer used for encoding
pub const MAX_OBJECT_SIZE: usize = 256;

/// A type persisted as one object
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct BootRecord { boots: u32 }
///
/// impl StoredObject for BootRecord {
///     const OBJECT_ID: u32 = 0xB007_0001;
///     const SIZE: usize = 8;
/// }
/// ```
pub trait StoredObject: Serialize + DeserializeOwned {
    /// Object id shared by every instance of the type
    const OBJECT_ID: u32;
    /// Fixed payload length in bytes
    const SIZE: usize;
}

impl<T: FlashTransport, C: Checksum> CompactFs<T, C> {
    /// Encode and save `object` as instance `instance_id`
    pub fn save_object<O: StoredObject>(&mut self, instance_id: u16, object: &O) -> Result<(), FsError> {
        let mut buffer = [0u8; MAX_OBJECT_SIZE];
        let payload = buffer.get_mut(..O::SIZE).ok_or(FsError::RecordTooLarge)?;
        postcard::to_slice(object, &mut payload[..]).map_err(|_| FsError::Serialize)?;
        self.save(O::OBJECT_ID, instance_id, payload)
    }

    /// Load and decode instance `instance_id`
    pub fn load_object<O: StoredObject>(&mut self, instance_id: u16) -> Result<O, FsError> {
        let mut buffer = [0u8; MAX_OBJECT_SIZE];
        let payload = buffer.get_mut(..O::SIZE).ok_or(FsError::RecordTooLarge)?;
        self.load(O::OBJECT_ID, instance_id, payload)?;
        postcard::from_bytes(payload).map_err(|_| FsError::Deserialize)
    }
}
