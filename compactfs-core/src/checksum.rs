//! Record checksum
//!
//! Records carry a single checksum byte computed over the header bytes
//! followed by the payload bytes. The algorithm is pluggable through
//! [`Checksum`]; [`Crc8`] is the default.

use crc::{Crc, CRC_8_SMBUS};

/// 8-bit running checksum over a byte stream
///
/// Implementations must be deterministic and order sensitive so that a
/// record can be verified while streaming it from flash in pieces.
pub trait Checksum {
    /// Fold `data` into the running value `crc`
    fn update(crc: u8, data: &[u8]) -> u8;
}

/// CRC-8/SMBUS: polynomial x^8 + x^2 + x + 1 (0x07), initial value 0
///
/// No reflection and no final XOR, so the running value can be fed back
/// in as the initial value of the next chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc8;

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

impl Checksum for Crc8 {
    fn update(crc: u8, data: &[u8]) -> u8 {
        let mut digest = CRC8.digest_with_initial(crc);
        digest.update(data);
        digest.finalize()
    }
}
