use std::io::{Read, Write};

use crate::{DataFormat, DataReadError, DataWriteError};

/// A `u64` encoded as a base-128 varint: seven value bits per byte, with the
/// high bit set on every byte but the last. Small counts (bucket entry batch
/// sizes, shadow-bucket counts) cost one byte instead of eight, and the
/// encoding never needs to look ahead at the value's magnitude before
/// emitting the first byte — each byte is final the moment its continuation
/// bit is clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedUint(pub u64);

/// A ten-byte varint is the longest a `u64` can produce (`ceil(64/7) == 10`);
/// anything longer than that is corrupt input, not a legal encoding.
const MAX_VARINT_BYTES: usize = 10;

impl From<PackedUint> for usize {
    fn from(value: PackedUint) -> Self {
        value.0 as usize
    }
}

impl From<usize> for PackedUint {
    fn from(value: usize) -> Self {
        PackedUint(value as u64)
    }
}

impl DataFormat for PackedUint {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        let mut value = self.0;
        let mut written = 0;
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            written += writer.write(&[byte])?;
            if value == 0 {
                break;
            }
        }
        Ok(written)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let mut byte = [0u8; 1];
            reader.read_exact(&mut byte)?;
            value |= ((byte[0] & 0x7f) as u64) << (7 * i);
            if byte[0] & 0x80 == 0 {
                return Ok(PackedUint(value));
            }
        }
        Err(DataReadError::Custom(format!(
            "PackedUint varint exceeds {MAX_VARINT_BYTES} bytes"
        )))
    }
}
