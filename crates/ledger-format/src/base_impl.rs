use std::io::{Read, Write};

use crate::{packed_int::PackedUint, DataFormat, DataReadError, DataWriteError};

impl DataFormat for () {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, _writer: &mut W) -> Result<usize, DataWriteError> {
        Ok(0)
    }

    fn read_data<R: Read>(_reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        Ok(())
    }
}

/// The only fixed-width integer this format ever needs to move as a bare
/// value rather than through `PackedUint`: `ProtocolVersion` is carried
/// verbatim so two nodes on different protocol versions can still tell each
/// other's version apart without a varint's ambiguity between "small number"
/// and "small number that happened to need a continuation byte".
impl DataFormat for u32 {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        Ok(writer.write(&self.to_le_bytes())?)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        let mut bytes = [0u8; 4];
        reader.read_exact(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }
}

/// Raw entry values and keys are opaque byte strings (spec.md §3 never
/// interprets `LedgerKey`/`LedgerEntry.value` beyond their bytes), so this
/// format only ever needs to move `Vec<u8>`, never a `Vec` of some other
/// `DataFormat` type. Specializing on `u8` means the body is a length prefix
/// plus one bulk read/write rather than a generic per-element dispatch loop.
impl DataFormat for Vec<u8> {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        let prefix = PackedUint::from(self.len()).write_data(writer)?;
        Ok(prefix + writer.write(self)?)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        let len = usize::from(PackedUint::read_data(reader, &())?);
        if len > (1 << 20) {
            return Err(DataReadError::Custom(format!(
                "Vec<u8> length {len} exceeds the sanity cap"
            )));
        }
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unit_round_trips_to_zero_bytes() {
        let mut data = Vec::new();
        ().write_data(&mut data).unwrap();
        assert!(data.is_empty());
        let mut reader = &data[..];
        <()>::read_data(&mut reader, &()).unwrap();
    }

    #[test]
    fn u32_round_trips_little_endian() {
        let mut data = Vec::new();
        0x0102_0304u32.write_data(&mut data).unwrap();
        assert_eq!(data, [4, 3, 2, 1]);
        let mut reader = &data[..];
        assert_eq!(u32::read_data(&mut reader, &()).unwrap(), 0x0102_0304);
    }

    #[test]
    fn vec_u8_round_trips_with_a_length_prefix() {
        let mut data = Vec::new();
        vec![1u8, 2, 3].write_data(&mut data).unwrap();
        assert_eq!(data, [3, 1, 2, 3]);
        let mut reader = &data[..];
        assert_eq!(Vec::<u8>::read_data(&mut reader, &()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn empty_vec_u8_is_a_single_zero_byte() {
        let mut data = Vec::new();
        Vec::<u8>::new().write_data(&mut data).unwrap();
        assert_eq!(data, [0]);
    }
}
