use ledger_format::{DataFormat, DataReadError, DataWriteError};
use std::io::{Read, Write};

/// The ledger protocol version a bucket (or a merge) was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ProtocolVersion(pub u32);

/// `FIRST_PROTOCOL_SUPPORTING_INITENTRY_AND_METAENTRY`: the protocol version
/// at which the INIT and META bucket entry kinds become valid. Below this,
/// a bucket never carries an INIT or META record, and one appearing on input
/// is a `ProtocolViolation`.
pub const FIRST_PROTOCOL_SUPPORTING_INIT_AND_META: ProtocolVersion = ProtocolVersion(11);

impl ProtocolVersion {
    pub fn supports_init_and_meta(self) -> bool {
        self >= FIRST_PROTOCOL_SUPPORTING_INIT_AND_META
    }
}

impl DataFormat for ProtocolVersion {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        self.0.write_data(writer)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        Ok(ProtocolVersion(u32::read_data(reader, &())?))
    }
}
