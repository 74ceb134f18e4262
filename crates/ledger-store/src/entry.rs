use std::{
    cmp::Ordering,
    io::{Read, Write},
};

use ledger_format::{DataFormat, DataReadError, DataWriteError};

use crate::protocol::ProtocolVersion;

/// An opaque, content-addressable ledger entry key.
///
/// The ledger-txn collaborator that produces real `LedgerKey`/`LedgerEntry`
/// values is out of scope for this crate (spec.md §1); what the bucket list
/// needs from a key is only that it is orderable and serializable, so it is
/// modeled here as an opaque byte string rather than the full account/trust
/// line/offer key union a real ledger implements.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerKey(pub Vec<u8>);

impl LedgerKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        LedgerKey(bytes.into())
    }
}

impl DataFormat for LedgerKey {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        self.0.write_data(writer)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        Ok(LedgerKey(Vec::<u8>::read_data(reader, &())?))
    }
}

/// An opaque ledger entry: a key plus an authoritative payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: LedgerKey,
    pub value: Vec<u8>,
}

impl DataFormat for LedgerEntry {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        Ok(self.key.write_data(writer)? + self.value.write_data(writer)?)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        Ok(LedgerEntry {
            key: LedgerKey::read_data(reader, &())?,
            value: Vec::<u8>::read_data(reader, &())?,
        })
    }
}

/// The sentinel METAENTRY: carries the protocol version the bucket was
/// written at. At most one per bucket, and it always sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketMetaEntry {
    pub ledger_version: ProtocolVersion,
}

impl DataFormat for BucketMetaEntry {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        self.ledger_version.write_data(writer)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        Ok(BucketMetaEntry {
            ledger_version: ProtocolVersion::read_data(reader, &())?,
        })
    }
}

/// A single record in a bucket file (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketEntry {
    Meta(BucketMetaEntry),
    Init(LedgerEntry),
    Live(LedgerEntry),
    Dead(LedgerKey),
}

const TAG_META: u8 = 0;
const TAG_INIT: u8 = 1;
const TAG_LIVE: u8 = 2;
const TAG_DEAD: u8 = 3;

impl BucketEntry {
    /// The key this entry concerns, or `None` for META (which sorts before
    /// every key and is never compared by key).
    pub fn key(&self) -> Option<&LedgerKey> {
        match self {
            BucketEntry::Meta(_) => None,
            BucketEntry::Init(e) | BucketEntry::Live(e) => Some(&e.key),
            BucketEntry::Dead(k) => Some(k),
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self, BucketEntry::Meta(_))
    }

    pub fn is_init(&self) -> bool {
        matches!(self, BucketEntry::Init(_))
    }

    pub fn is_live(&self) -> bool {
        matches!(self, BucketEntry::Live(_))
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, BucketEntry::Dead(_))
    }

    pub fn ledger_entry(&self) -> Option<&LedgerEntry> {
        match self {
            BucketEntry::Init(e) | BucketEntry::Live(e) => Some(e),
            _ => None,
        }
    }
}

/// META sorts before everything; otherwise entries compare by key. Two
/// entries for the same key never both occur in one bucket (enforced at
/// construction and preserved by the merge engine), so this partial order
/// is a total order in practice.
impl PartialOrd for BucketEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BucketEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.key(), other.key()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl DataFormat for BucketEntry {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        let (tag, mut written) = match self {
            BucketEntry::Meta(_) => (TAG_META, 0),
            BucketEntry::Init(_) => (TAG_INIT, 0),
            BucketEntry::Live(_) => (TAG_LIVE, 0),
            BucketEntry::Dead(_) => (TAG_DEAD, 0),
        };
        written += writer.write(&[tag])?;
        written += match self {
            BucketEntry::Meta(m) => m.write_data(writer)?,
            BucketEntry::Init(e) | BucketEntry::Live(e) => e.write_data(writer)?,
            BucketEntry::Dead(k) => k.write_data(writer)?,
        };
        Ok(written)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag)?;
        Ok(match tag[0] {
            TAG_META => BucketEntry::Meta(BucketMetaEntry::read_data(reader, &())?),
            TAG_INIT => BucketEntry::Init(LedgerEntry::read_data(reader, &())?),
            TAG_LIVE => BucketEntry::Live(LedgerEntry::read_data(reader, &())?),
            TAG_DEAD => BucketEntry::Dead(LedgerKey::read_data(reader, &())?),
            other => {
                return Err(DataReadError::Custom(format!(
                    "unknown bucket entry tag: {other}"
                )))
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(n: u8) -> LedgerKey {
        LedgerKey(vec![n])
    }

    fn live(n: u8) -> BucketEntry {
        BucketEntry::Live(LedgerEntry {
            key: key(n),
            value: vec![n],
        })
    }

    #[test]
    fn meta_sorts_first() {
        let meta = BucketEntry::Meta(BucketMetaEntry {
            ledger_version: ProtocolVersion(11),
        });
        let mut entries = vec![live(5), live(1), meta.clone(), live(3)];
        entries.sort();
        assert_eq!(entries[0], meta);
        assert_eq!(entries[1].key(), Some(&key(1)));
        assert_eq!(entries[2].key(), Some(&key(3)));
        assert_eq!(entries[3].key(), Some(&key(5)));
    }

    #[test]
    fn roundtrip_each_kind() {
        let cases = vec![
            BucketEntry::Meta(BucketMetaEntry {
                ledger_version: ProtocolVersion(11),
            }),
            BucketEntry::Init(LedgerEntry {
                key: key(1),
                value: vec![9],
            }),
            live(2),
            BucketEntry::Dead(key(3)),
        ];
        for entry in cases {
            let mut buf = Vec::new();
            entry.write_data(&mut buf).unwrap();
            let mut reader = &buf[..];
            let read = BucketEntry::read_data(&mut reader, &()).unwrap();
            assert_eq!(entry, read);
        }
    }
}
