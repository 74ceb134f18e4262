use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use sha2::{Digest, Sha256};

use crate::{DataFormat, DataReadError, DataWriteError};

/// A 32-byte content hash identifying a bucket, or contributing to the
/// composite bucket-list hash.
///
/// The all-zero value is the well-known hash of the empty bucket (`h₀` in
/// spec.md §3): an empty or cleared slot always hashes to `ZERO`, never to
/// `hash(&[])`, so the two must be distinguished by callers that need to
/// tell "genuinely empty bucket" apart from "a bucket that happens to hash
/// to the sha256 of nothing" (the latter cannot occur in practice, but the
/// distinction matters for `BucketList::hash`, which contributes `ZERO` for
/// cleared slots by construction rather than by hashing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Hash256(hasher.finalize().into())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid hash256 hex string: {0}")]
pub struct HashParseError(String);

impl FromStr for Hash256 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(HashParseError(s.to_string()));
        }
        let mut out = [0u8; 32];
        for i in 0..32 {
            let byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| HashParseError(s.to_string()))?;
            out[i] = byte;
        }
        Ok(Hash256(out))
    }
}

impl serde::Serialize for Hash256 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Hash256 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl DataFormat for Hash256 {
    type Header = ();
    const LATEST_HEADER: Self::Header = ();

    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError> {
        Ok(writer.write(&self.0)?)
    }

    fn read_data<R: Read>(reader: &mut R, _header: &Self::Header) -> Result<Self, DataReadError> {
        let mut bytes = [0u8; 32];
        reader.read_exact(&mut bytes)?;
        Ok(Hash256(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_is_distinct_from_hash_of_empty() {
        assert_ne!(Hash256::ZERO, Hash256::of(&[]));
    }

    #[test]
    fn hex_roundtrip() {
        let h = Hash256::of(b"bucket list");
        let parsed: Hash256 = h.to_hex().parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn serde_json_roundtrip_uses_hex_string() {
        let h = Hash256::of(b"serde");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn data_format_roundtrip() {
        let h = Hash256::of(b"round trip");
        let mut buf = Vec::new();
        h.write_data(&mut buf).unwrap();
        assert_eq!(buf.len(), 32);
        let mut reader = &buf[..];
        let read = Hash256::read_data(&mut reader, &()).unwrap();
        assert_eq!(h, read);
    }
}
