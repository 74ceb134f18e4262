//! Versioned binary (de)serialization for bucket files and archive state.
//!
//! Every on-disk record is written as a fixed header describing the format
//! version it was written with, followed by the data itself. This mirrors
//! the shape used throughout the teacher's wire encodings: a small,
//! `Copy` header type travels alongside the payload so a reader can branch
//! on format version without a second pass over the file.

mod base_impl;
mod error;
mod hash;
mod packed_int;

pub use error::{DataReadError, DataWriteError};
pub use hash::Hash256;
pub use packed_int::PackedUint;

use std::io::{Read, Write};

/// A type that can be written to and read from a byte stream with an
/// explicit, versioned header.
///
/// `Header` travels with the data so that an older reader can refuse (or a
/// newer reader can adapt to) data written by a different protocol version.
/// Most types use `()` as their header and simply inherit their fields'
/// headers.
pub trait DataFormat: Sized {
    type Header: DataFormat + Clone + Copy + Default + Sized;
    const LATEST_HEADER: Self::Header;

    /// Write just the payload (no header) to `writer`, returning the number
    /// of bytes written.
    fn write_data<W: Write>(&self, writer: &mut W) -> Result<usize, DataWriteError>;

    /// Read the payload given a header that describes how it was encoded.
    fn read_data<R: Read>(reader: &mut R, header: &Self::Header) -> Result<Self, DataReadError>;
}

/// Write `data`'s latest header followed by `data` itself.
pub fn write_with_header<W: Write, F: DataFormat>(
    writer: &mut W,
    data: &F,
) -> Result<usize, DataWriteError> {
    let mut written = F::Header::LATEST_HEADER.write_data(writer)?;
    written += data.write_data(writer)?;
    Ok(written)
}

/// Read a header followed by the data it describes.
pub fn read_with_header<R: Read, F: DataFormat>(reader: &mut R) -> Result<F, DataReadError> {
    let header_of_header = <F::Header as DataFormat>::Header::default();
    let header = F::Header::read_data(reader, &header_of_header)?;
    F::read_data(reader, &header)
}
