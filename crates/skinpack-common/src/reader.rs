//! Binary reading and writing helpers.
//!
//! [`BinaryReader`] walks a borrowed byte slice without copying. [`ReadExt`]
//! and [`WriteExt`] do the same job for blocking streams, which is how texture
//! files arrive from disk or from an external tool's output.

use std::io::{self, Read, Write};

use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::{Error, Result};

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// # Example
///
/// ```
/// use skinpack_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0xAA, 0xBB];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.remaining_bytes(), &[0xAA, 0xBB]);
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                needed: count,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a struct using zerocopy.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            needed: size,
            available: bytes.len(),
        })
    }
}

/// Extends `Read` with methods for reading fixed-size structures.
pub trait ReadExt: Read {
    /// Read a structure from the stream.
    fn read_struct<T: FromBytes>(&mut self) -> io::Result<T> {
        let size = std::mem::size_of::<T>();
        let mut bytes = vec![0u8; size];
        self.read_exact(&mut bytes)?;
        T::read_from_bytes(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e)))
    }

    /// Read at most `count` bytes, stopping early at end of stream.
    ///
    /// `count` often comes from the file itself, so the buffer only grows as
    /// bytes actually arrive.
    fn read_up_to(&mut self, count: usize) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.take(count as u64).read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

/// Extends `Write` with a method for writing fixed-size structures.
pub trait WriteExt: Write {
    /// Write a structure's raw bytes to the stream.
    fn write_struct<T: IntoBytes + Immutable>(&mut self, value: &T) -> io::Result<()> {
        self.write_all(value.as_bytes())
    }
}

impl<W: Write + ?Sized> WriteExt for W {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFF, 0xFF, 0xFF, // u32: 0xFFFFFFFF
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_u32().unwrap(), 0xFFFFFFFF);
        assert!(reader.is_empty());
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_eof_error() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);

        assert!(matches!(
            reader.read_u32(),
            Err(Error::UnexpectedEof { needed: 4, available: 2 })
        ));
    }

    #[test]
    fn test_read_up_to_stops_at_end_of_stream() {
        let data = [1u8, 2, 3];
        let mut stream = &data[..];

        assert_eq!(stream.read_up_to(2).unwrap(), vec![1, 2]);
        assert_eq!(stream.read_up_to(16).unwrap(), vec![3]);
        assert!(stream.read_up_to(16).unwrap().is_empty());
    }

    #[test]
    fn test_read_up_to_huge_count() {
        let data = [0u8; 64];
        let mut stream = &data[..];

        assert_eq!(stream.read_up_to(u32::MAX as usize).unwrap().len(), 64);
        assert_eq!(stream.read_up_to(usize::MAX).unwrap().len(), 0);
    }

    #[test]
    fn test_struct_round_trip_through_streams() {
        let mut out = Vec::new();
        out.write_struct(&[7u32, 9u32]).unwrap();
        assert_eq!(out.len(), 8);

        let mut stream = &out[..];
        let values: [u32; 2] = stream.read_struct().unwrap();
        assert_eq!(values, [7, 9]);
        assert!(stream.read_struct::<u32>().is_err());
    }
}
