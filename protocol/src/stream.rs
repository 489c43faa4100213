//! Big-endian field serialization shared by records and location identifiers.
//!
//! The layout matches a Qt 5.1 `QDataStream`: integers are big-endian,
//! doubles are IEEE-754 big-endian, and a byte array is a `u32` length
//! followed by the raw bytes. The length `0xFFFF_FFFF` marks a null array,
//! which is distinct from an empty one.

use {
    anyhow::{Result, anyhow, bail},
    byteorder::{BE, ByteOrder},
    std::mem::size_of,
};

/// Length signal of a null byte array.
pub const NULL_BYTE_ARRAY: u32 = 0xFFFF_FFFF;

/// Encoded size of a byte array field, including its length prefix.
#[must_use]
#[inline]
pub fn byte_array_size(value: Option<&[u8]>) -> usize {
    size_of::<u32>().saturating_add(value.map_or(0, <[u8]>::len))
}

/// Length signal written in front of a byte array.
///
/// # Panics
///
/// Panics if the array is longer than `u32::MAX - 1` bytes, which cannot be
/// represented in the format.
#[must_use]
#[inline]
pub fn length_signal(value: Option<&[u8]>) -> u32 {
    match value {
        None => NULL_BYTE_ARRAY,
        Some(bytes) => {
            let len = u32::try_from(bytes.len())
                .ok()
                .filter(|len| *len != NULL_BYTE_ARRAY);
            #[expect(clippy::expect_used, reason = "format limit, caller bug")]
            len.expect("byte array is too large for a data stream")
        }
    }
}

/// Append-only writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataStream {
    buf: Vec<u8>,
}

impl DataStream {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Continues writing after existing bytes.
    #[must_use]
    #[inline]
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    #[inline]
    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    #[inline]
    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Writes a nullable byte array.
    #[inline]
    pub fn write_byte_array(&mut self, value: Option<&[u8]>) -> &mut Self {
        self.write_u32(length_signal(value));
        if let Some(bytes) = value {
            self.buf.extend_from_slice(bytes);
        }
        self
    }

    /// Writes a non-null byte array (possibly empty).
    #[inline]
    pub fn write_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.write_byte_array(Some(value))
    }

    /// Appends bytes without a length prefix.
    #[inline]
    pub fn write_raw(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential reader over a borrowed buffer.
///
/// Every read fails once the input is exhausted; callers treat that failure
/// the same way as malformed data.
#[derive(Debug, Clone)]
pub struct DataReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> DataReader<'a> {
    #[must_use]
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Starts reading at `position` (clamped to the input length).
    #[must_use]
    #[inline]
    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position: position.min(data.len()),
        }
    }

    #[must_use]
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    #[must_use]
    #[inline]
    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self
            .position
            .checked_add(len)
            .and_then(|end| self.data.get(self.position..end))
            .ok_or_else(|| {
                anyhow!(
                    "read past end of stream: need {len} bytes at {}, have {}",
                    self.position,
                    self.remaining(),
                )
            })?;
        self.position = self.position.saturating_add(len);
        Ok(slice)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.take(1)?;
        bytes
            .first()
            .copied()
            .ok_or_else(|| anyhow!("read past end of stream"))
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BE::read_u16(self.take(size_of::<u16>())?))
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BE::read_i32(self.take(size_of::<i32>())?))
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BE::read_u32(self.take(size_of::<u32>())?))
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BE::read_u64(self.take(size_of::<u64>())?))
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(BE::read_f64(self.take(size_of::<f64>())?))
    }

    /// Reads a nullable byte array; `None` is the null array.
    #[inline]
    pub fn read_byte_array(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_u32()?;
        if len == NULL_BYTE_ARRAY {
            return Ok(None);
        }
        let Ok(len) = usize::try_from(len) else {
            bail!("byte array length {len} does not fit in memory");
        };
        Ok(Some(self.take(len)?.to_vec()))
    }

    /// Reads a byte array, treating null as empty.
    #[inline]
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.read_byte_array()?.unwrap_or_default())
    }

    /// Reads `len` bytes without a length prefix.
    #[inline]
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Bytes that were not consumed yet.
    #[must_use]
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        self.data.get(self.position..).unwrap_or_default()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use super::*;

    #[test]
    fn null_and_empty_arrays_differ() {
        let mut stream = DataStream::new();
        stream
            .write_byte_array(None)
            .write_bytes(b"")
            .write_bytes(b"abc");
        assert_eq!(
            stream.as_slice(),
            [
                0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0, 0, 0, 0, 3, b'a', b'b', b'c'
            ]
        );

        let mut reader = DataReader::new(stream.as_slice());
        assert_eq!(reader.read_byte_array().unwrap(), None);
        assert_eq!(reader.read_byte_array().unwrap(), Some(Vec::new()));
        assert_eq!(reader.read_bytes().unwrap(), b"abc");
        assert!(reader.at_end());
    }

    #[test]
    fn integers_are_big_endian() {
        let mut stream = DataStream::new();
        stream
            .write_u16(0x0102)
            .write_i32(-2)
            .write_u64(0x0102_0304_0506_0708);
        assert_eq!(
            stream.as_slice(),
            [1, 2, 0xFF, 0xFF, 0xFF, 0xFE, 1, 2, 3, 4, 5, 6, 7, 8]
        );
        let mut reader = DataReader::new(stream.as_slice());
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_u64().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn truncated_input_fails() {
        let mut reader = DataReader::new(&[0, 0, 0, 10, 1, 2]);
        reader.read_byte_array().unwrap_err();

        let mut reader = DataReader::new(&[0, 1]);
        reader.read_u32().unwrap_err();
        // A failed read does not consume anything.
        assert_eq!(reader.read_u16().unwrap(), 1);
    }

    #[test]
    fn huge_declared_length_does_not_allocate() {
        let mut reader = DataReader::new(&[0x7F, 0xFF, 0xFF, 0xFF]);
        reader.read_byte_array().unwrap_err();
    }

    #[test]
    fn reader_can_start_mid_buffer() {
        let data = [0, 0, 0, 0, 0, 0, 0, 1, 7];
        let mut reader = DataReader::at(&data, 4);
        assert_eq!(reader.read_bytes().unwrap(), [7]);
        assert_eq!(DataReader::at(&data, 100).remaining(), 0);
    }
}
