use {
    rand::RngCore,
    std::mem::size_of,
    tdstore_protocol::{DataReader, DataStream},
};

pub(crate) const SIZE_FIELD_LEN: usize = size_of::<u32>();
pub(crate) const BLOCK_LEN: usize = 16;

/// Plaintext being prepared for encryption.
///
/// Starts with a reserved size field; fields are appended through
/// [`stream`](Self::stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDescriptor {
    stream: DataStream,
}

impl Default for EncryptedDescriptor {
    #[inline]
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl EncryptedDescriptor {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves room for `payload_size` bytes of fields plus padding.
    #[must_use]
    #[inline]
    pub fn with_capacity(payload_size: usize) -> Self {
        let full = SIZE_FIELD_LEN
            .saturating_add(payload_size)
            .next_multiple_of(BLOCK_LEN);
        let mut data = Vec::with_capacity(full);
        data.resize(SIZE_FIELD_LEN, 0);
        Self {
            stream: DataStream::from_vec(data),
        }
    }

    #[inline]
    pub fn stream(&mut self) -> &mut DataStream {
        &mut self.stream
    }

    /// Length of the appended fields.
    #[must_use]
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.stream.len().saturating_sub(SIZE_FIELD_LEN)
    }

    /// Fills in the size field and appends random padding.
    pub(crate) fn into_padded(self) -> Vec<u8> {
        let mut data = self.stream.into_inner();
        let size = data.len();
        #[expect(clippy::expect_used, reason = "format limit, caller bug")]
        let size_field = u32::try_from(size).expect("encrypted block is too large");
        if let Some(field) = data.first_chunk_mut::<SIZE_FIELD_LEN>() {
            *field = size_field.to_le_bytes();
        }
        data.resize(size.next_multiple_of(BLOCK_LEN), 0);
        rand::rng().fill_bytes(data.get_mut(size..).unwrap_or_default());
        data
    }
}

/// Result of a successful decryption.
///
/// Holds the plaintext truncated to its declared size, size field included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedDescriptor {
    data: Vec<u8>,
}

impl DecryptedDescriptor {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        debug_assert!(data.len() >= SIZE_FIELD_LEN);
        Self { data }
    }

    /// Reader positioned after the size field.
    #[must_use]
    #[inline]
    pub fn stream(&self) -> DataReader<'_> {
        DataReader::at(&self.data, SIZE_FIELD_LEN)
    }

    /// Plaintext fields without the size field.
    #[must_use]
    #[inline]
    pub fn payload(&self) -> &[u8] {
        self.data.get(SIZE_FIELD_LEN..).unwrap_or_default()
    }

    /// Plaintext with the size field, and the offset of the first field.
    #[must_use]
    #[inline]
    pub fn into_parts(self) -> (Vec<u8>, usize) {
        (self.data, SIZE_FIELD_LEN)
    }

    #[must_use]
    #[inline]
    pub fn into_payload(mut self) -> Vec<u8> {
        let at = SIZE_FIELD_LEN.min(self.data.len());
        self.data.split_off(at)
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "test")]
mod tests {
    use super::*;

    #[test]
    fn padded_layout() {
        let mut descriptor = EncryptedDescriptor::with_capacity(5);
        descriptor.stream().write_raw(b"hello");
        assert_eq!(descriptor.payload_len(), 5);

        let padded = descriptor.into_padded();
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[..4], &9u32.to_le_bytes());
        assert_eq!(&padded[4..9], b"hello");
    }

    #[test]
    fn aligned_payload_is_not_padded() {
        let mut descriptor = EncryptedDescriptor::new();
        descriptor.stream().write_raw(&[1; 12]);
        let padded = descriptor.into_padded();
        assert_eq!(padded.len(), 16);
        assert_eq!(&padded[..4], &16u32.to_le_bytes());
    }

    #[test]
    fn decrypted_reader_skips_size() {
        let decrypted = DecryptedDescriptor::new(vec![8, 0, 0, 0, 0, 0, 0, 7]);
        assert_eq!(decrypted.payload(), [0, 0, 0, 7]);
        assert_eq!(decrypted.stream().read_i32().ok(), Some(7));
        assert_eq!(decrypted.into_payload(), [0, 0, 0, 7]);
    }
}
