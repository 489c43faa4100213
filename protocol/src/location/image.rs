use {
    super::{DownloadLocation, FileReferenceUpdates, StorageFileLocation},
    crate::{
        CacheKey,
        stream::{DataReader, DataStream},
    },
    std::mem::size_of,
};

const DIMENSIONS_SIZE: usize = 2 * size_of::<i32>();

/// File location with a compact binary form.
pub trait SerializedLocation: Sized {
    fn serialize(&self) -> Vec<u8>;
    fn serialize_size(&self) -> usize;
    fn from_serialized(serialized: &[u8]) -> Option<Self>;
    fn valid(&self) -> bool;
    fn cache_key(&self) -> CacheKey;
    fn refresh_file_reference(&mut self, data: &[u8]) -> bool;
    fn refresh_from_updates(&mut self, updates: &FileReferenceUpdates) -> bool;
}

impl SerializedLocation for StorageFileLocation {
    #[inline]
    fn serialize(&self) -> Vec<u8> {
        Self::serialize(self)
    }

    #[inline]
    fn serialize_size(&self) -> usize {
        Self::serialize_size(self)
    }

    #[inline]
    fn from_serialized(serialized: &[u8]) -> Option<Self> {
        Self::from_serialized(serialized)
    }

    #[inline]
    fn valid(&self) -> bool {
        Self::valid(self)
    }

    #[inline]
    fn cache_key(&self) -> CacheKey {
        Self::cache_key(self)
    }

    #[inline]
    fn refresh_file_reference(&mut self, data: &[u8]) -> bool {
        Self::refresh_file_reference(self, data)
    }

    #[inline]
    fn refresh_from_updates(&mut self, updates: &FileReferenceUpdates) -> bool {
        Self::refresh_from_updates(self, updates)
    }
}

impl SerializedLocation for DownloadLocation {
    #[inline]
    fn serialize(&self) -> Vec<u8> {
        Self::serialize(self)
    }

    #[inline]
    fn serialize_size(&self) -> usize {
        Self::serialize_size(self)
    }

    #[inline]
    fn from_serialized(serialized: &[u8]) -> Option<Self> {
        Self::from_serialized(serialized)
    }

    #[inline]
    fn valid(&self) -> bool {
        Self::valid(self)
    }

    #[inline]
    fn cache_key(&self) -> CacheKey {
        Self::cache_key(self)
    }

    #[inline]
    fn refresh_file_reference(&mut self, data: &[u8]) -> bool {
        Self::refresh_file_reference(self, data)
    }

    #[inline]
    fn refresh_from_updates(&mut self, updates: &FileReferenceUpdates) -> bool {
        Self::refresh_from_updates(self, updates)
    }
}

/// A file location together with image dimensions.
///
/// Dimensions are appended after the file bytes as two `i32` values, and only
/// when there is something to append to or a dimension is positive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizedLocation<L> {
    file: L,
    width: i32,
    height: i32,
}

pub type StorageImageLocation = SizedLocation<StorageFileLocation>;
pub type ImageLocation = SizedLocation<DownloadLocation>;

impl<L: SerializedLocation> SizedLocation<L> {
    #[must_use]
    #[inline]
    pub fn new(file: L, width: i32, height: i32) -> Self {
        Self {
            file,
            width,
            height,
        }
    }

    #[must_use]
    #[inline]
    pub fn file(&self) -> &L {
        &self.file
    }

    #[must_use]
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[must_use]
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[must_use]
    #[inline]
    pub fn valid(&self) -> bool {
        self.file.valid()
    }

    #[must_use]
    #[inline]
    pub fn cache_key(&self) -> CacheKey {
        self.file.cache_key()
    }

    #[inline]
    pub fn refresh_file_reference(&mut self, data: &[u8]) -> bool {
        self.file.refresh_file_reference(data)
    }

    #[inline]
    pub fn refresh_from_updates(&mut self, updates: &FileReferenceUpdates) -> bool {
        self.file.refresh_from_updates(updates)
    }

    fn has_dimensions(&self, file_size: usize) -> bool {
        file_size > 0 || self.width > 0 || self.height > 0
    }

    #[must_use]
    #[inline]
    pub fn serialize_size(&self) -> usize {
        let partial = self.file.serialize_size();
        if self.has_dimensions(partial) {
            partial.saturating_add(DIMENSIONS_SIZE)
        } else {
            0
        }
    }

    #[must_use]
    #[inline]
    pub fn serialize(&self) -> Vec<u8> {
        let file = self.file.serialize();
        if !self.has_dimensions(file.len()) {
            return file;
        }
        let mut stream = DataStream::from_vec(file);
        stream.write_i32(self.width).write_i32(self.height);
        stream.into_inner()
    }

    /// The file part is parsed from the whole input; dimensions are taken
    /// from its last eight bytes.
    #[must_use]
    #[inline]
    pub fn from_serialized(serialized: &[u8]) -> Option<Self> {
        let file = L::from_serialized(serialized)?;
        if serialized.is_empty() {
            return Some(Self::new(file, 0, 0));
        }
        let start = serialized.len().checked_sub(DIMENSIONS_SIZE)?;
        let mut reader = DataReader::at(serialized, start);
        let width = reader.read_i32().ok()?;
        let height = reader.read_i32().ok()?;
        Some(Self::new(file, width, height))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {
        super::*,
        crate::location::{InMemoryLocation, StorageLocationKind},
    };

    fn photo() -> StorageFileLocation {
        StorageFileLocation::new(
            1,
            StorageLocationKind::Photo {
                id: 7,
                access_hash: 9,
                size_letter: b'x',
            },
            vec![0xAA; 4],
        )
    }

    #[test]
    fn storage_image_round_trip() {
        let image = StorageImageLocation::new(photo(), 1280, 720);
        let bytes = image.serialize();
        assert_eq!(bytes.len(), image.serialize_size());
        assert_eq!(bytes.len(), photo().serialize().len() + 8);

        let parsed = StorageImageLocation::from_serialized(&bytes).unwrap();
        assert_eq!(parsed.file(), &photo());
        assert_eq!(parsed.width(), 1280);
        assert_eq!(parsed.height(), 720);
        assert_eq!(parsed.cache_key(), photo().cache_key());
    }

    #[test]
    fn empty_image() {
        let empty = StorageImageLocation::default();
        assert!(empty.serialize().is_empty());
        assert_eq!(empty.serialize_size(), 0);
        let parsed = StorageImageLocation::from_serialized(&[]).unwrap();
        assert!(!parsed.valid());
        assert_eq!((parsed.width(), parsed.height()), (0, 0));

        // Dimensions alone are still written.
        let sized = StorageImageLocation::new(StorageFileLocation::invalid(), 0, 5);
        assert_eq!(sized.serialize(), [0, 0, 0, 0, 0, 0, 0, 5]);
    }

    #[test]
    fn download_image_round_trip() {
        let image = ImageLocation::new(
            DownloadLocation::InMemory(InMemoryLocation {
                bytes: b"png".to_vec(),
            }),
            16,
            32,
        );
        let parsed = ImageLocation::from_serialized(&image.serialize()).unwrap();
        assert_eq!(parsed, image);
        assert!(parsed.valid());
    }

    #[test]
    fn refresh_through_image() {
        let mut image = ImageLocation::new(DownloadLocation::from(photo()), 1, 1);
        assert!(image.refresh_file_reference(b"fresh"));
        assert_eq!(image.file().file_reference(), b"fresh");
    }
}
