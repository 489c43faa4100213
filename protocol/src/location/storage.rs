use {
    super::{FileLocationId, FileReferenceUpdates, NON_STORAGE_LOCATION_TOKEN},
    crate::{
        CacheKey,
        stream::{DataReader, DataStream, byte_array_size},
    },
    anyhow::{Result, bail},
    std::{
        cmp::Ordering,
        hash::{Hash, Hasher},
        mem::size_of,
    },
};

const SERIALIZE_TYPE_SHIFT: u8 = 0x08;
const DOCUMENT_CACHE_TAG: u64 = 0x100;
const DOCUMENT_BASE_CACHE_TAG: u64 = 0x0001_0000;
const PHOTO_BASE_CACHE_TAG: u64 = 0x0002_0000;
const BASE_CACHE_MASK: u64 = 0xFF00;

/// Variant tag of a remote-storage location, as written into serialized bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum StorageFileType {
    Legacy = 0,
    Encrypted = 1,
    Document = 2,
    Secure = 3,
    Takeout = 4,
    Photo = 5,
    PeerPhoto = 6,
    StickerSetThumb = 7,
}

impl StorageFileType {
    pub const ALL: [Self; 8] = [
        Self::Legacy,
        Self::Encrypted,
        Self::Document,
        Self::Secure,
        Self::Takeout,
        Self::Photo,
        Self::PeerPhoto,
        Self::StickerSetThumb,
    ];

    #[must_use]
    #[inline]
    #[expect(clippy::as_conversions, reason = "fieldless enum discriminant")]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for StorageFileType {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(value: u8) -> Result<Self> {
        let Some(kind) = Self::ALL.get(usize::from(value)) else {
            bail!("unknown storage location type {value}");
        };
        Ok(*kind)
    }
}

/// Legacy location kinds that can be rewritten into a modern form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModernLocationType {
    PeerPhoto,
    StickerSetThumb,
}

/// Identifying payload of each storage location variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocationKind {
    Legacy {
        volume_id: u64,
        local_id: i32,
        secret: u64,
    },
    Encrypted {
        id: u64,
        access_hash: u64,
    },
    Document {
        id: u64,
        access_hash: u64,
        /// Thumbnail size letter; zero for the document itself.
        size_letter: u8,
    },
    Secure {
        id: u64,
        access_hash: u64,
    },
    Takeout,
    Photo {
        id: u64,
        access_hash: u64,
        size_letter: u8,
    },
    PeerPhoto {
        peer_id: u64,
        access_hash: u64,
        volume_id: u64,
        local_id: i32,
        size_letter: u8,
        in_message_peer_id: i32,
        in_message_id: i32,
    },
    StickerSetThumb {
        set_id: u64,
        access_hash: u64,
        volume_id: u64,
        local_id: i32,
    },
}

impl StorageLocationKind {
    #[must_use]
    #[inline]
    pub const fn file_type(&self) -> StorageFileType {
        match self {
            Self::Legacy { .. } => StorageFileType::Legacy,
            Self::Encrypted { .. } => StorageFileType::Encrypted,
            Self::Document { .. } => StorageFileType::Document,
            Self::Secure { .. } => StorageFileType::Secure,
            Self::Takeout => StorageFileType::Takeout,
            Self::Photo { .. } => StorageFileType::Photo,
            Self::PeerPhoto { .. } => StorageFileType::PeerPhoto,
            Self::StickerSetThumb { .. } => StorageFileType::StickerSetThumb,
        }
    }

    fn fields(&self) -> Fields {
        let mut fields = Fields::default();
        match *self {
            Self::Legacy {
                volume_id,
                local_id,
                secret,
            } => {
                fields.volume_id = volume_id;
                fields.local_id = local_id;
                fields.access_hash = secret;
            }
            Self::Encrypted { id, access_hash } | Self::Secure { id, access_hash } => {
                fields.id = id;
                fields.access_hash = access_hash;
            }
            Self::Document {
                id,
                access_hash,
                size_letter,
            }
            | Self::Photo {
                id,
                access_hash,
                size_letter,
            } => {
                fields.id = id;
                fields.access_hash = access_hash;
                fields.size_letter = size_letter;
            }
            Self::Takeout => {}
            Self::PeerPhoto {
                peer_id,
                access_hash,
                volume_id,
                local_id,
                size_letter,
                in_message_peer_id,
                in_message_id,
            } => {
                fields = Fields {
                    size_letter,
                    local_id,
                    id: peer_id,
                    access_hash,
                    volume_id,
                    in_message_peer_id,
                    in_message_id,
                };
            }
            Self::StickerSetThumb {
                set_id,
                access_hash,
                volume_id,
                local_id,
            } => {
                fields.id = set_id;
                fields.access_hash = access_hash;
                fields.volume_id = volume_id;
                fields.local_id = local_id;
            }
        }
        fields
    }

    fn from_fields(file_type: StorageFileType, fields: Fields) -> Self {
        let Fields {
            size_letter,
            local_id,
            id,
            access_hash,
            volume_id,
            in_message_peer_id,
            in_message_id,
        } = fields;
        match file_type {
            StorageFileType::Legacy => Self::Legacy {
                volume_id,
                local_id,
                secret: access_hash,
            },
            StorageFileType::Encrypted => Self::Encrypted { id, access_hash },
            StorageFileType::Document => Self::Document {
                id,
                access_hash,
                size_letter,
            },
            StorageFileType::Secure => Self::Secure { id, access_hash },
            StorageFileType::Takeout => Self::Takeout,
            StorageFileType::Photo => Self::Photo {
                id,
                access_hash,
                size_letter,
            },
            StorageFileType::PeerPhoto => Self::PeerPhoto {
                peer_id: id,
                access_hash,
                volume_id,
                local_id,
                size_letter,
                in_message_peer_id,
                in_message_id,
            },
            StorageFileType::StickerSetThumb => Self::StickerSetThumb {
                set_id: id,
                access_hash,
                volume_id,
                local_id,
            },
        }
    }
}

/// Flat view of all numeric fields, in the serialized layout.
#[derive(Debug, Clone, Copy, Default)]
struct Fields {
    size_letter: u8,
    local_id: i32,
    id: u64,
    access_hash: u64,
    volume_id: u64,
    in_message_peer_id: i32,
    in_message_id: i32,
}

/// Location of a file on a remote storage datacenter.
///
/// Equality, ordering and hashing consider only the identifying fields of the
/// variant. The file reference is excluded, so refreshing it never changes
/// the identity or the cache key of a location. All invalid locations are
/// equal to each other and sort before any valid one.
#[derive(Debug, Clone)]
pub struct StorageFileLocation {
    dc_id: i32,
    kind: StorageLocationKind,
    file_reference: Vec<u8>,
}

impl Default for StorageFileLocation {
    #[inline]
    fn default() -> Self {
        Self {
            dc_id: 0,
            kind: StorageLocationKind::Legacy {
                volume_id: 0,
                local_id: 0,
                secret: 0,
            },
            file_reference: Vec::new(),
        }
    }
}

impl StorageFileLocation {
    #[must_use]
    #[inline]
    pub fn new(dc_id: i32, kind: StorageLocationKind, file_reference: Vec<u8>) -> Self {
        Self {
            dc_id,
            kind,
            file_reference,
        }
    }

    /// The canonical invalid location.
    #[must_use]
    #[inline]
    pub fn invalid() -> Self {
        Self::default()
    }

    #[must_use]
    #[inline]
    pub fn dc_id(&self) -> i32 {
        self.dc_id
    }

    #[must_use]
    #[inline]
    pub fn kind(&self) -> &StorageLocationKind {
        &self.kind
    }

    #[must_use]
    #[inline]
    pub fn file_type(&self) -> StorageFileType {
        self.kind.file_type()
    }

    /// Remote object id (peer id for peer photos, set id for sticker set thumbs).
    #[must_use]
    #[inline]
    pub fn object_id(&self) -> u64 {
        self.kind.fields().id
    }

    #[must_use]
    #[inline]
    pub fn file_reference(&self) -> &[u8] {
        &self.file_reference
    }

    #[must_use]
    #[inline]
    pub fn valid(&self) -> bool {
        let has_dc = self.dc_id != 0;
        match self.kind {
            StorageLocationKind::Legacy {
                volume_id,
                local_id,
                ..
            } => has_dc && volume_id != 0 && local_id != 0,
            StorageLocationKind::Encrypted { id, .. }
            | StorageLocationKind::Secure { id, .. }
            | StorageLocationKind::Document { id, .. } => has_dc && id != 0,
            StorageLocationKind::Photo {
                id, size_letter, ..
            } => has_dc && id != 0 && size_letter != 0,
            StorageLocationKind::Takeout => true,
            StorageLocationKind::PeerPhoto { peer_id: id, .. }
            | StorageLocationKind::StickerSetThumb { set_id: id, .. } => has_dc && id != 0,
        }
    }

    #[must_use]
    #[inline]
    pub fn is_legacy(&self) -> bool {
        matches!(self.kind, StorageLocationKind::Legacy { .. })
    }

    #[must_use]
    #[inline]
    pub fn is_document_thumbnail(&self) -> bool {
        matches!(
            self.kind,
            StorageLocationKind::Document { size_letter, .. } if size_letter != 0
        )
    }

    /// Rewrites a legacy location into a peer photo or sticker set thumbnail,
    /// keeping the volume, local id and file reference.
    ///
    /// Non-legacy locations are returned unchanged.
    #[must_use]
    #[inline]
    pub fn convert_to_modern(&self, target: ModernLocationType, id: u64, access_hash: u64) -> Self {
        debug_assert!(self.is_legacy(), "only legacy locations can be converted");
        let StorageLocationKind::Legacy {
            volume_id,
            local_id,
            ..
        } = self.kind
        else {
            return self.clone();
        };
        let kind = match target {
            ModernLocationType::PeerPhoto => StorageLocationKind::PeerPhoto {
                peer_id: id,
                access_hash,
                volume_id,
                local_id,
                size_letter: b'a',
                in_message_peer_id: 0,
                in_message_id: 0,
            },
            ModernLocationType::StickerSetThumb => StorageLocationKind::StickerSetThumb {
                set_id: id,
                access_hash,
                volume_id,
                local_id,
            },
        };
        Self::new(self.dc_id, kind, self.file_reference.clone())
    }

    /// Serialized size in bytes; zero for an invalid location.
    #[must_use]
    #[inline]
    pub fn serialize_size(&self) -> usize {
        if self.valid() {
            size_of::<u64>()
                .saturating_mul(5)
                .saturating_add(byte_array_size(Some(&self.file_reference)))
        } else {
            0
        }
    }

    /// Compact binary form. Invalid locations serialize to no bytes.
    #[must_use]
    #[inline]
    pub fn serialize(&self) -> Vec<u8> {
        if !self.valid() {
            return Vec::new();
        }
        let fields = self.kind.fields();
        let mut stream = DataStream::with_capacity(self.serialize_size());
        stream
            .write_u16(dc_wire_id(self.dc_id))
            .write_u8(SERIALIZE_TYPE_SHIFT | self.file_type().tag())
            .write_u8(fields.size_letter)
            .write_i32(fields.local_id)
            .write_u64(fields.id)
            .write_u64(fields.access_hash)
            .write_u64(fields.volume_id)
            .write_i32(fields.in_message_peer_id)
            .write_i32(fields.in_message_id)
            .write_bytes(&self.file_reference);
        stream.into_inner()
    }

    /// Parses bytes produced by [`serialize`](Self::serialize).
    ///
    /// Empty input yields the invalid location. Truncated input, an unknown
    /// type tag, the non-storage token or a decoded location that is not valid
    /// all yield `None`.
    #[must_use]
    #[inline]
    pub fn from_serialized(serialized: &[u8]) -> Option<Self> {
        if serialized.is_empty() {
            return Some(Self::invalid());
        }
        Self::read(&mut DataReader::new(serialized))
            .ok()
            .flatten()
            .filter(Self::valid)
    }

    fn read(reader: &mut DataReader<'_>) -> Result<Option<Self>> {
        let dc_id = reader.read_u16()?;
        let mut tag = reader.read_u8()?;
        if tag == NON_STORAGE_LOCATION_TOKEN {
            return Ok(None);
        }
        let mut fields = Fields {
            size_letter: reader.read_u8()?,
            local_id: reader.read_i32()?,
            id: reader.read_u64()?,
            access_hash: reader.read_u64()?,
            volume_id: reader.read_u64()?,
            ..Fields::default()
        };
        if tag & SERIALIZE_TYPE_SHIFT != 0 {
            tag &= !SERIALIZE_TYPE_SHIFT;
            fields.in_message_peer_id = reader.read_i32()?;
            fields.in_message_id = reader.read_i32()?;
        }
        let file_reference = reader.read_bytes()?;
        let kind = StorageLocationKind::from_fields(StorageFileType::try_from(tag)?, fields);
        Ok(Some(Self::new(i32::from(dc_id), kind, file_reference)))
    }

    /// Key of this file in the media cache.
    ///
    /// Stable across file reference refreshes.
    #[must_use]
    #[inline]
    #[expect(clippy::arithmetic_side_effects, reason = "small tag offsets")]
    pub fn cache_key(&self) -> CacheKey {
        let fields = self.kind.fields();
        // Tags 1 and 2 are taken by document keys.
        let shifted = (u64::from(self.file_type().tag()) + 3) << 8;
        let sliced = self.dc_slice();
        match self.kind {
            StorageLocationKind::Legacy { .. }
            | StorageLocationKind::PeerPhoto { .. }
            | StorageLocationKind::StickerSetThumb { .. } => CacheKey::new(
                shifted | sliced | (u64::from(fields.local_id.cast_unsigned()) << 16),
                fields.volume_id,
            ),
            StorageLocationKind::Encrypted { id, .. } | StorageLocationKind::Secure { id, .. } => {
                CacheKey::new(shifted | sliced, id)
            }
            StorageLocationKind::Document {
                id, size_letter: 0, ..
            } => document_cache_key(self.dc_id, id),
            StorageLocationKind::Document {
                id, size_letter, ..
            }
            | StorageLocationKind::Photo {
                id, size_letter, ..
            } => CacheKey::new(shifted | sliced | (u64::from(size_letter) << 16), id),
            StorageLocationKind::Takeout => CacheKey::new(shifted, 0),
        }
    }

    /// Base key of a file cached in parts. Only documents, photos and sticker
    /// set thumbnails are stored that way.
    #[must_use]
    #[inline]
    #[expect(clippy::arithmetic_side_effects, reason = "small tag offsets")]
    pub fn big_file_base_cache_key(&self) -> Option<CacheKey> {
        let dc_part = (u64::from(self.dc_id.cast_unsigned()) << 16) & BASE_CACHE_MASK;
        let key = match self.kind {
            StorageLocationKind::Document { id, .. } => {
                CacheKey::new(DOCUMENT_BASE_CACHE_TAG | dc_part | (id >> 48), id << 16)
            }
            StorageLocationKind::Photo { id, .. } => {
                CacheKey::new(PHOTO_BASE_CACHE_TAG | dc_part | (id >> 48), id << 16)
            }
            StorageLocationKind::StickerSetThumb {
                volume_id,
                local_id,
                ..
            } => CacheKey::new(
                (u64::from(local_id.cast_unsigned()) << 24)
                    | ((u64::from(self.file_type().tag()) + 1) << 16)
                    | (self.dc_slice() << 8)
                    | (volume_id >> 56),
                volume_id << 8,
            ),
            StorageLocationKind::Legacy { .. }
            | StorageLocationKind::Encrypted { .. }
            | StorageLocationKind::Secure { .. }
            | StorageLocationKind::Takeout
            | StorageLocationKind::PeerPhoto { .. } => return None,
        };
        debug_assert_eq!(key.low & 0xFF, 0);
        Some(key)
    }

    /// Replaces the file reference. Returns `false` when `data` is empty or
    /// equal to the current reference.
    #[inline]
    pub fn refresh_file_reference(&mut self, data: &[u8]) -> bool {
        if data.is_empty() || self.file_reference == data {
            return false;
        }
        self.file_reference = data.to_vec();
        true
    }

    /// Picks the reference for this document or photo out of `updates`.
    #[inline]
    pub fn refresh_from_updates(&mut self, updates: &FileReferenceUpdates) -> bool {
        let id = match self.kind {
            StorageLocationKind::Document { id, .. } => FileLocationId::Document(id),
            StorageLocationKind::Photo { id, .. } => FileLocationId::Photo(id),
            _ => return false,
        };
        match updates.get(&id) {
            Some(reference) => self.refresh_file_reference(reference),
            None => false,
        }
    }

    fn dc_slice(&self) -> u64 {
        u64::from(self.dc_id.cast_unsigned()) & 0xFF
    }

    /// Identity fields compared by equality and ordering, in ordering priority.
    fn identity(&self) -> Identity {
        let dc = self.dc_id;
        match self.kind {
            StorageLocationKind::Legacy {
                volume_id,
                local_id,
                ..
            } => Identity::Legacy(local_id, volume_id, dc),
            StorageLocationKind::Encrypted { id, .. } | StorageLocationKind::Secure { id, .. } => {
                Identity::Plain(id, dc)
            }
            StorageLocationKind::Document {
                id, size_letter, ..
            }
            | StorageLocationKind::Photo {
                id, size_letter, ..
            } => Identity::Sized(id, dc, size_letter),
            StorageLocationKind::Takeout => Identity::Takeout,
            StorageLocationKind::PeerPhoto {
                peer_id,
                size_letter,
                local_id,
                volume_id,
                ..
            } => Identity::PeerPhoto(peer_id, size_letter, local_id, volume_id, dc),
            StorageLocationKind::StickerSetThumb {
                set_id,
                local_id,
                volume_id,
                ..
            } => Identity::StickerSetThumb(set_id, local_id, volume_id, dc),
        }
    }
}

/// Ordering key of a valid location within its variant.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Identity {
    Legacy(i32, u64, i32),
    Plain(u64, i32),
    Sized(u64, i32, u8),
    Takeout,
    PeerPhoto(u64, u8, i32, u64, i32),
    StickerSetThumb(u64, i32, u64, i32),
}

/// Datacenter id as stored in serialized locations: its low 16 bits.
fn dc_wire_id(dc_id: i32) -> u16 {
    let [low, high, ..] = dc_id.to_le_bytes();
    u16::from_le_bytes([low, high])
}

/// Key of a whole (non-thumbnail) document in the media cache.
#[must_use]
#[inline]
pub fn document_cache_key(dc_id: i32, id: u64) -> CacheKey {
    CacheKey::new(
        DOCUMENT_CACHE_TAG | (u64::from(dc_id.cast_unsigned()) & 0xFF),
        id,
    )
}

impl PartialEq for StorageFileLocation {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StorageFileLocation {}

impl PartialOrd for StorageFileLocation {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StorageFileLocation {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.valid(), other.valid()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => self
                .file_type()
                .cmp(&other.file_type())
                .then_with(|| self.identity().cmp(&other.identity())),
        }
    }
}

impl Hash for StorageFileLocation {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        let valid = self.valid();
        valid.hash(state);
        if valid {
            self.file_type().hash(state);
            self.identity().hash(state);
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {super::*, std::collections::HashSet};

    fn photo(id: u64, access_hash: u64, reference: &[u8]) -> StorageFileLocation {
        StorageFileLocation::new(
            2,
            StorageLocationKind::Photo {
                id,
                access_hash,
                size_letter: b'a',
            },
            reference.to_vec(),
        )
    }

    fn legacy(dc_id: i32, volume_id: u64, local_id: i32) -> StorageFileLocation {
        StorageFileLocation::new(
            dc_id,
            StorageLocationKind::Legacy {
                volume_id,
                local_id,
                secret: 77,
            },
            Vec::new(),
        )
    }

    #[test]
    fn photo_round_trip() {
        let location = photo(7, 9, b"ref");
        let bytes = location.serialize();
        assert_eq!(bytes.len(), location.serialize_size());
        assert_eq!(bytes.first(), Some(&0));
        assert_eq!(bytes.get(2), Some(&(0x08 | 5)));

        let parsed = StorageFileLocation::from_serialized(&bytes).unwrap();
        assert_eq!(parsed, location);
        assert_eq!(parsed.file_reference(), b"ref");
        assert_eq!(parsed.kind(), location.kind());
        assert_eq!(parsed.cache_key(), location.cache_key());
        assert_eq!(location.cache_key(), location.cache_key());
        assert_eq!(
            location.cache_key(),
            CacheKey::new(((5 + 3) << 8) | 2 | (u64::from(b'a') << 16), 7)
        );
    }

    #[test]
    fn every_variant_round_trips() {
        let kinds = [
            StorageLocationKind::Legacy {
                volume_id: 5,
                local_id: -3,
                secret: 8,
            },
            StorageLocationKind::Encrypted {
                id: 1,
                access_hash: 2,
            },
            StorageLocationKind::Document {
                id: 3,
                access_hash: 4,
                size_letter: 0,
            },
            StorageLocationKind::Secure {
                id: 5,
                access_hash: 6,
            },
            StorageLocationKind::Takeout,
            StorageLocationKind::PeerPhoto {
                peer_id: 9,
                access_hash: 10,
                volume_id: 11,
                local_id: 12,
                size_letter: b'c',
                in_message_peer_id: -13,
                in_message_id: 14,
            },
            StorageLocationKind::StickerSetThumb {
                set_id: 15,
                access_hash: 16,
                volume_id: 17,
                local_id: 18,
            },
        ];
        for kind in kinds {
            let location = StorageFileLocation::new(4, kind, vec![1, 2, 3]);
            let parsed = StorageFileLocation::from_serialized(&location.serialize()).unwrap();
            assert_eq!(parsed.kind(), &kind);
            assert_eq!(parsed.dc_id(), 4);
        }
    }

    #[test]
    fn invalid_locations() {
        let invalid = StorageFileLocation::invalid();
        assert!(!invalid.valid());
        assert!(invalid.serialize().is_empty());
        assert_eq!(invalid.serialize_size(), 0);
        assert_eq!(StorageFileLocation::from_serialized(&[]).unwrap(), invalid);

        // Photo without a size letter.
        let mut stream = DataStream::new();
        stream
            .write_u16(2)
            .write_u8(0x08 | 5)
            .write_u8(0)
            .write_i32(0)
            .write_u64(7)
            .write_u64(9)
            .write_u64(0)
            .write_i32(0)
            .write_i32(0)
            .write_bytes(b"");
        assert_eq!(StorageFileLocation::from_serialized(stream.as_slice()), None);

        assert!(legacy(0, 1, 1) == legacy(1, 0, 1));
        assert!(legacy(0, 1, 1) < legacy(1, 1, 1));
    }

    #[test]
    fn malformed_input() {
        let bytes = photo(7, 9, b"ref").serialize();
        for len in 1..bytes.len() {
            assert_eq!(
                StorageFileLocation::from_serialized(bytes.get(..len).unwrap()),
                None
            );
        }
        assert_eq!(
            StorageFileLocation::from_serialized(&[0, 0, 0x10, 1]),
            None
        );
        let mut unknown = bytes.clone();
        // Still unknown once the in-message flag is masked off.
        *unknown.get_mut(2).unwrap() = SERIALIZE_TYPE_SHIFT | 0x30;
        assert_eq!(StorageFileLocation::from_serialized(&unknown), None);
    }

    #[test]
    fn missing_in_message_fields_are_accepted() {
        let mut stream = DataStream::new();
        stream
            .write_u16(3)
            .write_u8(2)
            .write_u8(0)
            .write_i32(0)
            .write_u64(42)
            .write_u64(1)
            .write_u64(0)
            .write_byte_array(None);
        let parsed = StorageFileLocation::from_serialized(stream.as_slice()).unwrap();
        assert_eq!(parsed.file_type(), StorageFileType::Document);
        assert_eq!(parsed.object_id(), 42);
        assert!(parsed.file_reference().is_empty());
    }

    #[test]
    fn reference_does_not_affect_identity() {
        let mut location = photo(7, 9, b"old");
        let other = photo(7, 10, b"new");
        assert_eq!(location, other);
        let set: HashSet<_> = [location.clone(), other].into_iter().collect();
        assert_eq!(set.len(), 1);

        let key = location.cache_key();
        assert!(!location.refresh_file_reference(b""));
        assert!(!location.refresh_file_reference(b"old"));
        assert!(location.refresh_file_reference(b"new"));
        assert_eq!(location.file_reference(), b"new");
        assert_eq!(location.cache_key(), key);
    }

    #[test]
    fn refresh_from_updates_matches_by_id() {
        let mut updates = FileReferenceUpdates::new();
        updates.insert(FileLocationId::Photo(7), b"fresh".to_vec());
        updates.insert(FileLocationId::Document(8), b"doc".to_vec());

        let mut location = photo(7, 9, b"stale");
        assert!(location.refresh_from_updates(&updates));
        assert_eq!(location.file_reference(), b"fresh");
        assert!(!location.refresh_from_updates(&updates));

        let mut unrelated = photo(8, 9, b"stale");
        assert!(!unrelated.refresh_from_updates(&updates));
    }

    #[test]
    fn ordering_is_per_variant() {
        let a = legacy(2, 10, 1);
        let b = legacy(1, 5, 2);
        // Local id first.
        assert!(a < b);
        let photo_location = photo(1, 1, b"");
        // Legacy sorts before photo by type tag.
        assert!(b < photo_location);

        let takeout = |dc| StorageFileLocation::new(dc, StorageLocationKind::Takeout, Vec::new());
        assert_eq!(takeout(1), takeout(2));
    }

    #[test]
    fn cache_keys() {
        let document = StorageFileLocation::new(
            0x102,
            StorageLocationKind::Document {
                id: 0xABCD,
                access_hash: 1,
                size_letter: 0,
            },
            Vec::new(),
        );
        assert_eq!(document.cache_key(), CacheKey::new(0x102, 0xABCD));
        assert!(!document.is_document_thumbnail());

        let thumbnail = StorageFileLocation::new(
            2,
            StorageLocationKind::Document {
                id: 0xABCD,
                access_hash: 1,
                size_letter: b'm',
            },
            Vec::new(),
        );
        assert!(thumbnail.is_document_thumbnail());
        assert_eq!(
            thumbnail.cache_key(),
            CacheKey::new((5 << 8) | 2 | (u64::from(b'm') << 16), 0xABCD)
        );

        let location = legacy(3, 0x55, -1);
        assert_eq!(
            location.cache_key(),
            CacheKey::new((3 << 8) | 3 | (0xFFFF_FFFF << 16), 0x55)
        );

        let takeout = StorageFileLocation::new(1, StorageLocationKind::Takeout, Vec::new());
        assert_eq!(takeout.cache_key(), CacheKey::new(7 << 8, 0));
    }

    #[test]
    fn big_file_keys() {
        let document = StorageFileLocation::new(
            2,
            StorageLocationKind::Document {
                id: 0x0123_4567_89AB_CDEF,
                access_hash: 1,
                size_letter: 0,
            },
            Vec::new(),
        );
        assert_eq!(
            document.big_file_base_cache_key(),
            Some(CacheKey::new(0x1_0000 | 0x0123, 0x4567_89AB_CDEF_0000))
        );

        let thumb = StorageFileLocation::new(
            2,
            StorageLocationKind::StickerSetThumb {
                set_id: 1,
                access_hash: 1,
                volume_id: 0xAB00_0000_0000_0001,
                local_id: 3,
            },
            Vec::new(),
        );
        assert_eq!(
            thumb.big_file_base_cache_key(),
            Some(CacheKey::new((3 << 24) | (8 << 16) | (2 << 8) | 0xAB, 0x100))
        );

        assert_eq!(legacy(1, 1, 1).big_file_base_cache_key(), None);
    }

    #[test]
    fn legacy_converts_to_modern() {
        let location = legacy(2, 100, 5);
        let peer = location.convert_to_modern(ModernLocationType::PeerPhoto, 33, 44);
        assert_eq!(peer.file_type(), StorageFileType::PeerPhoto);
        assert_eq!(peer.object_id(), 33);
        assert!(matches!(
            peer.kind(),
            StorageLocationKind::PeerPhoto {
                volume_id: 100,
                local_id: 5,
                size_letter: b'a',
                access_hash: 44,
                ..
            }
        ));
        // Same volume and local id keep the same cache key.
        assert_eq!(
            peer.cache_key().low,
            location.cache_key().low
        );

        let thumb = location.convert_to_modern(ModernLocationType::StickerSetThumb, 33, 44);
        assert_eq!(thumb.file_type(), StorageFileType::StickerSetThumb);
        assert!(thumb.valid());
    }
}
