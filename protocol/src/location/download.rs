use {
    super::{
        FileReferenceUpdates, ModernLocationType, NON_STORAGE_LOCATION_TOKEN, StorageFileLocation,
    },
    crate::{
        CacheKey, InMemoryKey,
        stream::{DataReader, DataStream, byte_array_size},
    },
    anyhow::{Result, bail},
    byteorder::{ByteOrder, LE},
    sha1::Sha1,
    sha2::{Digest, Sha256},
    std::mem::size_of,
};

const WEB_DOCUMENT_CACHE_TAG: u64 = 0x0000_0200_0000_0000;
const URL_CACHE_TAG: u64 = 0x0000_0300_0000_0000;
const GEO_POINT_CACHE_TAG: u64 = 0x0000_0400_0000_0000;
/// Datacenter mixed into web document keys. Any constant works.
const WEB_CACHE_DC_ID: u64 = 4;

const NON_STORAGE_HEADER_SIZE: usize = size_of::<u16>() + 2 * size_of::<u8>();
const GEO_FIELDS_SIZE: usize = 2 * size_of::<f64>() + size_of::<u64>() + 4 * size_of::<i32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum NonStorageType {
    Web = 0,
    Geo = 1,
    Url = 2,
    Memory = 3,
}

impl NonStorageType {
    #[expect(clippy::as_conversions, reason = "fieldless enum discriminant")]
    const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for NonStorageType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Web,
            1 => Self::Geo,
            2 => Self::Url,
            3 => Self::Memory,
            _ => bail!("unknown non-storage location type {value}"),
        })
    }
}

/// Document hosted on a third-party web server and proxied by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebFileLocation {
    pub url: Vec<u8>,
    pub access_hash: u64,
}

impl WebFileLocation {
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        self.url.is_empty()
    }
}

/// Rendered map tile around a point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoPointLocation {
    pub lat: f64,
    pub lon: f64,
    pub access: u64,
    pub width: i32,
    pub height: i32,
    pub zoom: i32,
    pub scale: i32,
}

impl GeoPointLocation {
    fn packed_coordinates(&self) -> u64 {
        (coordinate_part(self.lat) << 32) | coordinate_part(self.lon)
    }
}

/// Microdegrees shifted to be non-negative.
#[expect(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "saturating float conversion"
)]
fn coordinate_part(value: f64) -> u64 {
    ((value + 360.0).abs() * 1_000_000.0).round() as u64
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainUrlLocation {
    pub url: String,
}

/// Image bytes that exist only in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryLocation {
    pub bytes: Vec<u8>,
}

/// Anything a file can be downloaded or rendered from.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadLocation {
    Storage(StorageFileLocation),
    Web(WebFileLocation),
    Geo(GeoPointLocation),
    Url(PlainUrlLocation),
    InMemory(InMemoryLocation),
}

impl Default for DownloadLocation {
    #[inline]
    fn default() -> Self {
        Self::Storage(StorageFileLocation::invalid())
    }
}

impl From<StorageFileLocation> for DownloadLocation {
    #[inline]
    fn from(value: StorageFileLocation) -> Self {
        Self::Storage(value)
    }
}

impl DownloadLocation {
    #[must_use]
    #[inline]
    pub fn valid(&self) -> bool {
        match self {
            Self::Storage(data) => data.valid(),
            Self::Web(data) => !data.is_null(),
            Self::Geo(_) => true,
            Self::Url(data) => !data.url.is_empty(),
            Self::InMemory(data) => !data.bytes.is_empty(),
        }
    }

    #[must_use]
    #[inline]
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Storage(data) if data.is_legacy())
    }

    #[must_use]
    #[inline]
    pub fn storage(&self) -> Option<&StorageFileLocation> {
        match self {
            Self::Storage(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    #[inline]
    pub fn file_reference(&self) -> &[u8] {
        self.storage()
            .map(StorageFileLocation::file_reference)
            .unwrap_or_default()
    }

    #[inline]
    pub fn refresh_file_reference(&mut self, data: &[u8]) -> bool {
        match self {
            Self::Storage(file) => file.refresh_file_reference(data),
            _ => false,
        }
    }

    #[inline]
    pub fn refresh_from_updates(&mut self, updates: &FileReferenceUpdates) -> bool {
        match self {
            Self::Storage(file) => file.refresh_from_updates(updates),
            _ => false,
        }
    }

    /// Converts a legacy storage location; anything else is returned as is.
    #[must_use]
    #[inline]
    pub fn convert_to_modern(&self, target: ModernLocationType, id: u64, access_hash: u64) -> Self {
        match self {
            Self::Storage(file) if file.is_legacy() => {
                Self::Storage(file.convert_to_modern(target, id, access_hash))
            }
            _ => self.clone(),
        }
    }

    #[must_use]
    #[inline]
    pub fn serialize_size(&self) -> usize {
        let fields = match self {
            Self::Storage(data) => return data.serialize_size(),
            _ if !self.valid() => return 0,
            Self::Web(data) => byte_array_size(Some(&data.url)).saturating_add(size_of::<u64>()),
            Self::Geo(_) => GEO_FIELDS_SIZE,
            Self::Url(data) => byte_array_size(Some(data.url.as_bytes())),
            Self::InMemory(data) => byte_array_size(Some(&data.bytes)),
        };
        fields.saturating_add(NON_STORAGE_HEADER_SIZE)
    }

    /// Storage locations use their own encoding. Other variants are prefixed
    /// with a zero datacenter and the non-storage token. Invalid locations
    /// serialize to no bytes.
    #[must_use]
    #[inline]
    pub fn serialize(&self) -> Vec<u8> {
        if let Self::Storage(data) = self {
            return data.serialize();
        }
        if !self.valid() {
            return Vec::new();
        }
        let mut stream = DataStream::with_capacity(self.serialize_size());
        stream.write_u16(0).write_u8(NON_STORAGE_LOCATION_TOKEN);
        match self {
            Self::Storage(_) => {}
            Self::Web(data) => {
                stream
                    .write_u8(NonStorageType::Web.tag())
                    .write_bytes(&data.url)
                    .write_u64(data.access_hash);
            }
            Self::Geo(data) => {
                stream
                    .write_u8(NonStorageType::Geo.tag())
                    .write_f64(data.lat)
                    .write_f64(data.lon)
                    .write_u64(data.access)
                    .write_i32(data.width)
                    .write_i32(data.height)
                    .write_i32(data.zoom)
                    .write_i32(data.scale);
            }
            Self::Url(data) => {
                stream
                    .write_u8(NonStorageType::Url.tag())
                    .write_bytes(data.url.as_bytes());
            }
            Self::InMemory(data) => {
                stream
                    .write_u8(NonStorageType::Memory.tag())
                    .write_bytes(&data.bytes);
            }
        }
        stream.into_inner()
    }

    #[must_use]
    #[inline]
    pub fn from_serialized(serialized: &[u8]) -> Option<Self> {
        let mut reader = DataReader::new(serialized);
        let dc_id = reader.read_u16().ok();
        let token = reader.read_u8().ok();
        if dc_id != Some(0) || token != Some(NON_STORAGE_LOCATION_TOKEN) {
            return StorageFileLocation::from_serialized(serialized).map(Self::Storage);
        }
        Self::read_non_storage(&mut reader).ok()
    }

    fn read_non_storage(reader: &mut DataReader<'_>) -> Result<Self> {
        Ok(match NonStorageType::try_from(reader.read_u8()?)? {
            NonStorageType::Web => Self::Web(WebFileLocation {
                url: reader.read_bytes()?,
                access_hash: reader.read_u64()?,
            }),
            NonStorageType::Geo => Self::Geo(GeoPointLocation {
                lat: reader.read_f64()?,
                lon: reader.read_f64()?,
                access: reader.read_u64()?,
                width: reader.read_i32()?,
                height: reader.read_i32()?,
                zoom: reader.read_i32()?,
                scale: reader.read_i32()?,
            }),
            NonStorageType::Url => Self::Url(PlainUrlLocation {
                url: String::from_utf8_lossy(&reader.read_bytes()?).into_owned(),
            }),
            NonStorageType::Memory => Self::InMemory(InMemoryLocation {
                bytes: reader.read_bytes()?,
            }),
        })
    }

    /// Key in the media cache. Empty for invalid and in-memory locations.
    #[must_use]
    #[inline]
    pub fn cache_key(&self) -> CacheKey {
        match self {
            Self::Storage(data) if data.valid() => data.cache_key(),
            Self::Web(data) if !data.is_null() => web_document_cache_key(data),
            Self::Url(data) if !data.url.is_empty() => url_cache_key(&data.url),
            Self::Geo(data) => geo_point_cache_key(data),
            Self::Storage(_) | Self::Web(_) | Self::Url(_) | Self::InMemory(_) => {
                CacheKey::default()
            }
        }
    }

    #[must_use]
    #[inline]
    pub fn big_file_base_cache_key(&self) -> Option<CacheKey> {
        self.storage()
            .and_then(StorageFileLocation::big_file_base_cache_key)
    }

    /// Key of the decoded image in the in-process image cache.
    #[must_use]
    #[inline]
    pub fn in_memory_key(&self) -> InMemoryKey {
        match self {
            Self::Storage(data) => data.cache_key().into(),
            Self::Web(data) => sha1_key(&data.url),
            Self::Geo(data) => InMemoryKey::new(
                data.packed_coordinates(),
                (i64::from(data.width).cast_unsigned() << 32)
                    | i64::from(data.height).cast_unsigned(),
            ),
            Self::Url(data) => {
                let utf16: Vec<u8> = data.url.encode_utf16().flat_map(u16::to_le_bytes).collect();
                sha1_key(&utf16)
            }
            Self::InMemory(data) => sha1_key(&data.bytes),
        }
    }
}

fn sha1_key(data: &[u8]) -> InMemoryKey {
    let hash = Sha1::digest(data);
    InMemoryKey::new(
        hash.get(..8).map_or(0, LE::read_u64),
        hash.get(8..16).map_or(0, LE::read_u64),
    )
}

fn web_document_cache_key(location: &WebFileLocation) -> CacheKey {
    let hash = Sha256::digest(&location.url);
    let part1 = hash.get(..4).map_or(0, |bytes| u64::from(LE::read_u32(bytes)));
    let part2 = hash.get(4..12).map_or(0, LE::read_u64);
    CacheKey::new(
        WEB_DOCUMENT_CACHE_TAG | ((WEB_CACHE_DC_ID & 0xFF) << 32) | part1,
        part2,
    )
}

fn url_cache_key(url: &str) -> CacheKey {
    let hash = Sha256::digest(url.as_bytes());
    let part1 = hash.get(..4).map_or(0, |bytes| u64::from(LE::read_u32(bytes)));
    let part2 = hash.get(4..12).map_or(0, LE::read_u64);
    let part3 = hash.get(12..14).map_or(0, |bytes| u64::from(LE::read_u16(bytes)));
    CacheKey::new(URL_CACHE_TAG | (part3 << 32) | part1, part2)
}

fn geo_point_cache_key(location: &GeoPointLocation) -> CacheKey {
    let zoom_scale =
        ((location.zoom.cast_unsigned() & 0x0F) << 8) | (location.scale.cast_unsigned() & 0x0F);
    let width_height = ((location.width.cast_unsigned() & 0xFFFF) << 16)
        | (location.height.cast_unsigned() & 0xFFFF);
    CacheKey::new(
        GEO_POINT_CACHE_TAG | (u64::from(zoom_scale) << 32) | u64::from(width_height),
        location.packed_coordinates(),
    )
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "test"
)]
mod tests {
    use {
        super::*,
        crate::location::{StorageFileType, StorageLocationKind},
    };

    fn document() -> StorageFileLocation {
        StorageFileLocation::new(
            2,
            StorageLocationKind::Document {
                id: 99,
                access_hash: 5,
                size_letter: 0,
            },
            b"reference".to_vec(),
        )
    }

    fn geo() -> GeoPointLocation {
        GeoPointLocation {
            lat: 55.75,
            lon: -37.5,
            access: 12,
            width: 320,
            height: 240,
            zoom: 15,
            scale: 2,
        }
    }

    #[test]
    fn non_storage_variants_round_trip() {
        let locations = [
            DownloadLocation::Web(WebFileLocation {
                url: b"https://example.com/a.png".to_vec(),
                access_hash: 77,
            }),
            DownloadLocation::Geo(geo()),
            DownloadLocation::Url(PlainUrlLocation {
                url: "https://example.com/ü".into(),
            }),
            DownloadLocation::InMemory(InMemoryLocation {
                bytes: vec![1, 2, 3],
            }),
        ];
        for location in locations {
            let bytes = location.serialize();
            assert_eq!(bytes.len(), location.serialize_size());
            assert_eq!(bytes.get(..3), Some(&[0, 0, 0x10][..]));
            assert_eq!(DownloadLocation::from_serialized(&bytes).unwrap(), location);
        }
    }

    #[test]
    fn storage_variant_uses_storage_encoding() {
        let location = DownloadLocation::from(document());
        let bytes = location.serialize();
        assert_eq!(bytes, document().serialize());
        let parsed = DownloadLocation::from_serialized(&bytes).unwrap();
        assert_eq!(parsed, location);
        assert_eq!(parsed.file_reference(), b"reference");
        assert_eq!(parsed.cache_key(), CacheKey::new(0x102, 99));
        assert_eq!(
            parsed.in_memory_key(),
            InMemoryKey::new(0x102, 99)
        );
        assert!(parsed.big_file_base_cache_key().is_some());
    }

    #[test]
    fn empty_input_is_invalid_storage() {
        let parsed = DownloadLocation::from_serialized(&[]).unwrap();
        assert!(!parsed.valid());
        assert!(parsed.cache_key().is_empty());
        assert!(parsed.serialize().is_empty());
    }

    #[test]
    fn malformed_non_storage() {
        assert_eq!(DownloadLocation::from_serialized(&[0, 0, 0x10]), None);
        assert_eq!(DownloadLocation::from_serialized(&[0, 0, 0x10, 9]), None);
        assert_eq!(
            DownloadLocation::from_serialized(&[0, 0, 0x10, 0, 0, 0, 0, 5, 1]),
            None
        );
    }

    #[test]
    fn invalid_non_storage_serializes_to_nothing() {
        let web = DownloadLocation::Web(WebFileLocation::default());
        assert!(!web.valid());
        assert!(web.serialize().is_empty());
        assert!(web.cache_key().is_empty());

        let url = DownloadLocation::Url(PlainUrlLocation::default());
        assert!(url.serialize().is_empty());
        assert_eq!(url.serialize_size(), 0);
    }

    #[test]
    fn geo_keys() {
        let location = DownloadLocation::Geo(geo());
        let lat = ((55.75_f64 + 360.0) * 1_000_000.0).round() as u64;
        let lon = ((-37.5_f64 + 360.0) * 1_000_000.0).round() as u64;
        assert_eq!(
            location.cache_key(),
            CacheKey::new(
                0x0000_0400_0000_0000 | (((15 << 8) | 2) << 32) | ((320 << 16) | 240),
                (lat << 32) | lon,
            )
        );
        assert_eq!(
            location.in_memory_key(),
            InMemoryKey::new((lat << 32) | lon, (320 << 32) | 240)
        );
        assert!(location.big_file_base_cache_key().is_none());
    }

    #[test]
    fn web_and_url_keys_are_tagged() {
        let web = DownloadLocation::Web(WebFileLocation {
            url: b"https://example.com".to_vec(),
            access_hash: 1,
        });
        let key = web.cache_key();
        assert_eq!(key.high >> 40, 0x02);
        assert_eq!((key.high >> 32) & 0xFF, 4);
        // Access hash does not participate.
        let other = DownloadLocation::Web(WebFileLocation {
            url: b"https://example.com".to_vec(),
            access_hash: 2,
        });
        assert_eq!(other.cache_key(), key);

        let url = DownloadLocation::Url(PlainUrlLocation {
            url: "https://example.com".into(),
        });
        let hash = Sha256::digest(b"https://example.com");
        // Hash bits 96..112 overlap the tag byte.
        let expected_high = 0x0000_0300_0000_0000
            | (u64::from(LE::read_u16(&hash[12..14])) << 32)
            | u64::from(LE::read_u32(&hash[..4]));
        assert_eq!(url.cache_key().high, expected_high);
        assert_eq!(url.cache_key().low, LE::read_u64(&hash[4..12]));
        assert_ne!(url.cache_key(), key);
        assert_ne!(url.in_memory_key(), web.in_memory_key());

        let memory = DownloadLocation::InMemory(InMemoryLocation { bytes: vec![1] });
        assert!(memory.cache_key().is_empty());
        assert_ne!(memory.in_memory_key(), InMemoryKey::default());
    }

    #[test]
    fn modern_conversion_only_touches_legacy_storage() {
        let legacy = DownloadLocation::from(StorageFileLocation::new(
            1,
            StorageLocationKind::Legacy {
                volume_id: 3,
                local_id: 4,
                secret: 5,
            },
            Vec::new(),
        ));
        assert!(legacy.is_legacy());
        let converted = legacy.convert_to_modern(ModernLocationType::StickerSetThumb, 8, 9);
        assert_eq!(
            converted.storage().map(StorageFileLocation::file_type),
            Some(StorageFileType::StickerSetThumb)
        );

        let geo = DownloadLocation::Geo(geo());
        assert_eq!(
            geo.convert_to_modern(ModernLocationType::PeerPhoto, 8, 9),
            geo
        );
    }

    #[test]
    fn refresh_only_applies_to_storage() {
        let mut location = DownloadLocation::from(document());
        assert!(location.refresh_file_reference(b"new"));
        assert_eq!(location.file_reference(), b"new");

        let mut memory = DownloadLocation::InMemory(InMemoryLocation { bytes: vec![1] });
        assert!(!memory.refresh_file_reference(b"new"));
        assert!(memory.file_reference().is_empty());
    }
}
