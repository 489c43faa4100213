pub mod credentials;
pub mod location;
pub mod stream;

pub use crate::{
    credentials::{LOCAL_KEY_SIZE, LocalKey, Passcode},
    location::{
        DownloadLocation, FileLocationId, FileReferenceUpdates, GeoPointLocation, ImageLocation,
        InMemoryLocation, ModernLocationType, PlainUrlLocation, StorageFileLocation,
        StorageFileType, StorageImageLocation, StorageLocationKind, WebFileLocation,
    },
    stream::{DataReader, DataStream},
};
use {
    derive_more::{From, Into},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Key of a blob in the media cache database.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    From,
    Into,
)]
pub struct CacheKey {
    pub high: u64,
    pub low: u64,
}

impl CacheKey {
    #[must_use]
    #[inline]
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.high == 0 && self.low == 0
    }
}

impl fmt::Display for CacheKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}:{:016X}", self.high, self.low)
    }
}

/// Key of a decoded image in the in-process image cache.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    From,
    Into,
)]
pub struct InMemoryKey {
    pub high: u64,
    pub low: u64,
}

impl InMemoryKey {
    #[must_use]
    #[inline]
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }
}

impl From<CacheKey> for InMemoryKey {
    #[inline]
    fn from(value: CacheKey) -> Self {
        Self::new(value.high, value.low)
    }
}
