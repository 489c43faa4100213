//! Identifiers of remote files and the cache keys derived from them.

mod download;
mod image;
mod storage;

pub use self::{
    download::{
        DownloadLocation, GeoPointLocation, InMemoryLocation, PlainUrlLocation, WebFileLocation,
    },
    image::{ImageLocation, SerializedLocation, SizedLocation, StorageImageLocation},
    storage::{
        ModernLocationType, StorageFileLocation, StorageFileType, StorageLocationKind,
        document_cache_key,
    },
};
use std::collections::HashMap;

/// Value in the type slot marking a serialized non-storage location.
pub const NON_STORAGE_LOCATION_TOKEN: u8 = 0x10;

/// Remote object whose file reference can be refreshed in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileLocationId {
    Document(u64),
    Photo(u64),
}

/// Fresh file references received from the server.
pub type FileReferenceUpdates = HashMap<FileLocationId, Vec<u8>>;
