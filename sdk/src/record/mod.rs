//! Durable `TDF$` records.
//!
//! A logical record is stored in up to three sibling files named after the
//! record with a one-character suffix (see [`RecordSuffix`]). Each file has
//! the following form:
//!
//! - magic `TDF$`
//! - version (32 bits, little endian) - application version that wrote the file
//! - payload - a sequence of length-prefixed fields
//! - MD5 digest (128 bits) of the payload, the payload size (32 bits, little
//!   endian), the version and the magic
//!
//! Writers replace the safe copy atomically when the platform allows it and
//! fall back to a plain copy otherwise. Readers try the copies in order of
//! preference and remove the redundant ones after a successful read.

mod name;
mod read;
mod store;
mod write;

pub use {
    name::{
        FileKey, clear_key, clear_name, compose_data_name, data_name_key, generate_key,
        key_already_used,
    },
    read::{FileReadDescriptor, ReadError, read_encrypted_file, read_file},
    store::RecordStore,
    write::{FileWriteDescriptor, WriteError, WriteOutcome},
};
use {
    cadd::prelude::IntoType,
    md5::{Digest, Md5},
    std::{
        fmt,
        path::{Path, PathBuf},
    },
};

pub const MAGIC: &[u8; 4] = b"TDF$";
const HEADER_LEN: usize = 8;
const DIGEST_LEN: usize = 16;

/// Suffix that selects one of the sibling files of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSuffix {
    /// Atomically replaced copy, preferred by readers.
    Safe,
    /// Plain copy written when the safe copy cannot be committed.
    Primary,
    /// Older plain copy.
    Backup,
}

impl RecordSuffix {
    pub const ALL: [Self; 3] = [Self::Safe, Self::Primary, Self::Backup];

    #[must_use]
    #[inline]
    pub const fn as_char(self) -> char {
        match self {
            Self::Safe => 's',
            Self::Primary => '0',
            Self::Backup => '1',
        }
    }
}

impl fmt::Display for RecordSuffix {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Path of one sibling file of the record `name` under `base`.
#[must_use]
#[inline]
pub fn record_path(base: &Path, name: &str, suffix: RecordSuffix) -> PathBuf {
    base.join(format!("{name}{suffix}"))
}

/// Completes a digest already fed with `payload_len` bytes of payload.
fn finish_digest(hasher: Md5, payload_len: i32, version: i32) -> [u8; DIGEST_LEN] {
    hasher
        .chain_update(payload_len.to_le_bytes())
        .chain_update(version.to_le_bytes())
        .chain_update(MAGIC)
        .finalize()
        .into()
}

/// Digest stored after the payload. `None` if the payload size does not fit
/// the signed 32-bit size field.
fn record_digest(payload: &[u8], version: i32) -> Option<[u8; DIGEST_LEN]> {
    let payload_len = payload.len().try_into_type::<i32>().ok()?;
    Some(finish_digest(
        Md5::new().chain_update(payload),
        payload_len,
        version,
    ))
}
