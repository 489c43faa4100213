use {
    super::{
        DIGEST_LEN, FileKey, HEADER_LEN, MAGIC, RecordSuffix, finish_digest, name::remove_if_exists,
        record_path,
    },
    crate::crypto::{EncryptedDescriptor, encrypt_local},
    cadd::prelude::IntoType,
    fs_err as fs,
    md5::{Digest, Md5},
    std::{
        io::{self, Write},
        num::TryFromIntError,
        path::PathBuf,
    },
    tdstore_protocol::{DataStream, LocalKey},
    tempfile::NamedTempFile,
    tracing::{error, warn},
};

const FRAME_LEN: usize = HEADER_LEN + DIGEST_LEN;

/// Durability reached by a finished write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The safe copy holds the new contents.
    Committed,
    /// The safe copy does not hold the new contents. Either the primary copy
    /// holds them and the stale safe copy was removed, or writing the primary
    /// copy failed after it was opened and the previous copies were kept.
    Degraded,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("could not open {path:?} for writing")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("payload of {len} bytes does not fit the size field")]
    TooLarge {
        len: usize,
        #[source]
        source: TryFromIntError,
    },
}

/// Attempt states of [`FileWriteDescriptor::finish`].
#[derive(Debug)]
enum CommitStage {
    SafeCommit,
    PlainPrimaryWrite,
    HardFailure(WriteError),
}

/// Builder of one record. Nothing touches the disk until [`finish`](Self::finish).
#[derive(Debug)]
#[must_use = "the record is written by `finish`"]
pub struct FileWriteDescriptor {
    base: PathBuf,
    name: String,
    version: i32,
    payload: DataStream,
    digest: Md5,
}

impl FileWriteDescriptor {
    #[inline]
    pub fn new(base: impl Into<PathBuf>, name: impl Into<String>, app_version: i32) -> Self {
        Self {
            base: base.into(),
            name: name.into(),
            version: app_version,
            payload: DataStream::new(),
            digest: Md5::new(),
        }
    }

    #[inline]
    pub fn for_key(base: impl Into<PathBuf>, key: FileKey, app_version: i32) -> Self {
        Self::new(base, key.to_file_part(), app_version)
    }

    #[must_use]
    #[inline]
    pub fn path(&self, suffix: RecordSuffix) -> PathBuf {
        record_path(&self.base, &self.name, suffix)
    }

    /// Appends a field. `None` is written as a null field.
    #[inline]
    pub fn write_data(&mut self, data: Option<&[u8]>) -> &mut Self {
        let start = self.payload.len();
        self.payload.write_byte_array(data);
        self.digest
            .update(self.payload.as_slice().get(start..).unwrap_or_default());
        self
    }

    #[inline]
    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.write_data(Some(data))
    }

    /// Appends the encrypted descriptor as one field.
    #[inline]
    pub fn write_encrypted(&mut self, descriptor: EncryptedDescriptor, key: &LocalKey) -> &mut Self {
        let encrypted = encrypt_local(descriptor, key);
        self.write_data(Some(&encrypted))
    }

    /// Writes the record, replacing any previous version.
    ///
    /// The safe copy is committed atomically when possible. Otherwise the
    /// contents go to the primary copy, which is then renamed over the safe
    /// one. A failed rename, or a failed write after the primary copy was
    /// opened, is reported as [`WriteOutcome::Degraded`]. Only a failure to
    /// open the primary copy is an error, besides a payload too large for the
    /// format.
    #[inline]
    pub fn finish(self) -> Result<WriteOutcome, WriteError> {
        let contents = self
            .contents()
            .inspect_err(|err| error!(%err, name = %self.name, "record was not written"))?;
        let mut stage = CommitStage::SafeCommit;
        loop {
            stage = match stage {
                CommitStage::SafeCommit => match self.commit_safe(&contents) {
                    Ok(()) => {
                        remove_if_exists(&self.path(RecordSuffix::Primary));
                        remove_if_exists(&self.path(RecordSuffix::Backup));
                        return Ok(WriteOutcome::Committed);
                    }
                    Err(err) => {
                        warn!(
                            ?err,
                            path = %self.path(RecordSuffix::Safe).display(),
                            "could not commit safe record copy",
                        );
                        CommitStage::PlainPrimaryWrite
                    }
                },
                CommitStage::PlainPrimaryWrite => match self.write_primary(&contents) {
                    Ok(outcome) => return Ok(outcome),
                    Err(err) => CommitStage::HardFailure(err),
                },
                CommitStage::HardFailure(err) => {
                    error!(%err, "record was not written");
                    return Err(err);
                }
            };
        }
    }

    fn contents(&self) -> Result<Vec<u8>, WriteError> {
        let payload = self.payload.as_slice();
        let digest = finish_digest(
            self.digest.clone(),
            payload_size(payload.len())?,
            self.version,
        );
        let mut contents = Vec::with_capacity(payload.len().saturating_add(FRAME_LEN));
        contents.extend_from_slice(MAGIC);
        contents.extend_from_slice(&self.version.to_le_bytes());
        contents.extend_from_slice(payload);
        contents.extend_from_slice(&digest);
        Ok(contents)
    }

    fn commit_safe(&self, contents: &[u8]) -> io::Result<()> {
        let mut file = NamedTempFile::new_in(&self.base)?;
        file.write_all(contents)?;
        file.flush()?;
        file.as_file().sync_all()?;
        file.persist(self.path(RecordSuffix::Safe))?;
        Ok(())
    }

    fn write_primary(&self, contents: &[u8]) -> Result<WriteOutcome, WriteError> {
        let primary = self.path(RecordSuffix::Primary);
        let mut file = fs::File::create(&primary).map_err(|source| WriteError::Open {
            path: primary.clone(),
            source,
        })?;
        if let Err(err) = file.write_all(contents).and_then(|()| file.sync_all()) {
            // The previous copies may be the only readable ones, keep them.
            warn!(
                ?err,
                path = %primary.display(),
                "could not write primary record copy",
            );
            return Ok(WriteOutcome::Degraded);
        }
        drop(file);

        remove_if_exists(&self.path(RecordSuffix::Backup));
        let safe = self.path(RecordSuffix::Safe);
        match fs::rename(&primary, &safe) {
            Ok(()) => Ok(WriteOutcome::Committed),
            Err(err) => {
                remove_if_exists(&safe);
                warn!(
                    ?err,
                    from = %primary.display(),
                    to = %safe.display(),
                    "could not rename record copy, keeping the primary one",
                );
                Ok(WriteOutcome::Degraded)
            }
        }
    }
}

/// Payload size as stored in the digest.
fn payload_size(len: usize) -> Result<i32, WriteError> {
    len.try_into_type::<i32>()
        .map_err(|source| WriteError::TooLarge { len, source })
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "test"
)]
mod tests {
    use {
        super::*,
        crate::record::{read_file, record_digest},
        tempfile::TempDir,
    };

    const VERSION: i32 = 4_000_001;

    #[test]
    fn file_layout() {
        let dir = TempDir::new().unwrap();
        let mut writer = FileWriteDescriptor::new(dir.path(), "settings", VERSION);
        writer.write_bytes(b"ab").write_data(None);
        assert_eq!(writer.finish().unwrap(), WriteOutcome::Committed);

        let bytes = fs::read(dir.path().join("settingss")).unwrap();
        let payload = [0, 0, 0, 2, b'a', b'b', 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(&bytes[..4], b"TDF$");
        assert_eq!(&bytes[4..8], &VERSION.to_le_bytes());
        assert_eq!(&bytes[8..18], &payload);
        assert_eq!(&bytes[18..], &record_digest(&payload, VERSION).unwrap());
        assert!(!dir.path().join("settings0").exists());
    }

    #[test]
    fn commit_removes_plain_copies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k0"), b"old").unwrap();
        fs::write(dir.path().join("k1"), b"older").unwrap();

        let mut writer = FileWriteDescriptor::new(dir.path(), "k", VERSION);
        writer.write_bytes(b"new");
        assert_eq!(writer.finish().unwrap(), WriteOutcome::Committed);
        assert!(dir.path().join("ks").exists());
        assert!(!dir.path().join("k0").exists());
        assert!(!dir.path().join("k1").exists());
    }

    #[test]
    fn degraded_write_leaves_readable_primary() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the safe copy makes both renames fail.
        fs::create_dir(dir.path().join("ks")).unwrap();
        fs::write(dir.path().join("k1"), b"stale").unwrap();

        let mut writer = FileWriteDescriptor::new(dir.path(), "k", VERSION);
        writer.write_bytes(b"value");
        assert_eq!(writer.finish().unwrap(), WriteOutcome::Degraded);
        assert!(dir.path().join("k0").exists());
        assert!(!dir.path().join("k1").exists());

        let read = read_file(dir.path(), "k", VERSION).unwrap();
        assert_eq!(read.stream().read_bytes().unwrap(), b"value");
    }

    #[test]
    fn plain_write_renamed_over_safe_copy() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ks"), b"stale").unwrap();
        fs::write(dir.path().join("k1"), b"older").unwrap();

        let mut writer = FileWriteDescriptor::new(dir.path(), "k", VERSION);
        writer.write_bytes(b"value");
        let contents = writer.contents().unwrap();
        assert_eq!(
            writer.write_primary(&contents).unwrap(),
            WriteOutcome::Committed
        );
        assert_eq!(fs::read(dir.path().join("ks")).unwrap(), contents);
        assert!(!dir.path().join("k0").exists());
        assert!(!dir.path().join("k1").exists());

        let read = read_file(dir.path(), "k", VERSION).unwrap();
        assert_eq!(read.stream().read_bytes().unwrap(), b"value");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_primary_write_keeps_previous_copies() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("ks")).unwrap();
        let mut previous = FileWriteDescriptor::new(dir.path(), "k", VERSION);
        previous.write_bytes(b"previous");
        let previous = previous.contents().unwrap();
        fs::write(dir.path().join("k1"), &previous).unwrap();
        // Opens fine, every write fails with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", dir.path().join("k0")).unwrap();

        let mut writer = FileWriteDescriptor::new(dir.path(), "k", VERSION);
        writer.write_bytes(b"value");
        assert_eq!(writer.finish().unwrap(), WriteOutcome::Degraded);
        assert!(dir.path().join("ks").is_dir());
        assert_eq!(fs::read(dir.path().join("k1")).unwrap(), previous);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let max = usize::try_from(i32::MAX).unwrap();
        assert_eq!(payload_size(max).unwrap(), i32::MAX);
        assert!(matches!(
            payload_size(max + 1),
            Err(WriteError::TooLarge { len, .. }) if len == max + 1
        ));
    }

    #[test]
    fn missing_directory_is_a_hard_failure() {
        let dir = TempDir::new().unwrap();
        let mut writer = FileWriteDescriptor::new(dir.path().join("missing"), "k", VERSION);
        writer.write_bytes(b"value");
        let err = writer.finish().unwrap_err();
        assert!(matches!(err, WriteError::Open { .. }));
    }
}
