use {
    super::{
        DIGEST_LEN, HEADER_LEN, MAGIC, RecordSuffix, name::remove_if_exists, record_digest,
        record_path,
    },
    crate::crypto::{DecryptError, decrypt_local},
    anyhow::{Result, bail, ensure},
    byteorder::{ByteOrder, LE},
    fs_err as fs,
    std::{
        io::Read,
        path::{Path, PathBuf},
        time::SystemTime,
    },
    tdstore_protocol::{DataReader, LocalKey},
    tracing::{debug, warn},
};

/// Contents of a successfully verified record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReadDescriptor {
    version: i32,
    data: Vec<u8>,
    offset: usize,
}

impl FileReadDescriptor {
    /// Application version that wrote the record.
    #[must_use]
    #[inline]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Raw bytes, starting with the size field for decrypted records.
    #[must_use]
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Reader positioned at the first field.
    #[must_use]
    #[inline]
    pub fn stream(&self) -> DataReader<'_> {
        DataReader::at(&self.data, self.offset)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("no readable copy of the record")]
    NotFound,
    #[error("malformed record field: {0:#}")]
    Stream(anyhow::Error),
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

/// Reads the freshest valid copy of the record `name` under `base`.
///
/// Copies written by a newer application version, truncated or with a bad
/// digest are skipped. After a successful read the other copies are removed,
/// except those written by a newer application version.
#[must_use]
#[inline]
pub fn read_file(base: &Path, name: &str, app_version: i32) -> Option<FileReadDescriptor> {
    let candidates = candidates(base, name);
    let (index, descriptor) =
        candidates
            .iter()
            .enumerate()
            .find_map(|(index, path)| match read_candidate(path, app_version) {
                Ok(descriptor) => Some((index, descriptor)),
                Err(err) => {
                    debug!(path = %path.display(), "skipping record copy: {err:#}");
                    None
                }
            })?;
    for (_, other) in candidates.iter().enumerate().filter(|(i, _)| *i != index) {
        if written_by_newer_version(other, app_version) {
            debug!(path = %other.display(), "keeping record copy of a newer version");
        } else {
            remove_if_exists(other);
        }
    }
    Some(descriptor)
}

/// Reads a record whose single field is an encrypted block and decrypts it.
///
/// The returned descriptor reads the decrypted fields.
#[inline]
pub fn read_encrypted_file(
    base: &Path,
    name: &str,
    key: &LocalKey,
    app_version: i32,
) -> Result<FileReadDescriptor, ReadError> {
    let plain = read_file(base, name, app_version).ok_or(ReadError::NotFound)?;
    let encrypted = plain.stream().read_bytes().map_err(ReadError::Stream)?;
    let decrypted = decrypt_local(&encrypted, key).inspect_err(|err| {
        warn!(%err, name, "could not decrypt record");
    })?;
    let (data, offset) = decrypted.into_parts();
    Ok(FileReadDescriptor {
        version: plain.version,
        data,
        offset,
    })
}

/// Existing copies in the order they are tried: the safe copy, then the
/// plain copies from the most recently modified.
fn candidates(base: &Path, name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(RecordSuffix::ALL.len());
    let safe = record_path(base, name, RecordSuffix::Safe);
    if safe.exists() {
        candidates.push(safe);
    }

    let primary = record_path(base, name, RecordSuffix::Primary);
    let backup = record_path(base, name, RecordSuffix::Backup);
    match (modified(&primary), modified(&backup)) {
        (Some(primary_time), Some(backup_time)) => {
            if backup_time > primary_time {
                candidates.extend([backup, primary]);
            } else {
                candidates.extend([primary, backup]);
            }
        }
        (Some(_), None) => candidates.push(primary),
        (None, Some(_)) => candidates.push(backup),
        (None, None) => {}
    }
    candidates
}

fn modified(path: &Path) -> Option<SystemTime> {
    let metadata = fs::metadata(path).ok()?;
    Some(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH))
}

fn written_by_newer_version(path: &Path, app_version: i32) -> bool {
    let mut header = [0; HEADER_LEN];
    if fs::File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .is_err()
    {
        return false;
    }
    let (magic, version) = header.split_at(MAGIC.len());
    magic == MAGIC && LE::read_i32(version) > app_version
}

fn read_candidate(path: &Path, app_version: i32) -> Result<FileReadDescriptor> {
    let bytes = fs::read(path)?;
    ensure!(
        bytes.len() >= HEADER_LEN,
        "could not read magic and version"
    );
    let (header, body) = bytes.split_at(HEADER_LEN);
    let (magic, version) = header.split_at(MAGIC.len());
    ensure!(magic == MAGIC, "bad magic {magic:?}");
    let version = LE::read_i32(version);
    ensure!(
        version <= app_version,
        "version too big {version}, my version {app_version}"
    );
    let Some(payload_len) = body.len().checked_sub(DIGEST_LEN) else {
        bail!("could not read digest part");
    };
    let (payload, digest) = body.split_at(payload_len);
    ensure!(
        record_digest(payload, version).is_some_and(|expected| expected == digest),
        "digest did not match"
    );
    Ok(FileReadDescriptor {
        version,
        data: payload.to_vec(),
        offset: 0,
    })
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
        crate::{crypto::EncryptedDescriptor, record::FileWriteDescriptor},
        std::{fs::FileTimes, time::Duration},
        tempfile::TempDir,
    };

    const VERSION: i32 = 5_001_000;

    fn write(base: &Path, name: &str, version: i32, value: &[u8]) {
        let mut writer = FileWriteDescriptor::new(base, name, version);
        writer.write_bytes(value);
        writer.finish().unwrap();
    }

    /// Builds a complete file body by hand, bypassing the writer.
    fn raw_file(version: i32, value: &[u8]) -> Vec<u8> {
        let mut payload = u32::try_from(value.len()).unwrap().to_be_bytes().to_vec();
        payload.extend_from_slice(value);
        let mut file = MAGIC.to_vec();
        file.extend_from_slice(&version.to_le_bytes());
        file.extend_from_slice(&payload);
        file.extend_from_slice(&record_digest(&payload, version).unwrap());
        file
    }

    fn value(descriptor: &FileReadDescriptor) -> Vec<u8> {
        descriptor.stream().read_bytes().unwrap()
    }

    #[test]
    fn missing_record() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_file(dir.path(), "nothing", VERSION), None);
    }

    #[test]
    fn written_record_reads_back() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "map", VERSION - 1, b"value");
        let read = read_file(dir.path(), "map", VERSION).unwrap();
        assert_eq!(read.version(), VERSION - 1);
        assert_eq!(value(&read), b"value");
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "map", VERSION + 1, b"value");
        assert_eq!(read_file(dir.path(), "map", VERSION), None);
        assert!(read_file(dir.path(), "map", VERSION + 1).is_some());
    }

    #[test]
    fn corrupted_safe_copy_falls_back_to_primary() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "map", VERSION, b"fresh");
        let safe = dir.path().join("maps");
        let mut bytes = fs::read(&safe).unwrap();
        bytes[10] ^= 0x40;
        fs::write(&safe, bytes).unwrap();
        fs::write(dir.path().join("map0"), raw_file(VERSION, b"primary")).unwrap();

        let read = read_file(dir.path(), "map", VERSION).unwrap();
        assert_eq!(value(&read), b"primary");
        assert!(!safe.exists());
        assert!(dir.path().join("map0").exists());
    }

    #[test]
    fn newer_safe_copy_survives_fallback() {
        let dir = TempDir::new().unwrap();
        let safe = dir.path().join("maps");
        fs::write(&safe, raw_file(VERSION + 5, b"newer")).unwrap();
        fs::write(dir.path().join("map0"), raw_file(VERSION, b"old")).unwrap();
        fs::write(dir.path().join("map1"), b"TDF$").unwrap();

        let read = read_file(dir.path(), "map", VERSION).unwrap();
        assert_eq!(value(&read), b"old");
        assert_eq!(fs::read(&safe).unwrap(), raw_file(VERSION + 5, b"newer"));
        assert!(!dir.path().join("map1").exists());

        let read = read_file(dir.path(), "map", VERSION + 5).unwrap();
        assert_eq!(value(&read), b"newer");
        assert!(!dir.path().join("map0").exists());
    }

    #[test]
    fn every_copy_corrupted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("maps"), b"TDF$").unwrap();
        fs::write(dir.path().join("map0"), b"XXXX\0\0\0\0").unwrap();
        let mut truncated = raw_file(VERSION, b"value");
        truncated.truncate(truncated.len() - 1);
        fs::write(dir.path().join("map1"), truncated).unwrap();

        assert_eq!(read_file(dir.path(), "map", VERSION), None);
        // Nothing is removed when no copy verifies.
        assert!(dir.path().join("maps").exists());
        assert!(dir.path().join("map1").exists());
    }

    #[test]
    fn newest_plain_copy_wins() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("map0");
        let backup = dir.path().join("map1");
        fs::write(&primary, raw_file(VERSION, b"old")).unwrap();
        fs::write(&backup, raw_file(VERSION, b"new")).unwrap();
        let base_time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        std::fs::File::options()
            .write(true)
            .open(&primary)
            .unwrap()
            .set_times(FileTimes::new().set_modified(base_time))
            .unwrap();
        std::fs::File::options()
            .write(true)
            .open(&backup)
            .unwrap()
            .set_times(FileTimes::new().set_modified(base_time + Duration::from_secs(60)))
            .unwrap();

        let read = read_file(dir.path(), "map", VERSION).unwrap();
        assert_eq!(value(&read), b"new");
        assert!(!primary.exists());
    }

    #[test]
    fn second_write_prunes_plain_copies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("map1"), raw_file(VERSION, b"old")).unwrap();
        write(dir.path(), "map", VERSION, b"new");
        assert!(!dir.path().join("map1").exists());
        assert_eq!(value(&read_file(dir.path(), "map", VERSION).unwrap()), b"new");
    }

    #[test]
    fn encrypted_record() {
        let dir = TempDir::new().unwrap();
        let key = LocalKey::generate();
        let mut descriptor = EncryptedDescriptor::new();
        descriptor
            .stream()
            .write_byte_array(Some(b"alpha".as_slice()))
            .write_byte_array(Some(b"".as_slice()))
            .write_byte_array(None);
        let mut writer = FileWriteDescriptor::new(dir.path(), "secret", VERSION);
        writer.write_encrypted(descriptor, &key);
        writer.finish().unwrap();

        let read = read_encrypted_file(dir.path(), "secret", &key, VERSION).unwrap();
        assert_eq!(read.version(), VERSION);
        let mut stream = read.stream();
        assert_eq!(stream.read_byte_array().unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(stream.read_byte_array().unwrap(), Some(Vec::new()));
        assert_eq!(stream.read_byte_array().unwrap(), None);
        assert!(stream.at_end());

        let err = read_encrypted_file(dir.path(), "secret", &LocalKey::generate(), VERSION)
            .unwrap_err();
        assert!(matches!(err, ReadError::Decrypt(DecryptError::WrongKey)));
    }

    #[test]
    fn encrypted_read_errors() {
        let dir = TempDir::new().unwrap();
        let key = LocalKey::generate();
        assert!(matches!(
            read_encrypted_file(dir.path(), "secret", &key, VERSION),
            Err(ReadError::NotFound)
        ));

        write(dir.path(), "secret", VERSION, b"short");
        assert!(matches!(
            read_encrypted_file(dir.path(), "secret", &key, VERSION),
            Err(ReadError::Decrypt(DecryptError::BadSize(5)))
        ));

        FileWriteDescriptor::new(dir.path(), "empty", VERSION)
            .finish()
            .unwrap();
        assert!(matches!(
            read_encrypted_file(dir.path(), "empty", &key, VERSION),
            Err(ReadError::Stream(_))
        ));
    }
}
