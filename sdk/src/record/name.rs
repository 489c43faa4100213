use {
    super::{RecordSuffix, record_path},
    derive_more::{From, Into},
    fs_err as fs,
    md5::{Digest, Md5},
    std::{fmt, io, path::Path},
    tracing::warn,
};

/// 64-bit identifier of a record, rendered into its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
pub struct FileKey(pub u64);

impl FileKey {
    /// 16 hex digits, least significant nibble first.
    #[must_use]
    #[inline]
    pub fn to_file_part(self) -> String {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        self.0
            .to_le_bytes()
            .into_iter()
            .flat_map(|byte| [byte & 0x0F, byte >> 4])
            .map(|nibble| char::from(DIGITS.get(usize::from(nibble)).copied().unwrap_or(b'0')))
            .collect()
    }
}

impl fmt::Display for FileKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_file_part())
    }
}

/// Key of the per-account directory derived from a data name.
#[must_use]
#[inline]
pub fn data_name_key(data_name: &str) -> FileKey {
    let hash = Md5::digest(data_name.as_bytes());
    FileKey(u64::from_le_bytes(
        hash.first_chunk::<8>().copied().unwrap_or_default(),
    ))
}

/// Data name of the account slot `index`: `data`, `data#2`, `data#3`...
#[must_use]
#[inline]
pub fn compose_data_name(data_name: &str, index: usize) -> String {
    let mut result = data_name.replace('#', "");
    if index > 0 {
        result.push('#');
        result.push_str(&index.saturating_add(1).to_string());
    }
    result
}

/// Whether any sibling file of the record `file_part` exists.
#[must_use]
#[inline]
pub fn key_already_used(base: &Path, file_part: &str) -> bool {
    RecordSuffix::ALL
        .into_iter()
        .any(|suffix| record_path(base, file_part, suffix).exists())
}

/// Picks a random non-zero key with no files under `base`.
#[must_use]
#[inline]
pub fn generate_key(base: &Path) -> FileKey {
    loop {
        let key = FileKey(rand::random());
        if key.0 != 0 && !key_already_used(base, &key.to_file_part()) {
            return key;
        }
    }
}

#[inline]
pub fn clear_key(base: &Path, key: FileKey) {
    clear_name(base, &key.to_file_part());
}

/// Removes every sibling file of the record. Missing files are ignored.
#[inline]
pub fn clear_name(base: &Path, name: &str) {
    for suffix in RecordSuffix::ALL {
        remove_if_exists(&record_path(base, name, suffix));
    }
}

pub(super) fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(?err, "failed to remove record file"),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {super::*, tempfile::TempDir};

    #[test]
    fn file_part_is_low_nibble_first() {
        assert_eq!(FileKey(0).to_file_part(), "0000000000000000");
        assert_eq!(FileKey(0x1).to_file_part(), "1000000000000000");
        assert_eq!(
            FileKey(0x0123_4567_89AB_CDEF).to_file_part(),
            "FEDCBA9876543210"
        );
        assert_eq!(FileKey(0xA).to_string(), "A000000000000000");
    }

    #[test]
    fn data_names() {
        assert_eq!(compose_data_name("data", 0), "data");
        assert_eq!(compose_data_name("data", 1), "data#2");
        assert_eq!(compose_data_name("da#ta", 2), "data#3");
    }

    #[test]
    fn data_name_key_is_md5_prefix() {
        // MD5("data") = 8d777f385d3dfec8815d20f7496026dc
        assert_eq!(data_name_key("data"), FileKey(0xC8FE_3D5D_387F_778D));
        assert_eq!(data_name_key("data").to_file_part(), "D877F783D5D3EF8C");
    }

    #[test]
    fn generate_and_clear() {
        let dir = TempDir::new().unwrap();
        let key = generate_key(dir.path());
        assert_ne!(key.0, 0);
        assert!(!key_already_used(dir.path(), &key.to_file_part()));

        let part = key.to_file_part();
        fs::write(record_path(dir.path(), &part, RecordSuffix::Backup), b"x").unwrap();
        assert!(key_already_used(dir.path(), &part));
        assert_ne!(generate_key(dir.path()), key);

        clear_key(dir.path(), key);
        assert!(!key_already_used(dir.path(), &part));
        // Clearing again is a no-op.
        clear_key(dir.path(), key);
    }
}
