use {
    super::{
        FileKey, FileReadDescriptor, FileWriteDescriptor, ReadError, RecordSuffix, clear_key,
        clear_name, generate_key, key_already_used, read_encrypted_file, read_file, record_path,
    },
    fs_err as fs,
    std::{
        io,
        path::{Path, PathBuf},
    },
    tdstore_protocol::LocalKey,
};

/// Directory of records written by one application version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStore {
    base: PathBuf,
    app_version: i32,
}

impl RecordStore {
    /// Store over an existing directory.
    #[must_use]
    #[inline]
    pub fn new(base: impl Into<PathBuf>, app_version: i32) -> Self {
        Self {
            base: base.into(),
            app_version,
        }
    }

    /// Store over `base`, creating the directory if needed.
    #[inline]
    pub fn open(base: impl Into<PathBuf>, app_version: i32) -> io::Result<Self> {
        let store = Self::new(base, app_version);
        fs::create_dir_all(&store.base)?;
        Ok(store)
    }

    #[must_use]
    #[inline]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    #[inline]
    pub fn app_version(&self) -> i32 {
        self.app_version
    }

    /// Nested store for a sub-directory, e.g. a per-account one.
    #[must_use]
    #[inline]
    pub fn child(&self, name: &str) -> Self {
        Self::new(self.base.join(name), self.app_version)
    }

    #[inline]
    pub fn writer(&self, name: &str) -> FileWriteDescriptor {
        FileWriteDescriptor::new(&self.base, name, self.app_version)
    }

    #[inline]
    pub fn writer_for_key(&self, key: FileKey) -> FileWriteDescriptor {
        FileWriteDescriptor::for_key(&self.base, key, self.app_version)
    }

    #[must_use]
    #[inline]
    pub fn read(&self, name: &str) -> Option<FileReadDescriptor> {
        read_file(&self.base, name, self.app_version)
    }

    #[must_use]
    #[inline]
    pub fn read_key(&self, key: FileKey) -> Option<FileReadDescriptor> {
        self.read(&key.to_file_part())
    }

    #[inline]
    pub fn read_encrypted(
        &self,
        name: &str,
        key: &LocalKey,
    ) -> Result<FileReadDescriptor, ReadError> {
        read_encrypted_file(&self.base, name, key, self.app_version)
    }

    #[inline]
    pub fn read_encrypted_key(
        &self,
        file: FileKey,
        key: &LocalKey,
    ) -> Result<FileReadDescriptor, ReadError> {
        self.read_encrypted(&file.to_file_part(), key)
    }

    /// Whether any copy of the record exists, valid or not.
    #[must_use]
    #[inline]
    pub fn exists(&self, name: &str) -> bool {
        key_already_used(&self.base, name)
    }

    #[must_use]
    #[inline]
    pub fn generate_key(&self) -> FileKey {
        generate_key(&self.base)
    }

    #[inline]
    pub fn clear_key(&self, key: FileKey) {
        clear_key(&self.base, key);
    }

    #[inline]
    pub fn clear_name(&self, name: &str) {
        clear_name(&self.base, name);
    }

    #[must_use]
    #[inline]
    pub fn path(&self, name: &str, suffix: RecordSuffix) -> PathBuf {
        record_path(&self.base, name, suffix)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {super::*, crate::crypto::EncryptedDescriptor, tempfile::TempDir};

    #[test]
    fn keyed_records() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path().join("tdata"), 3_000_000).unwrap();
        let key = store.generate_key();
        assert!(store.read_key(key).is_none());

        let mut writer = store.writer_for_key(key);
        writer.write_bytes(b"settings");
        writer.finish().unwrap();
        assert!(store.exists(&key.to_file_part()));
        assert!(store.path(&key.to_file_part(), RecordSuffix::Safe).exists());
        assert_eq!(
            store.read_key(key).unwrap().stream().read_bytes().unwrap(),
            b"settings"
        );

        store.clear_key(key);
        assert!(!store.exists(&key.to_file_part()));
        assert!(store.read_key(key).is_none());
    }

    #[test]
    fn encrypted_records_in_child_store() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), 3_000_000);
        let account = store.child("D877F783D5D3EF8C");
        fs::create_dir(account.base()).unwrap();

        let local_key = LocalKey::generate();
        let file = account.generate_key();
        let mut descriptor = EncryptedDescriptor::new();
        descriptor.stream().write_i32(7);
        let mut writer = account.writer_for_key(file);
        writer.write_encrypted(descriptor, &local_key);
        writer.finish().unwrap();

        let read = account.read_encrypted_key(file, &local_key).unwrap();
        assert_eq!(read.stream().read_i32().unwrap(), 7);
        assert!(store.read_key(file).is_none());

        // A newer reader accepts records from older versions.
        let newer = RecordStore::new(account.base(), account.app_version() + 1);
        assert!(newer.read_encrypted_key(file, &local_key).is_ok());
    }

    #[test]
    fn named_records() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), 1);
        let mut writer = store.writer("settings");
        writer.write_data(None);
        writer.finish().unwrap();
        assert_eq!(store.read("settings").unwrap().stream().read_byte_array().unwrap(), None);
        store.clear_name("settings");
        assert!(!store.exists("settings"));
    }
}
