//! Envelope that keeps the local key encrypted with a passcode-derived key.
//!
//! The `key_{data_name}` record holds three fields:
//!
//! - salt used to derive the passcode key
//! - the local key, encrypted with the passcode key
//! - the list of account indices, encrypted with the local key

use {
    crate::{
        crypto::{
            DecryptError, DecryptedDescriptor, EncryptedDescriptor, KdfAlgorithm,
            LOCAL_ENCRYPT_SALT_SIZE, decrypt_local, derive_key, encrypt_local, generate_salt,
        },
        record::{RecordStore, WriteError, WriteOutcome},
    },
    anyhow::{Result, ensure},
    std::mem::size_of,
    tdstore_protocol::{DataReader, LOCAL_KEY_SIZE, LocalKey, Passcode},
    tracing::{debug, warn},
};

pub const DEFAULT_DATA_NAME: &str = "data";
/// Number of account slots; stored indices must be below it.
pub const MAX_ACCOUNTS: i32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum KeyDataError {
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
    #[error("malformed key data: {0:#}")]
    Format(anyhow::Error),
}

/// Encrypted contents of the key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyData {
    salt: Vec<u8>,
    key_encrypted: Vec<u8>,
    info_encrypted: Vec<u8>,
}

/// Key record opened with the right passcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedKeyData {
    pub local_key: LocalKey,
    pub account_indices: Vec<i32>,
}

impl KeyData {
    #[must_use]
    #[inline]
    pub fn record_name(data_name: &str) -> String {
        format!("key_{data_name}")
    }

    /// Encrypts `local_key` under `passcode` with a fresh salt.
    #[must_use]
    #[inline]
    pub fn create(passcode: &Passcode, local_key: &LocalKey, account_indices: &[i32]) -> Self {
        let salt = generate_salt();
        let passcode_key = derive_key(passcode, &salt, KdfAlgorithm::Current);

        let mut key_descriptor = EncryptedDescriptor::with_capacity(LOCAL_KEY_SIZE);
        key_descriptor.stream().write_raw(local_key.as_bytes());

        let mut info_descriptor = EncryptedDescriptor::with_capacity(
            size_of::<i32>().saturating_mul(account_indices.len().saturating_add(1)),
        );
        #[expect(clippy::expect_used, reason = "format limit, caller bug")]
        let count = i32::try_from(account_indices.len()).expect("too many accounts");
        let stream = info_descriptor.stream();
        stream.write_i32(count);
        for index in account_indices {
            stream.write_i32(*index);
        }

        Self {
            salt: salt.to_vec(),
            key_encrypted: encrypt_local(key_descriptor, &passcode_key),
            info_encrypted: encrypt_local(info_descriptor, local_key),
        }
    }

    #[must_use]
    #[inline]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    #[inline]
    pub fn write(
        &self,
        store: &RecordStore,
        data_name: &str,
    ) -> Result<WriteOutcome, WriteError> {
        let mut writer = store.writer(&Self::record_name(data_name));
        writer
            .write_bytes(&self.salt)
            .write_bytes(&self.key_encrypted)
            .write_bytes(&self.info_encrypted);
        writer.finish()
    }

    /// Reads the key record. Returns `None` if no valid copy exists or its
    /// fields are truncated.
    #[must_use]
    #[inline]
    pub fn read(store: &RecordStore, data_name: &str) -> Option<Self> {
        let descriptor = store.read(&Self::record_name(data_name))?;
        match Self::read_fields(&mut descriptor.stream()) {
            Ok(key_data) => Some(key_data),
            Err(err) => {
                warn!(data_name, "could not read key data: {err:#}");
                None
            }
        }
    }

    fn read_fields(stream: &mut DataReader<'_>) -> Result<Self> {
        Ok(Self {
            salt: stream.read_bytes()?,
            key_encrypted: stream.read_bytes()?,
            info_encrypted: stream.read_bytes()?,
        })
    }

    /// Recovers the local key and the account list.
    ///
    /// A wrong passcode is reported as [`DecryptError::WrongKey`].
    #[inline]
    pub fn unlock(&self, passcode: &Passcode) -> Result<UnlockedKeyData, KeyDataError> {
        if self.salt.len() != LOCAL_ENCRYPT_SALT_SIZE {
            return Err(KeyDataError::Format(anyhow::anyhow!(
                "bad salt size: {}",
                self.salt.len()
            )));
        }
        let passcode_key = derive_key(passcode, &self.salt, KdfAlgorithm::Current);
        let key_descriptor = decrypt_local(&self.key_encrypted, &passcode_key)?;
        let local_key = parse_local_key(&key_descriptor).map_err(KeyDataError::Format)?;

        let info = decrypt_local(&self.info_encrypted, &local_key)?;
        let account_indices = parse_account_indices(&info).map_err(KeyDataError::Format)?;
        debug!(accounts = account_indices.len(), "key data unlocked");
        Ok(UnlockedKeyData {
            local_key,
            account_indices,
        })
    }
}

fn parse_local_key(descriptor: &DecryptedDescriptor) -> Result<LocalKey> {
    let mut stream = descriptor.stream();
    LocalKey::from_bytes(stream.read_raw(LOCAL_KEY_SIZE)?)
}

/// Valid indices in stored order; out of range and repeated ones are skipped.
fn parse_account_indices(descriptor: &DecryptedDescriptor) -> Result<Vec<i32>> {
    let mut stream = descriptor.stream();
    let count = stream.read_i32()?;
    ensure!(
        count > 0 && count <= MAX_ACCOUNTS,
        "bad accounts count: {count}"
    );
    let mut indices = Vec::new();
    for _ in 0..count {
        let index = stream.read_i32()?;
        if (0..MAX_ACCOUNTS).contains(&index) && !indices.contains(&index) {
            indices.push(index);
        }
    }
    ensure!(!indices.is_empty(), "no valid account indices");
    Ok(indices)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {super::*, tempfile::TempDir};

    #[test]
    fn unlock_with_passcode() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), 4_000_000);
        let local_key = LocalKey::generate();
        let passcode = Passcode::from("1234");

        KeyData::create(&passcode, &local_key, &[0, 2])
            .write(&store, DEFAULT_DATA_NAME)
            .unwrap();
        assert!(store.exists("key_data"));

        let key_data = KeyData::read(&store, DEFAULT_DATA_NAME).unwrap();
        assert_eq!(key_data.salt().len(), LOCAL_ENCRYPT_SALT_SIZE);
        let unlocked = key_data.unlock(&passcode).unwrap();
        assert_eq!(unlocked.local_key, local_key);
        assert_eq!(unlocked.account_indices, [0, 2]);

        assert!(matches!(
            key_data.unlock(&Passcode::from("4321")),
            Err(KeyDataError::Decrypt(DecryptError::WrongKey))
        ));
        assert!(matches!(
            key_data.unlock(&Passcode::empty()),
            Err(KeyDataError::Decrypt(DecryptError::WrongKey))
        ));
    }

    #[test]
    fn empty_passcode() {
        let local_key = LocalKey::generate();
        let key_data = KeyData::create(&Passcode::empty(), &local_key, &[1]);
        let unlocked = key_data.unlock(&Passcode::empty()).unwrap();
        assert_eq!(unlocked.local_key, local_key);
        assert_eq!(unlocked.account_indices, [1]);
    }

    #[test]
    fn invalid_indices_are_skipped() {
        let local_key = LocalKey::generate();
        let key_data = KeyData::create(&Passcode::empty(), &local_key, &[3, -1, 3, MAX_ACCOUNTS]);
        let unlocked = key_data.unlock(&Passcode::empty()).unwrap();
        assert_eq!(unlocked.account_indices, [3]);

        let key_data = KeyData::create(&Passcode::empty(), &local_key, &[]);
        assert!(matches!(
            key_data.unlock(&Passcode::empty()),
            Err(KeyDataError::Format(_))
        ));
    }

    #[test]
    fn separate_data_names() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), 1);
        KeyData::create(&Passcode::empty(), &LocalKey::generate(), &[0])
            .write(&store, "data#2")
            .unwrap();
        assert!(KeyData::read(&store, DEFAULT_DATA_NAME).is_none());
        assert!(KeyData::read(&store, "data#2").is_some());
    }

    #[test]
    fn truncated_record() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path(), 1);
        let mut writer = store.writer("key_data");
        writer.write_bytes(&[0; 32]);
        writer.finish().unwrap();
        assert!(KeyData::read(&store, DEFAULT_DATA_NAME).is_none());
    }
}
