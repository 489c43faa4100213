//! Passcode-based derivation of the local key.

use {
    pbkdf2::pbkdf2_hmac,
    rand::RngCore,
    sha1::Sha1,
    sha2::{Digest, Sha512},
    tdstore_protocol::{LOCAL_KEY_SIZE, LocalKey, Passcode},
};

/// Size of the salt stored next to the encrypted local key.
pub const LOCAL_ENCRYPT_SALT_SIZE: usize = 32;

const STRONG_ITERATIONS: u32 = 100_000;
const LEGACY_ITERATIONS: u32 = 4000;
const LEGACY_NO_PASSCODE_ITERATIONS: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KdfAlgorithm {
    /// PBKDF2-HMAC-SHA512 over a SHA-512 pre-hash of the passcode.
    #[default]
    Current,
    /// PBKDF2-HMAC-SHA1, used by old data directories.
    Legacy,
}

/// Derives a local key. Deterministic for the same inputs.
///
/// An empty passcode uses a minimal iteration count.
#[must_use]
#[inline]
pub fn derive_key(passcode: &Passcode, salt: &[u8], algorithm: KdfAlgorithm) -> LocalKey {
    let mut key = [0u8; LOCAL_KEY_SIZE];
    match algorithm {
        KdfAlgorithm::Current => {
            let hash = Sha512::new()
                .chain_update(salt)
                .chain_update(passcode.as_bytes())
                .chain_update(salt)
                .finalize();
            let iterations = if passcode.is_empty() {
                1
            } else {
                STRONG_ITERATIONS
            };
            pbkdf2_hmac::<Sha512>(&hash, salt, iterations, &mut key);
        }
        KdfAlgorithm::Legacy => {
            let iterations = if passcode.is_empty() {
                LEGACY_NO_PASSCODE_ITERATIONS
            } else {
                LEGACY_ITERATIONS
            };
            pbkdf2_hmac::<Sha1>(passcode.as_bytes(), salt, iterations, &mut key);
        }
    }
    LocalKey::new(key)
}

#[must_use]
#[inline]
pub fn generate_salt() -> [u8; LOCAL_ENCRYPT_SALT_SIZE] {
    let mut salt = [0u8; LOCAL_ENCRYPT_SALT_SIZE];
    rand::rng().fill_bytes(&mut salt);
    salt
}
