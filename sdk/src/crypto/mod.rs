//! Local encryption of record payloads.
//!
//! A 256-byte local key is derived from the user passcode and a random salt
//! (see [`kdf`]). Payloads are encrypted with AES-256 in IGE mode using the
//! old MTProto key schedule: the message key is the first 16 bytes of the
//! SHA-1 of the padded plaintext, and the AES key and IV are mixed from the
//! message key and the local key.
//!
//! The plaintext block has the following form:
//!
//! - size (32 bits, little endian) - length of the size field plus the payload
//! - payload fields
//! - random padding up to a multiple of 16 bytes
//!
//! The encrypted block is the message key followed by the ciphertext. The
//! SHA-1 check on decryption detects both a wrong key and corrupted data.

mod cipher;
mod descriptor;
pub mod kdf;

pub use {
    cipher::{DecryptError, decrypt_local, encrypt_local},
    descriptor::{DecryptedDescriptor, EncryptedDescriptor},
    kdf::{KdfAlgorithm, LOCAL_ENCRYPT_SALT_SIZE, derive_key, generate_salt},
};
