//! Encrypted local storage: passcode key derivation, the local block cipher,
//! durable `TDF$` records and the key data envelope.

pub mod crypto;
pub mod key_data;
pub mod record;

pub use tdstore_protocol::{LocalKey, Passcode};
