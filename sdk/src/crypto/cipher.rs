use {
    super::descriptor::{BLOCK_LEN, DecryptedDescriptor, EncryptedDescriptor, SIZE_FIELD_LEN},
    aes::{
        Aes256,
        cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
    },
    sha1::{Digest, Sha1},
    std::ops::Range,
    tdstore_protocol::LocalKey,
};

const MSG_KEY_LEN: usize = 16;
/// Offset into the local key used by the receiving side of the old key schedule.
const LOCAL_KEY_OFFSET: usize = 8;

type Block = [u8; BLOCK_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecryptError {
    #[error("bad encrypted part size: {0}")]
    BadSize(usize),
    #[error("bad decrypt key, data not decrypted")]
    WrongKey,
    #[error("bad decrypted part size: {declared}, full length: {full}")]
    BadLength { declared: u32, full: usize },
}

/// Encrypts the descriptor contents with the local key.
///
/// The output is the 16-byte message key followed by the ciphertext, so its
/// length is always a multiple of 16 and greater than 16.
#[must_use]
#[inline]
pub fn encrypt_local(descriptor: EncryptedDescriptor, key: &LocalKey) -> Vec<u8> {
    let mut data = descriptor.into_padded();
    let msg_key = message_key(&data);
    let (aes_key, aes_iv) = prepare_aes_oldmtp(&msg_key, key_window(key));
    aes_ige_encrypt(&mut data, &aes_key, &aes_iv);

    let mut encrypted = Vec::with_capacity(data.len().saturating_add(MSG_KEY_LEN));
    encrypted.extend_from_slice(&msg_key);
    encrypted.extend_from_slice(&data);
    encrypted
}

/// Decrypts a block produced by [`encrypt_local`].
#[inline]
pub fn decrypt_local(encrypted: &[u8], key: &LocalKey) -> Result<DecryptedDescriptor, DecryptError> {
    if encrypted.len() <= MSG_KEY_LEN || !encrypted.len().is_multiple_of(BLOCK_LEN) {
        return Err(DecryptError::BadSize(encrypted.len()));
    }
    let (msg_key, ciphertext) = encrypted.split_at(MSG_KEY_LEN);
    let (aes_key, aes_iv) = prepare_aes_oldmtp(msg_key, key_window(key));
    let mut decrypted = ciphertext.to_vec();
    aes_ige_decrypt(&mut decrypted, &aes_key, &aes_iv);
    if message_key(&decrypted) != msg_key {
        return Err(DecryptError::WrongKey);
    }

    let full = decrypted.len();
    let declared = decrypted
        .first_chunk::<SIZE_FIELD_LEN>()
        .map_or(0, |size| u32::from_le_bytes(*size));
    let Ok(len) = usize::try_from(declared) else {
        return Err(DecryptError::BadLength { declared, full });
    };
    // Padding never spans a whole block.
    if len > full || len <= full.saturating_sub(BLOCK_LEN) || len < SIZE_FIELD_LEN {
        return Err(DecryptError::BadLength { declared, full });
    }
    decrypted.truncate(len);
    Ok(DecryptedDescriptor::new(decrypted))
}

fn message_key(data: &[u8]) -> [u8; MSG_KEY_LEN] {
    Sha1::digest(data)
        .first_chunk::<MSG_KEY_LEN>()
        .copied()
        .unwrap_or_default()
}

fn key_window(key: &LocalKey) -> &[u8] {
    key.as_bytes().get(LOCAL_KEY_OFFSET..).unwrap_or_default()
}

fn part(bytes: &[u8], range: Range<usize>) -> &[u8] {
    bytes.get(range).unwrap_or_default()
}

fn sha1_parts(parts: &[&[u8]]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Concatenates the byte ranges into an array.
fn gather<const N: usize>(parts: &[(&[u8], Range<usize>)]) -> [u8; N] {
    let mut out = [0; N];
    let bytes = parts
        .iter()
        .flat_map(|(bytes, range)| part(bytes, range.clone()));
    for (out, byte) in out.iter_mut().zip(bytes) {
        *out = *byte;
    }
    out
}

/// Mixes the AES key and IV out of the message key and the first 128 bytes
/// of `window`.
fn prepare_aes_oldmtp(msg_key: &[u8], window: &[u8]) -> ([u8; 32], [u8; 32]) {
    let sha1_a = sha1_parts(&[msg_key, part(window, 0..32)]);
    let sha1_b = sha1_parts(&[part(window, 32..48), msg_key, part(window, 48..64)]);
    let sha1_c = sha1_parts(&[part(window, 64..96), msg_key]);
    let sha1_d = sha1_parts(&[msg_key, part(window, 96..128)]);

    let aes_key = gather(&[
        (sha1_a.as_slice(), 0..8),
        (sha1_b.as_slice(), 8..20),
        (sha1_c.as_slice(), 4..16),
    ]);
    let aes_iv = gather(&[
        (sha1_a.as_slice(), 8..20),
        (sha1_b.as_slice(), 0..8),
        (sha1_c.as_slice(), 16..20),
        (sha1_d.as_slice(), 0..8),
    ]);
    (aes_key, aes_iv)
}

fn xor(a: &Block, b: &Block) -> Block {
    let mut out = *a;
    for (out, b) in out.iter_mut().zip(b) {
        *out ^= b;
    }
    out
}

fn to_block(data: &[u8]) -> Block {
    let mut block = [0u8; BLOCK_LEN];
    block.copy_from_slice(data);
    block
}

/// Splits an IGE IV into the previous ciphertext and previous plaintext blocks.
fn split_iv(iv: &[u8; 32]) -> (Block, Block) {
    let (prev_cipher, prev_plain) = iv.split_at(BLOCK_LEN);
    (to_block(prev_cipher), to_block(prev_plain))
}

/// AES-256-IGE in place. `data` must be block aligned.
fn aes_ige_encrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    debug_assert!(data.len().is_multiple_of(BLOCK_LEN));
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let (mut prev_cipher, mut prev_plain) = split_iv(iv);
    for chunk in data.chunks_exact_mut(BLOCK_LEN) {
        let plain = to_block(chunk);
        let mut block = GenericArray::from(xor(&plain, &prev_cipher));
        cipher.encrypt_block(&mut block);
        let encrypted = xor(&block.into(), &prev_plain);
        chunk.copy_from_slice(&encrypted);
        prev_plain = plain;
        prev_cipher = encrypted;
    }
}

fn aes_ige_decrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    debug_assert!(data.len().is_multiple_of(BLOCK_LEN));
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let (mut prev_cipher, mut prev_plain) = split_iv(iv);
    for chunk in data.chunks_exact_mut(BLOCK_LEN) {
        let encrypted = to_block(chunk);
        let mut block = GenericArray::from(xor(&encrypted, &prev_plain));
        cipher.decrypt_block(&mut block);
        let plain = xor(&block.into(), &prev_cipher);
        chunk.copy_from_slice(&plain);
        prev_plain = plain;
        prev_cipher = encrypted;
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::indexing_slicing, reason = "test")]
mod tests {
    use {super::*, tdstore_protocol::LOCAL_KEY_SIZE};

    fn descriptor(fields: &[Option<&[u8]>]) -> EncryptedDescriptor {
        let mut descriptor = EncryptedDescriptor::new();
        for field in fields {
            descriptor.stream().write_byte_array(*field);
        }
        descriptor
    }

    #[test]
    fn round_trip_keeps_field_order() {
        let key = LocalKey::generate();
        let encrypted = encrypt_local(
            descriptor(&[Some(b"alpha".as_slice()), Some(b"".as_slice()), None]),
            &key,
        );
        assert_eq!(encrypted.len() % 16, 0);
        assert!(encrypted.len() > 16);

        let decrypted = decrypt_local(&encrypted, &key).unwrap();
        let mut stream = decrypted.stream();
        assert_eq!(stream.read_byte_array().unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(stream.read_byte_array().unwrap(), Some(Vec::new()));
        assert_eq!(stream.read_byte_array().unwrap(), None);
        assert!(stream.at_end());
    }

    #[test]
    fn empty_descriptor() {
        let key = LocalKey::generate();
        let encrypted = encrypt_local(EncryptedDescriptor::new(), &key);
        assert_eq!(encrypted.len(), 32);
        let decrypted = decrypt_local(&encrypted, &key).unwrap();
        assert!(decrypted.payload().is_empty());
    }

    #[test]
    fn padding_is_random() {
        let key = LocalKey::generate();
        let first = encrypt_local(descriptor(&[Some(b"x".as_slice())]), &key);
        let second = encrypt_local(descriptor(&[Some(b"x".as_slice())]), &key);
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_key() {
        let encrypted = encrypt_local(descriptor(&[Some(b"data".as_slice())]), &LocalKey::generate());
        assert_eq!(
            decrypt_local(&encrypted, &LocalKey::generate()),
            Err(DecryptError::WrongKey)
        );
    }

    #[test]
    fn corrupted_ciphertext() {
        let key = LocalKey::generate();
        let mut encrypted = encrypt_local(descriptor(&[Some(b"data".as_slice())]), &key);
        *encrypted.last_mut().unwrap() ^= 1;
        assert_eq!(decrypt_local(&encrypted, &key), Err(DecryptError::WrongKey));
    }

    #[test]
    fn bad_sizes() {
        let key = LocalKey::new([3; LOCAL_KEY_SIZE]);
        for len in [0, 15, 16, 17, 33] {
            assert_eq!(
                decrypt_local(&vec![0; len], &key),
                Err(DecryptError::BadSize(len))
            );
        }
    }

    #[test]
    fn bad_declared_length() {
        let key = LocalKey::generate();
        // Hand-built block whose size field claims an extra block of padding.
        let mut plain = vec![0u8; 32];
        plain[..4].copy_from_slice(&8u32.to_le_bytes());
        let msg_key = message_key(&plain);
        let (aes_key, aes_iv) = prepare_aes_oldmtp(&msg_key, key_window(&key));
        aes_ige_encrypt(&mut plain, &aes_key, &aes_iv);
        let mut encrypted = msg_key.to_vec();
        encrypted.extend_from_slice(&plain);

        assert_eq!(
            decrypt_local(&encrypted, &key),
            Err(DecryptError::BadLength {
                declared: 8,
                full: 32
            })
        );
    }

    #[test]
    fn ige_round_trip() {
        let key = [1u8; 32];
        let iv = [2u8; 32];
        let original: Vec<u8> = (0..64).collect();
        let mut data = original.clone();
        aes_ige_encrypt(&mut data, &key, &iv);
        assert_ne!(data, original);
        aes_ige_decrypt(&mut data, &key, &iv);
        assert_eq!(data, original);
    }
}
