use {
    anyhow::{Error, format_err},
    rand::RngCore,
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{
        borrow::Cow,
        fmt::{self, Debug, Display},
        str::FromStr,
    },
};

/// Size of the local encryption key material in bytes.
pub const LOCAL_KEY_SIZE: usize = 256;

/// Secret used to encrypt local records.
///
/// The key is produced by key derivation or generated randomly and wrapped
/// into a key data record. It is never written to disk in plain form.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalKey(Box<[u8; LOCAL_KEY_SIZE]>);

impl LocalKey {
    #[must_use]
    #[inline]
    pub fn new(bytes: [u8; LOCAL_KEY_SIZE]) -> Self {
        Self(Box::new(bytes))
    }

    #[must_use]
    #[inline]
    pub fn generate() -> Self {
        let mut bytes = [0u8; LOCAL_KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let array = <[u8; LOCAL_KEY_SIZE]>::try_from(bytes).map_err(|_| {
            format_err!(
                "invalid key length; got {}, expected {LOCAL_KEY_SIZE}",
                bytes.len()
            )
        })?;
        Ok(Self::new(array))
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; LOCAL_KEY_SIZE] {
        &self.0
    }

    #[must_use]
    #[inline]
    pub fn display_unmasked(&self) -> impl Display + '_ {
        hex::encode(self.0.as_slice())
    }
}

impl FromStr for LocalKey {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&hex::decode(s)?)
    }
}

impl<'de> Deserialize<'de> for LocalKey {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl Serialize for LocalKey {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(self.0.as_slice()).serialize(serializer)
    }
}

impl Debug for LocalKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKey").finish()
    }
}

/// User passcode protecting the local key. Empty means "no passcode".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Passcode(Vec<u8>);

impl Passcode {
    #[must_use]
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Passcode {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Passcode {
    #[inline]
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for Passcode {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl Debug for Passcode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passcode")
            .field("empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod test {
    use super::*;

    #[test]
    fn local_key_from_str() {
        let key = LocalKey::generate();
        let text = key.display_unmasked().to_string();
        assert_eq!(text.len(), LOCAL_KEY_SIZE * 2);
        assert_eq!(LocalKey::from_str(&text).unwrap(), key);

        LocalKey::from_str("").unwrap_err();
        LocalKey::from_str("abcd").unwrap_err();
        LocalKey::from_str(&format!("{text}00")).unwrap_err();
        LocalKey::from_str(&format!("{}zz", &text[2..])).unwrap_err();
    }

    #[test]
    fn secrets_are_masked() {
        let key = LocalKey::new([0xAB; LOCAL_KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "LocalKey");
        let passcode = Passcode::from("hunter2");
        assert!(!format!("{passcode:?}").contains("hunter2"));
        assert!(Passcode::empty().is_empty());
    }
}
