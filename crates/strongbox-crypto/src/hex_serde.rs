//! Serde helpers encoding byte arrays as lowercase hex strings.
//!
//! Use with `#[serde(with = "strongbox_crypto::hex_serde")]` on any field whose
//! type is `AsRef<[u8]>` and `TryFrom<Vec<u8>>` (e.g. `[u8; 32]`, `[u8; 64]`).

use serde::{de::Error, Deserialize, Deserializer, Serializer};

pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: AsRef<[u8]>,
{
    serializer.serialize_str(&hex::encode(bytes))
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<Vec<u8>>,
{
    let encoded = String::deserialize(deserializer)?;
    let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
    let len = bytes.len();
    T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected byte length {len}")))
}
