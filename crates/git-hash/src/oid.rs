use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hex::{hex_decode, hex_to_string};
use crate::HashError;

/// Length of a raw SHA-1 digest.
pub const SHA1_LEN: usize = 20;
/// Length of a SHA-1 digest in hex.
pub const SHA1_HEX_LEN: usize = 40;

/// A git object id: the raw SHA-1 digest of an object's canonical frame.
///
/// Ordering is byte-wise on the raw digest, which is the order pack indexes
/// store their sha tables in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; SHA1_LEN]);

impl ObjectId {
    /// The all-zero id. Remotes use it to mean "no such ref yet".
    pub const NULL: Self = Self([0u8; SHA1_LEN]);

    pub const fn new(bytes: [u8; SHA1_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an id from a raw 20-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; SHA1_LEN] = bytes
            .try_into()
            .map_err(|_| HashError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parse a 40-character hex string (either case).
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        if hex.len() != SHA1_HEX_LEN {
            return Err(HashError::InvalidHexLength {
                expected: SHA1_HEX_LEN,
                actual: hex.len(),
            });
        }
        let mut bytes = [0u8; SHA1_LEN];
        hex_decode(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SHA1_LEN] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; SHA1_LEN]
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex_to_string(&self.0)
    }

    /// Leading byte, used as the fan-out bucket.
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// Relative loose-object path: `"xx/yyyy..."`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; SHA1_LEN]> for ObjectId {
    fn from(bytes: [u8; SHA1_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Persisted as hex, the same way refs and config files spell ids.
impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
