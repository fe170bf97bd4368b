//! Fixed-size digest values.
//!
//! Digests render as lowercase hex everywhere they leave the process
//! (logs, snapshot files, divergence reports) and are stored as raw bytes
//! everywhere else.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length in bytes of every digest produced by the kernel.
pub const DIGEST_LEN: usize = 32;

/// A 32-byte BLAKE3 output.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// The all-zero digest. Used as the link target of the first record in
    /// a chain that has no genesis anchor of its own.
    pub const ZERO: Self = Self([0u8; DIGEST_LEN]);

    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Return whether this is the all-zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LEN]
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`hex::FromHexError`] if the string is not exactly 32 bytes of
    /// valid hex.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        let full = self.to_hex();
        full.get(..12).map_or_else(|| full.clone(), str::to_owned)
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl core::fmt::Display for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl core::fmt::Debug for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter that stores byte vectors as hex strings.
///
/// Use with `#[serde(with = "lockstep_hash::hex_bytes")]`.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as a lowercase hex string.
    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]> + ?Sized,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserialize bytes from a hex string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
