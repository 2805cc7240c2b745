use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::PrimitivesError;

/// SHA-256 digest. All-zero is used as the "no predecessor" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::ZERO
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Hash::ZERO);
        }
        let bytes = hex::decode(s).map_err(|_| PrimitivesError::InvalidHash)?;
        let mut h = [0u8; 32];
        let n = bytes.len().min(32);
        h[..n].copy_from_slice(&bytes[..n]);
        Ok(Hash(h))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Hash {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A little writer that feeds a running SHA-256 state, mirroring the source's
/// `hash.Hash` interface (`Write`-then-`Sum`): callers append fixed-width
/// big-endian fields in order, then call `finish`.
pub struct CanonicalHasher(Sha256);

impl CanonicalHasher {
    pub fn new() -> Self {
        CanonicalHasher(Sha256::new())
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.0.update(v.to_be_bytes());
        self
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.0.update(v.to_be_bytes());
        self
    }

    pub fn write_bytes(&mut self, b: &[u8]) -> &mut Self {
        self.0.update(b);
        self
    }

    pub fn write_bool(&mut self, b: bool) -> &mut Self {
        self.0.update([b as u8]);
        self
    }

    pub fn finish(self) -> Hash {
        let digest = self.0.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }
}

impl Default for CanonicalHasher {
    fn default() -> Self {
        Self::new()
    }
}
