use std::fmt;
use std::str::FromStr;

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};

use crate::error::PrimitivesError;
use crate::hash::Hash;

/// A DER-encoded ECDSA signature, right-padded with zeroes to a fixed width.
/// Only the first transaction of a batch carries a non-zero sign.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sign(pub [u8; 72]);

impl Sign {
    pub const ZERO: Sign = Sign([0u8; 72]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 72]
    }

    /// Length of the DER payload before the trailing zero padding, read off
    /// the DER sequence header rather than trusting the caller.
    fn der_len(&self) -> usize {
        der_content_len(&self.0).unwrap_or(0)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.0[..self.der_len()]
    }

    pub fn from_signature(sig: &Signature) -> Self {
        let der = sig.serialize_der();
        let mut s = [0u8; 72];
        let n = der.len().min(72);
        s[..n].copy_from_slice(&der[..n]);
        Sign(s)
    }
}

/// Returns the total number of bytes the DER `SEQUENCE` at the start of
/// `buf` occupies, ignoring any trailing padding.
fn der_content_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 || buf[0] != 0x30 {
        return None;
    }
    let len_byte = buf[1];
    if len_byte & 0x80 == 0 {
        Some((2 + len_byte as usize).min(buf.len()))
    } else {
        let n_len_bytes = (len_byte & 0x7f) as usize;
        if buf.len() < 2 + n_len_bytes {
            return None;
        }
        let mut content_len: usize = 0;
        for &b in &buf[2..2 + n_len_bytes] {
            content_len = (content_len << 8) | b as usize;
        }
        Some((2 + n_len_bytes + content_len).min(buf.len()))
    }
}

impl Default for Sign {
    fn default() -> Self {
        Sign::ZERO
    }
}

impl fmt::Debug for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sign({})", hex::encode(self.0))
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Sign {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Sign::ZERO);
        }
        let bytes = hex::decode(s).map_err(|_| PrimitivesError::InvalidSign)?;
        if bytes.len() > 72 {
            return Err(PrimitivesError::InvalidSign);
        }
        let mut b = [0u8; 72];
        b[..bytes.len()].copy_from_slice(&bytes);
        Ok(Sign(b))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Sign {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Sign {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A hybrid-encoded secp256k1 public key, Base58 on the wire.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_secp256k1(&self) -> Result<Secp256k1PublicKey, PrimitivesError> {
        Secp256k1PublicKey::from_slice(&self.0).map_err(|_| PrimitivesError::InvalidPublicKey)
    }

    pub fn from_secp256k1(key: &Secp256k1PublicKey) -> Self {
        PublicKey(key.serialize_uncompressed().to_vec())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl FromStr for PublicKey {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(PublicKey(Vec::new()));
        }
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| PrimitivesError::InvalidPublicKey)?;
        Ok(PublicKey(bytes))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Verifies `sign` against `message_hash` under `public_key`. Mirrors
/// `VerifyTransferHash`/`VerifyTransferSign` in the source: DER-parse the
/// signature, then check it against the digest with the curve's own verifier.
pub fn verify_hash(sign: &Sign, message_hash: &Hash, public_key: &PublicKey) -> bool {
    let Ok(key) = public_key.to_secp256k1() else {
        return false;
    };
    let Ok(signature) = Signature::from_der(sign.as_der()) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(message_hash.as_bytes()) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&message, &signature, &key).is_ok()
}

/// Signs `message_hash` with `secret_key`, producing a DER signature padded
/// to the fixed `Sign` width.
pub fn sign_hash(message_hash: &Hash, secret_key: &SecretKey) -> Sign {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(message_hash.as_bytes())
        .expect("message hash is always 32 bytes");
    let signature = secp.sign_ecdsa(&message, secret_key);
    Sign::from_signature(&signature)
}
