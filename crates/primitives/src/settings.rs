use crate::hash::{CanonicalHasher, Hash};
use crate::ids::{AccId, Id};
use crate::sign::{PublicKey, Sign};

/// An account's signing settings. Forms a chain shaped like `Txn`'s, one
/// generation per update.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    pub id: Id,
    pub account: AccId,
    pub public_key: PublicKey,
    pub prev_hash: Hash,
    pub hash: Hash,
    pub verify_transfer_sign: bool,
    pub data_hash: Hash,
    pub sign: Sign,
}

impl Settings {
    /// SHA-256 over `id ‖ account ‖ verify_flag_byte ‖ prev_hash ‖ public_key
    /// ‖ data_hash`. This is the hash stored on the chain.
    pub fn canonical_hash(&self) -> Hash {
        let mut h = CanonicalHasher::new();
        h.write_u64(self.id.0)
            .write_u64(self.account.0)
            .write_bool(self.verify_transfer_sign)
            .write_bytes(self.prev_hash.as_bytes())
            .write_bytes(&self.public_key.0)
            .write_bytes(self.data_hash.as_bytes());
        h.finish()
    }

    /// SHA-256 over `account ‖ verify_flag_byte ‖ prev_hash ‖ public_key ‖
    /// data_hash` — what a settings-update request signs. Notably omits `id`,
    /// unlike `canonical_hash`.
    pub fn request_hash(&self) -> Hash {
        let mut h = CanonicalHasher::new();
        h.write_u64(self.account.0)
            .write_bool(self.verify_transfer_sign)
            .write_bytes(self.prev_hash.as_bytes())
            .write_bytes(&self.public_key.0)
            .write_bytes(self.data_hash.as_bytes());
        h.finish()
    }

    pub fn hash_or_compute(&mut self) -> Hash {
        if self.hash.is_zero() {
            self.hash = self.canonical_hash();
        }
        self.hash
    }
}
