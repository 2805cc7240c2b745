use crate::hash::{CanonicalHasher, Hash};
use crate::ids::{AccId, Id};
use crate::sign::Sign;

/// A single transaction between two accounts, viewed either as an output (from
/// the sender's side) or an input (from the receiver's side).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Txn {
    pub id: Id,
    pub sender: AccId,
    pub receiver: AccId,
    pub amount: i64,
    /// Sender's balance immediately after this transaction.
    pub balance: i64,
    /// Sender's active settings id at processing time.
    pub settings_id: Id,
    /// Id of the receiver-side output txn that consumed this one as an input.
    /// Zero if unspent. Not part of the hash.
    pub spent_by: Id,
    pub prev_hash: Hash,
    pub hash: Hash,
    /// Populated only on the first txn of a batch.
    pub sign: Sign,
}

impl Txn {
    /// SHA-256 over `id ‖ sender ‖ receiver ‖ amount ‖ balance ‖ settings_id ‖
    /// prev_hash`, big-endian. `spent_by` and `sign` are excluded.
    pub fn canonical_hash(&self) -> Hash {
        let mut h = CanonicalHasher::new();
        h.write_u64(self.id.0)
            .write_u64(self.sender.0)
            .write_u64(self.receiver.0)
            .write_i64(self.amount)
            .write_i64(self.balance)
            .write_u64(self.settings_id.0)
            .write_bytes(self.prev_hash.as_bytes());
        h.finish()
    }

    /// Returns `hash`, computing and memoising it first if it is still zero.
    pub fn hash_or_compute(&mut self) -> Hash {
        if self.hash.is_zero() {
            self.hash = self.canonical_hash();
        }
        self.hash
    }
}
