use crate::hash::{CanonicalHasher, Hash};
use crate::ids::{AccId, Id, TxnId};
use crate::sign::Sign;

/// One receiver/amount pair within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferItem {
    pub receiver: AccId,
    pub amount: i64,
}

/// A request to move funds from one sender to one or more receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transfer {
    pub sender: AccId,
    pub batch: Vec<TransferItem>,
    pub sign: Sign,
    pub prev_hash: Hash,
    pub settings_id: Id,
}

impl Transfer {
    pub fn single(sender: AccId, receiver: AccId, amount: i64) -> Self {
        Transfer {
            sender,
            batch: vec![TransferItem { receiver, amount }],
            sign: Sign::ZERO,
            prev_hash: Hash::ZERO,
            settings_id: Id(0),
        }
    }

    /// SHA-256 over `sender ‖ for-each-item(receiver ‖ amount) ‖ prev_hash ‖
    /// settings_id` — what the request signature covers.
    pub fn request_hash(&self) -> Hash {
        let mut h = CanonicalHasher::new();
        h.write_u64(self.sender.0);
        for item in &self.batch {
            h.write_u64(item.receiver.0).write_i64(item.amount);
        }
        h.write_bytes(self.prev_hash.as_bytes())
            .write_u64(self.settings_id.0);
        h.finish()
    }
}

/// Result of a successful `process_transfer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    pub txn_id: TxnId,
    pub hash: Hash,
    pub settings_id: Id,
}
