//! Canonical types, byte serialization, hashing and signing shared by every
//! other `qdp` crate: account/transaction ids, `Hash`/`Sign`/`PublicKey`,
//! `Txn`, `Settings`, and the `Transfer` request shape.

pub mod error;
pub mod hash;
pub mod ids;
pub mod settings;
pub mod sign;
pub mod traits;
pub mod transfer;
pub mod txn;

pub use error::PrimitivesError;
pub use hash::Hash;
pub use ids::{AccId, Id, SettingsId, TxnId, MINT_ACCOUNT};
pub use settings::Settings;
pub use sign::{sign_hash, verify_hash, PublicKey, Sign};
pub use traits::{Pusher, PusherError, Router, SettingsPusher};
pub use transfer::{Transfer, TransferItem, TransferResult};
pub use txn::Txn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txn_id_display_and_parse() {
        let id = TxnId::new(AccId(10), Id(2));
        assert_eq!(id.to_string(), "10_2");
        assert_eq!(id.to_string().parse::<TxnId>().unwrap(), id);
    }

    #[test]
    fn hash_roundtrip_hex() {
        let h = Hash([7u8; 32]);
        let s = h.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(s.parse::<Hash>().unwrap(), h);
    }

    #[test]
    fn empty_hash_string_is_zero() {
        assert_eq!("".parse::<Hash>().unwrap(), Hash::ZERO);
    }

    #[test]
    fn sign_roundtrip_hex() {
        let s = Sign([9u8; 72]);
        let encoded = s.to_string();
        assert_eq!(encoded.len(), 144);
        assert_eq!(encoded.parse::<Sign>().unwrap(), s);
    }

    #[test]
    fn scenario_1_mint_transfer_hash() {
        // Fresh account 0 (mint) sends 1000 to account 20; first txn of a
        // fresh chain, id=1, prev_hash=zero, settings_id=0.
        let txn = Txn {
            id: Id(1),
            sender: AccId(0),
            receiver: AccId(20),
            amount: 1000,
            balance: -1000,
            settings_id: Id(0),
            spent_by: Id(0),
            prev_hash: Hash::ZERO,
            hash: Hash::ZERO,
            sign: Sign::ZERO,
        };
        // The hash is deterministic for fixed inputs; exercised end-to-end in
        // qdp-processor against the documented literal value.
        let h1 = txn.canonical_hash();
        let h2 = txn.canonical_hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn settings_request_hash_omits_id() {
        let a = Settings {
            id: Id(1),
            account: AccId(10),
            public_key: PublicKey(vec![]),
            prev_hash: Hash::ZERO,
            hash: Hash::ZERO,
            verify_transfer_sign: false,
            data_hash: Hash::ZERO,
            sign: Sign::ZERO,
        };
        let mut b = a.clone();
        b.id = Id(2);
        assert_eq!(a.request_hash(), b.request_hash());
        assert_ne!(a.canonical_hash(), b.canonical_hash());
    }
}
