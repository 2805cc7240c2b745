//! Per-account chain cache: an ordered history of a sender's output
//! transactions plus the set of inputs it has received but not yet spent.
//!
//! The source keeps this as a skip list of pooled elements with raw
//! back-pointers from spent inputs into their consuming output entry. Here
//! each account's history is a `BTreeMap` keyed by id (the ordered-map
//! substitution the design explicitly allows) and a spent input is stored by
//! value inside the entry that consumed it, never by pointer.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use qdp_primitives::{AccId, Hash, Id, Txn, TxnId};

/// How many of the newest output entries are retained per account.
pub const TXN_RETENTION: u64 = 3;

#[derive(Debug, Clone)]
struct Entry {
    txn: Txn,
    /// Inputs this output consumed, newest-spent-last; kept for history
    /// playback, not for balance or hash computation.
    consumed: Vec<Txn>,
}

#[derive(Debug, Default)]
struct AccountChain {
    entries: BTreeMap<Id, Entry>,
    unspent: HashMap<TxnId, Txn>,
}

impl AccountChain {
    fn head_id(&self) -> Option<Id> {
        self.entries.keys().next_back().copied()
    }

    fn head(&self) -> Option<&Entry> {
        self.entries.values().next_back()
    }

    fn head_mut(&mut self) -> Option<&mut Entry> {
        self.entries.values_mut().next_back()
    }

    fn trim(&mut self) {
        if let Some(head_id) = self.head_id() {
            if head_id.0 > TXN_RETENTION {
                let floor = head_id.0 - TXN_RETENTION;
                self.entries.retain(|id, _| id.0 > floor);
            }
        }
    }

    fn balance(&self) -> i64 {
        let head_balance = self.head().map(|e| e.txn.balance).unwrap_or(0);
        head_balance + self.unspent.values().map(|t| t.amount).sum::<i64>()
    }
}

/// A per-shard cache holding every account this shard owns. Guarded by a
/// single mutex: the entire validate-hash-link-commit section of a request
/// runs with it held.
#[derive(Default)]
pub struct Chain {
    accounts: Mutex<HashMap<AccId, AccountChain>>,
}

impl Chain {
    pub fn new() -> Self {
        Chain {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Merges `txns` into `acc`'s chain. Each txn must have `acc` as its
    /// sender (an output) or its receiver (an input); a zero id or a txn
    /// naming neither side as `acc` is a programmer error, not a user one.
    pub fn put_to(&self, acc: AccId, txns: &[Txn]) {
        let mut accounts = self.accounts.lock().expect("chain mutex poisoned");
        let chain = accounts.entry(acc).or_default();
        chain.trim();

        for txn in txns {
            assert!(txn.id.0 != 0, "put_to: txn id must not be zero");
            assert!(
                txn.sender == acc || txn.receiver == acc,
                "put_to: txn names neither sender nor receiver as {acc}"
            );

            if txn.sender == acc {
                match chain.entries.get_mut(&txn.id) {
                    Some(existing) => {
                        let adopt_spent_by =
                            existing.txn.spent_by.0 == 0 && txn.spent_by.0 != 0;
                        existing.txn = txn.clone();
                        if adopt_spent_by {
                            existing.txn.spent_by = txn.spent_by;
                        }
                    }
                    None => {
                        chain.entries.insert(
                            txn.id,
                            Entry {
                                txn: txn.clone(),
                                consumed: Vec::new(),
                            },
                        );
                    }
                }
            } else {
                let key = TxnId::new(txn.sender, txn.id);
                if txn.spent_by.0 == 0 {
                    chain.unspent.insert(key, txn.clone());
                } else if let Some(mut spent) = chain.unspent.remove(&key) {
                    spent.spent_by = txn.spent_by;
                    if let Some(output) = chain.entries.get_mut(&txn.spent_by) {
                        output.consumed.push(spent);
                    }
                }
            }
        }
    }

    pub fn get_last_txn(&self, acc: AccId) -> Option<Txn> {
        let accounts = self.accounts.lock().expect("chain mutex poisoned");
        accounts.get(&acc).and_then(|c| c.head()).map(|e| e.txn.clone())
    }

    /// Hash of the head txn, computing and memoising it first if still zero.
    /// All-zero if the account has no chain.
    pub fn get_last_hash(&self, acc: AccId) -> Hash {
        let mut accounts = self.accounts.lock().expect("chain mutex poisoned");
        let Some(chain) = accounts.get_mut(&acc) else {
            return Hash::ZERO;
        };
        let Some(entry) = chain.head_mut() else {
            return Hash::ZERO;
        };
        entry.txn.hash_or_compute()
    }

    /// At most `n` consecutive head-side output txns, newest first.
    pub fn get_last_n_txns(&self, acc: AccId, n: usize) -> Vec<Txn> {
        let accounts = self.accounts.lock().expect("chain mutex poisoned");
        let Some(chain) = accounts.get(&acc) else {
            return Vec::new();
        };
        chain
            .entries
            .values()
            .rev()
            .take(n)
            .map(|e| e.txn.clone())
            .collect()
    }

    /// Snapshot of all unspent inputs received by `acc`.
    pub fn list_unspent_txns(&self, acc: AccId) -> Vec<Txn> {
        let accounts = self.accounts.lock().expect("chain mutex poisoned");
        accounts
            .get(&acc)
            .map(|c| c.unspent.values().cloned().collect())
            .unwrap_or_default()
    }

    /// `head.balance + sum(unspent.amount)`; zero for an unknown account.
    pub fn get_balance(&self, acc: AccId) -> i64 {
        let accounts = self.accounts.lock().expect("chain mutex poisoned");
        accounts.get(&acc).map(|c| c.balance()).unwrap_or(0)
    }

    /// Drops every cached entry for `acc`. Called whenever local state may
    /// have drifted ahead of durable truth.
    pub fn reset(&self, acc: AccId) {
        let mut accounts = self.accounts.lock().expect("chain mutex poisoned");
        accounts.remove(&acc);
    }

    /// Interleaves `acc`'s output txns (descending id) with the inputs each
    /// consumed, for history paging. `before` excludes ids at or above it;
    /// returns the page and the next paging token (the lowest id emitted).
    pub fn get_history(&self, acc: AccId, limit: usize, before: Option<Id>) -> (Vec<Txn>, Option<Id>) {
        let accounts = self.accounts.lock().expect("chain mutex poisoned");
        let Some(chain) = accounts.get(&acc) else {
            return (Vec::new(), None);
        };
        let mut out = Vec::with_capacity(limit);
        let mut next_token = None;
        for (id, entry) in chain.entries.iter().rev() {
            if let Some(before) = before {
                if id.0 >= before.0 {
                    continue;
                }
            }
            if out.len() >= limit {
                next_token = Some(*id);
                break;
            }
            out.push(entry.txn.clone());
            for consumed in entry.consumed.iter().rev() {
                if out.len() >= limit {
                    break;
                }
                out.push(consumed.clone());
            }
        }
        (out, next_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdp_primitives::Sign;

    fn txn(id: u64, sender: u64, receiver: u64, amount: i64, balance: i64, prev: Hash) -> Txn {
        Txn {
            id: Id(id),
            sender: AccId(sender),
            receiver: AccId(receiver),
            amount,
            balance,
            settings_id: Id(0),
            spent_by: Id(0),
            prev_hash: prev,
            hash: Hash::ZERO,
            sign: Sign::ZERO,
        }
    }

    #[test]
    fn put_to_creates_output_and_returns_head() {
        let chain = Chain::new();
        let t = txn(1, 0, 20, 1000, -1000, Hash::ZERO);
        chain.put_to(AccId(0), &[t.clone()]);
        assert_eq!(chain.get_last_txn(AccId(0)), Some(t));
        assert_eq!(chain.get_balance(AccId(0)), -1000);
    }

    #[test]
    fn unknown_account_has_zero_balance_and_hash() {
        let chain = Chain::new();
        assert_eq!(chain.get_balance(AccId(5)), 0);
        assert_eq!(chain.get_last_hash(AccId(5)), Hash::ZERO);
        assert_eq!(chain.get_last_txn(AccId(5)), None);
    }

    #[test]
    fn receiver_side_input_tracked_as_unspent_until_consumed() {
        let chain = Chain::new();
        let input = txn(1, 0, 20, 1000, -1000, Hash::ZERO);
        chain.put_to(AccId(20), &[input.clone()]);
        assert_eq!(chain.get_balance(AccId(20)), 1000);
        assert_eq!(chain.list_unspent_txns(AccId(20)), vec![input]);

        // Account 20 later spends it by sending 400 onward.
        let output = txn(1, 20, 30, 400, 600, Hash::ZERO);
        let mut spent_input = txn(1, 0, 20, 1000, -1000, Hash::ZERO);
        spent_input.spent_by = Id(1);
        chain.put_to(AccId(20), &[output, spent_input]);

        assert_eq!(chain.list_unspent_txns(AccId(20)), Vec::new());
        assert_eq!(chain.get_balance(AccId(20)), 600);
    }

    #[test]
    fn retention_trims_entries_older_than_three() {
        let chain = Chain::new();
        let mut prev = Hash::ZERO;
        for id in 1..=5u64 {
            let t = txn(id, 1, 2, 10, 100 - id as i64 * 10, prev);
            prev = t.hash;
            chain.put_to(AccId(1), &[t]);
        }
        let recent = chain.get_last_n_txns(AccId(1), 10);
        let ids: Vec<u64> = recent.iter().map(|t| t.id.0).collect();
        assert!(ids.iter().all(|&id| id >= 2));
        assert!(ids.len() <= 4);
    }

    #[test]
    fn reset_drops_cached_state() {
        let chain = Chain::new();
        chain.put_to(AccId(1), &[txn(1, 1, 2, 10, -10, Hash::ZERO)]);
        chain.reset(AccId(1));
        assert_eq!(chain.get_last_txn(AccId(1)), None);
        assert_eq!(chain.get_balance(AccId(1)), 0);
    }
}
