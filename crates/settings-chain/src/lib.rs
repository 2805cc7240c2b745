//! Per-account settings history: same shape as `qdp-chain` but entries are
//! `Settings` records and retention is one generation (only the current and
//! immediately-previous settings are kept).

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use qdp_primitives::{AccId, Hash, Id, Settings};

pub const SETTINGS_RETENTION: u64 = 1;

#[derive(Default)]
pub struct SettingsChain {
    accounts: Mutex<HashMap<AccId, BTreeMap<Id, Settings>>>,
}

impl SettingsChain {
    pub fn new() -> Self {
        SettingsChain {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, settings: Settings) {
        let mut accounts = self.accounts.lock().expect("settings chain mutex poisoned");
        let history = accounts.entry(settings.account).or_default();

        if let Some(&head_id) = history.keys().next_back() {
            if head_id.0 > SETTINGS_RETENTION {
                let floor = head_id.0 - SETTINGS_RETENTION;
                history.retain(|id, _| id.0 > floor);
            }
        }
        history.insert(settings.id, settings);
    }

    pub fn get_last_settings(&self, acc: AccId) -> Option<Settings> {
        let accounts = self.accounts.lock().expect("settings chain mutex poisoned");
        accounts
            .get(&acc)
            .and_then(|h| h.values().next_back())
            .cloned()
    }

    /// Hash of the head settings record, computing and memoising it first if
    /// still zero. All-zero if the account has no settings history.
    pub fn get_last_hash(&self, acc: AccId) -> Hash {
        let mut accounts = self.accounts.lock().expect("settings chain mutex poisoned");
        let Some(history) = accounts.get_mut(&acc) else {
            return Hash::ZERO;
        };
        let Some(head) = history.values_mut().next_back() else {
            return Hash::ZERO;
        };
        head.hash_or_compute()
    }

    pub fn reset(&self, acc: AccId) {
        let mut accounts = self.accounts.lock().expect("settings chain mutex poisoned");
        accounts.remove(&acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdp_primitives::{PublicKey, Sign};

    fn settings(id: u64, account: u64, prev: Hash) -> Settings {
        Settings {
            id: Id(id),
            account: AccId(account),
            public_key: PublicKey(vec![]),
            prev_hash: prev,
            hash: Hash::ZERO,
            verify_transfer_sign: false,
            data_hash: Hash::ZERO,
            sign: Sign::ZERO,
        }
    }

    #[test]
    fn fresh_settings_has_no_prior_generation() {
        let chain = SettingsChain::new();
        assert_eq!(chain.get_last_settings(AccId(10)), None);
        assert_eq!(chain.get_last_hash(AccId(10)), Hash::ZERO);
    }

    #[test]
    fn put_tracks_head_and_retains_one_prior_generation() {
        let chain = SettingsChain::new();
        chain.put(settings(1, 10, Hash::ZERO));
        chain.put(settings(2, 10, Hash::ZERO));
        chain.put(settings(3, 10, Hash::ZERO));

        let head = chain.get_last_settings(AccId(10)).unwrap();
        assert_eq!(head.id, Id(3));

        let accounts = chain.accounts.lock().unwrap();
        let history = &accounts[&AccId(10)];
        assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![Id(2), Id(3)]);
    }
}
