//! Trait boundary toward the durable, transactional store. The real store is
//! a SQL-backed service outside this core; callers only see `BigChain`, plus
//! an in-memory stub useful for tests and for seeding a fresh node.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use qdp_primitives::{AccId, Settings, Txn};

#[derive(Debug, thiserror::Error)]
pub enum BigChainError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
}

/// The only point of truth: when local state might be inconsistent, the
/// core drops it and re-fetches from here.
#[async_trait]
pub trait BigChain: Send + Sync {
    /// Returns up to `limit` of the most recent output txns for `acc`
    /// (newest first) and its current settings, if any.
    async fn fetch(
        &self,
        acc: AccId,
        limit: usize,
    ) -> Result<(Vec<Txn>, Option<Settings>), BigChainError>;
}

#[derive(Default)]
struct AccountRecord {
    txns: Vec<Txn>,
    settings: Option<Settings>,
}

/// An in-memory `BigChain` for tests and local development. Not a
/// replacement for the durable store: state is lost on restart.
#[derive(Default)]
pub struct InMemoryBigChain {
    accounts: Mutex<HashMap<AccId, AccountRecord>>,
}

impl InMemoryBigChain {
    pub fn new() -> Self {
        InMemoryBigChain {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Seeds `acc`'s durable txn history, newest first.
    pub fn seed_txns(&self, acc: AccId, txns: Vec<Txn>) {
        let mut accounts = self.accounts.lock().expect("bigchain mutex poisoned");
        accounts.entry(acc).or_default().txns = txns;
    }

    pub fn seed_settings(&self, settings: Settings) {
        let mut accounts = self.accounts.lock().expect("bigchain mutex poisoned");
        accounts.entry(settings.account).or_default().settings = Some(settings);
    }
}

#[async_trait]
impl BigChain for InMemoryBigChain {
    async fn fetch(
        &self,
        acc: AccId,
        limit: usize,
    ) -> Result<(Vec<Txn>, Option<Settings>), BigChainError> {
        let accounts = self.accounts.lock().expect("bigchain mutex poisoned");
        let Some(record) = accounts.get(&acc) else {
            return Ok((Vec::new(), None));
        };
        Ok((
            record.txns.iter().take(limit).cloned().collect(),
            record.settings.clone(),
        ))
    }
}
