//! Lazily hydrates a cold account from the durable store, with at-most-one
//! concurrent fetch per account. The source uses `singleflight.Group`; here
//! the leader's fetch runs as a detached `tokio::spawn`'d task shared via a
//! `futures::future::Shared`, so one caller's cancellation never aborts a
//! fetch other callers are waiting on.

pub mod error;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::future::{FutureExt, Shared};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{instrument, warn};

use qdp_bigchain::BigChain;
use qdp_chain::Chain;
use qdp_primitives::AccId;
use qdp_settings_chain::SettingsChain;
use std::collections::HashMap;

pub use error::PreloaderError;

/// Most recent output txns fetched per account on a cold load, mirroring the
/// source's default.
pub const DEFAULT_MAX_TRANSACTIONS: usize = 5;

type SharedFetch = Shared<Pin<Box<dyn Future<Output = Result<(), PreloaderError>> + Send>>>;

pub struct Preloader<B> {
    bigchain: Arc<B>,
    chain: Arc<Chain>,
    settings_chain: Arc<SettingsChain>,
    preloaded: Mutex<HashSet<AccId>>,
    inflight: AsyncMutex<HashMap<AccId, SharedFetch>>,
    accounts_cached: prometheus::IntGauge,
    preload_duration: Option<prometheus::Histogram>,
    max_transactions: usize,
}

impl<B: BigChain + 'static> Preloader<B> {
    pub fn new(
        bigchain: Arc<B>,
        chain: Arc<Chain>,
        settings_chain: Arc<SettingsChain>,
        accounts_cached: prometheus::IntGauge,
    ) -> Self {
        Preloader {
            bigchain,
            chain,
            settings_chain,
            preloaded: Mutex::new(HashSet::new()),
            inflight: AsyncMutex::new(HashMap::new()),
            accounts_cached,
            preload_duration: None,
            max_transactions: DEFAULT_MAX_TRANSACTIONS,
        }
    }

    /// Attaches a histogram that observes the wall time of each cold fetch
    /// (the leader's `BigChain::fetch`, not cache-hit calls to `preload`).
    pub fn with_preload_duration(mut self, histogram: prometheus::Histogram) -> Self {
        self.preload_duration = Some(histogram);
        self
    }

    /// Fast path: returns immediately if `acc` is already cached. Otherwise
    /// joins (or starts) the single-flight fetch for `acc`. `deadline`, if
    /// given, bounds only the leader's fetch — it is the absolute deadline
    /// of whichever caller triggers the fetch, not of this particular call.
    #[instrument(skip(self))]
    pub async fn preload(&self, acc: AccId, deadline: Option<Instant>) -> Result<(), PreloaderError> {
        if self.preloaded.lock().expect("preloaded set poisoned").contains(&acc) {
            return Ok(());
        }

        let fut = self.join_or_start(acc, deadline).await;
        let result = fut.await;
        self.inflight.lock().await.remove(&acc);

        match &result {
            Ok(()) => {
                let mut preloaded = self.preloaded.lock().expect("preloaded set poisoned");
                preloaded.insert(acc);
                self.accounts_cached.set(preloaded.len() as i64);
            }
            Err(err) => warn!(%acc, %err, "preload failed"),
        }
        result
    }

    async fn join_or_start(&self, acc: AccId, deadline: Option<Instant>) -> SharedFetch {
        let mut inflight = self.inflight.lock().await;
        if let Some(fut) = inflight.get(&acc) {
            return fut.clone();
        }

        let bigchain = self.bigchain.clone();
        let chain = self.chain.clone();
        let settings_chain = self.settings_chain.clone();
        let max_transactions = self.max_transactions;
        let preload_duration = self.preload_duration.clone();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result =
                fetch_and_install(bigchain, chain, settings_chain, acc, max_transactions, deadline).await;
            if let Some(histogram) = &preload_duration {
                histogram.observe(started.elapsed().as_secs_f64());
            }
            result
        });

        let shared: SharedFetch = (Box::pin(async move {
            match handle.await {
                Ok(result) => result,
                Err(_) => Err(PreloaderError::Internal("preload task panicked".into())),
            }
        }) as Pin<Box<dyn Future<Output = Result<(), PreloaderError>> + Send>>)
            .shared();

        inflight.insert(acc, shared.clone());
        shared
    }

    /// Removes `acc` from the preloaded set and drops its cached chain and
    /// settings state. Called whenever a push failure leaves local state
    /// possibly ahead of truth.
    pub fn reset(&self, acc: AccId) {
        self.preloaded.lock().expect("preloaded set poisoned").remove(&acc);
        self.chain.reset(acc);
        self.settings_chain.reset(acc);
    }
}

async fn fetch_and_install<B: BigChain>(
    bigchain: Arc<B>,
    chain: Arc<Chain>,
    settings_chain: Arc<SettingsChain>,
    acc: AccId,
    max_transactions: usize,
    deadline: Option<Instant>,
) -> Result<(), PreloaderError> {
    let fetch = bigchain.fetch(acc, max_transactions);
    let (txns, settings) = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fetch)
            .await
            .map_err(|_| PreloaderError::Timeout)??,
        None => fetch.await?,
    };

    if !txns.is_empty() {
        chain.put_to(acc, &txns);
    }
    if let Some(settings) = settings {
        settings_chain.put(settings);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdp_bigchain::InMemoryBigChain;
    use qdp_primitives::{Hash, Id, Sign, Txn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gauge() -> prometheus::IntGauge {
        prometheus::IntGauge::new("test_accounts_cached", "help").unwrap()
    }

    fn txn(id: u64, sender: u64, receiver: u64) -> Txn {
        Txn {
            id: Id(id),
            sender: AccId(sender),
            receiver: AccId(receiver),
            amount: 10,
            balance: -10,
            settings_id: Id(0),
            spent_by: Id(0),
            prev_hash: Hash::ZERO,
            hash: Hash::ZERO,
            sign: Sign::ZERO,
        }
    }

    #[tokio::test]
    async fn preload_installs_chain_and_is_idempotent() {
        let store = Arc::new(InMemoryBigChain::new());
        store.seed_txns(AccId(1), vec![txn(1, 1, 2)]);
        let chain = Arc::new(Chain::new());
        let settings_chain = Arc::new(SettingsChain::new());
        let preloader = Preloader::new(store.clone(), chain.clone(), settings_chain, gauge());

        preloader.preload(AccId(1), None).await.unwrap();
        assert_eq!(chain.get_last_txn(AccId(1)).map(|t| t.id), Some(Id(1)));

        // Reset then preload again re-fetches.
        preloader.reset(AccId(1));
        assert_eq!(chain.get_last_txn(AccId(1)), None);
        preloader.preload(AccId(1), None).await.unwrap();
        assert_eq!(chain.get_last_txn(AccId(1)).map(|t| t.id), Some(Id(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_preloads_fetch_exactly_once() {
        struct CountingBigChain {
            inner: InMemoryBigChain,
            fetches: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl BigChain for CountingBigChain {
            async fn fetch(
                &self,
                acc: AccId,
                limit: usize,
            ) -> Result<(Vec<Txn>, Option<qdp_primitives::Settings>), qdp_bigchain::BigChainError>
            {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                self.inner.fetch(acc, limit).await
            }
        }

        let store = Arc::new(CountingBigChain {
            inner: InMemoryBigChain::new(),
            fetches: AtomicUsize::new(0),
        });
        store.inner.seed_txns(AccId(7), vec![txn(1, 7, 8)]);

        let chain = Arc::new(Chain::new());
        let settings_chain = Arc::new(SettingsChain::new());
        let preloader = Arc::new(Preloader::new(store.clone(), chain, settings_chain, gauge()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let preloader = preloader.clone();
            handles.push(tokio::spawn(async move {
                preloader.preload(AccId(7), None).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }
}
