use std::sync::Arc;

use tokio::time::Instant;

use qdp_bigchain::BigChain;
use qdp_chain::Chain;
use qdp_preloader::Preloader;
use qdp_primitives::{AccId, Hash, Pusher, Transfer, TransferResult};
use qdp_settings_chain::SettingsChain;

use crate::error::ProcessorError;
use crate::transfer::Processor;

pub const DEFAULT_SHARDS: usize = 997;

/// Fans requests out across `n` independent `Processor`s, each serializing
/// only the accounts that hash to its shard. All shards share the same
/// chain, settings chain, preloader and pusher; sharding only narrows the
/// lock an individual request has to wait on.
pub struct Multiprocessor<B> {
    shards: Vec<Arc<Processor<B>>>,
}

impl<B: BigChain + 'static> Multiprocessor<B> {
    pub fn new(
        n: usize,
        chain: Arc<Chain>,
        settings_chain: Arc<SettingsChain>,
        preloader: Arc<Preloader<B>>,
        pusher: Option<Arc<dyn Pusher>>,
    ) -> Self {
        assert!(n > 0, "multiprocessor needs at least one shard");
        let shards = (0..n)
            .map(|_| {
                Arc::new(Processor::new(
                    chain.clone(),
                    settings_chain.clone(),
                    preloader.clone(),
                    pusher.clone(),
                ))
            })
            .collect();
        Multiprocessor { shards }
    }

    /// Attaches a push-duration histogram to every shard. Must be called
    /// right after construction, before any `Arc<Multiprocessor<B>>` clone
    /// is handed out elsewhere.
    pub fn with_push_duration(mut self, histogram: prometheus::Histogram) -> Self {
        for shard in &mut self.shards {
            Arc::get_mut(shard)
                .expect("with_push_duration called after shards were shared")
                .set_push_duration(histogram.clone());
        }
        self
    }

    fn shard_for(&self, acc: AccId) -> &Processor<B> {
        &self.shards[(acc.0 as usize) % self.shards.len()]
    }

    pub async fn process_transfer(
        &self,
        transfer: Transfer,
        deadline: Option<Instant>,
    ) -> Result<TransferResult, ProcessorError> {
        self.shard_for(transfer.sender)
            .process_transfer(transfer, deadline)
            .await
    }

    pub async fn get_prev_hash(
        &self,
        acc: AccId,
        deadline: Option<Instant>,
    ) -> Result<Hash, ProcessorError> {
        self.shard_for(acc).get_prev_hash(acc, deadline).await
    }

    pub async fn get_balance(
        &self,
        acc: AccId,
        deadline: Option<Instant>,
    ) -> Result<i64, ProcessorError> {
        self.shard_for(acc).get_balance(acc, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdp_bigchain::InMemoryBigChain;
    use qdp_primitives::TransferItem;

    fn multiprocessor(n: usize) -> Multiprocessor<InMemoryBigChain> {
        let chain = Arc::new(Chain::new());
        let settings_chain = Arc::new(SettingsChain::new());
        let bigchain = Arc::new(InMemoryBigChain::new());
        let gauge = prometheus::IntGauge::new("test_accounts_cached", "help").unwrap();
        let preloader = Arc::new(Preloader::new(bigchain, chain.clone(), settings_chain.clone(), gauge));
        Multiprocessor::new(n, chain, settings_chain, preloader, None)
    }

    #[tokio::test]
    async fn routes_same_account_to_same_shard() {
        let mp = multiprocessor(8);
        let sender = AccId(0);
        let transfer = Transfer::single(sender, AccId(20), 1000);
        let first = mp.process_transfer(transfer, None).await.unwrap();

        let second_item = TransferItem { receiver: AccId(30), amount: 500 };
        let second = Transfer {
            sender,
            batch: vec![second_item],
            sign: qdp_primitives::Sign::ZERO,
            prev_hash: first.hash,
            settings_id: qdp_primitives::Id(0),
        };
        let result = mp.process_transfer(second, None).await.unwrap();
        assert_eq!(mp.get_balance(sender, None).await.unwrap(), -1500);
        assert_eq!(mp.get_prev_hash(sender, None).await.unwrap(), result.hash);
    }

    #[tokio::test]
    async fn independent_accounts_do_not_interfere() {
        let mp = multiprocessor(4);
        let a = Transfer::single(qdp_primitives::MINT_ACCOUNT, AccId(100), 50);
        let b = Transfer::single(qdp_primitives::MINT_ACCOUNT, AccId(200), 75);
        mp.process_transfer(a, None).await.unwrap();
        let mint_balance_after_a = mp.get_balance(qdp_primitives::MINT_ACCOUNT, None).await.unwrap();
        mp.process_transfer(b, None).await.unwrap();
        let mint_balance_after_b = mp.get_balance(qdp_primitives::MINT_ACCOUNT, None).await.unwrap();
        assert_eq!(mint_balance_after_a, -50);
        assert_eq!(mint_balance_after_b, -125);
    }
}
