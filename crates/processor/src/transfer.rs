use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::instrument;

use qdp_bigchain::BigChain;
use qdp_chain::Chain;
use qdp_preloader::Preloader;
use qdp_primitives::{verify_hash, Id, Pusher, Transfer, TransferResult, Txn, TxnId};
use qdp_settings_chain::SettingsChain;

use crate::error::ProcessorError;

/// Handles `process_transfer`/`get_prev_hash`/`get_balance` for every account
/// hashing to one shard. The shard lock is an async mutex: per the
/// concurrency model the whole request — including the preload and push
/// suspension points — is serialized per shard.
pub struct Processor<B> {
    shard_lock: AsyncMutex<()>,
    chain: Arc<Chain>,
    settings_chain: Arc<SettingsChain>,
    preloader: Arc<Preloader<B>>,
    pusher: Option<Arc<dyn Pusher>>,
    push_duration: Option<prometheus::Histogram>,
}

impl<B: BigChain + 'static> Processor<B> {
    pub fn new(
        chain: Arc<Chain>,
        settings_chain: Arc<SettingsChain>,
        preloader: Arc<Preloader<B>>,
        pusher: Option<Arc<dyn Pusher>>,
    ) -> Self {
        Processor {
            shard_lock: AsyncMutex::new(()),
            chain,
            settings_chain,
            preloader,
            pusher,
            push_duration: None,
        }
    }

    /// Attaches a histogram that observes the wall time of each downstream
    /// `pusher.push` call.
    pub fn set_push_duration(&mut self, histogram: prometheus::Histogram) {
        self.push_duration = Some(histogram);
    }

    #[instrument(skip(self, transfer), fields(sender = %transfer.sender))]
    pub async fn process_transfer(
        &self,
        transfer: Transfer,
        deadline: Option<Instant>,
    ) -> Result<TransferResult, ProcessorError> {
        if transfer.batch.is_empty() {
            return Err(ProcessorError::NoReceivers);
        }

        let _guard = self.shard_lock.lock().await;
        self.preloader.preload(transfer.sender, deadline).await?;

        let last = self.chain.get_last_txn(transfer.sender);
        let last_hash = self.chain.get_last_hash(transfer.sender);

        if let Some(replay) = self.check_idempotence(&transfer, last.as_ref()) {
            return Ok(replay);
        }

        let sett = self.settings_chain.get_last_settings(transfer.sender);
        let reply_settings_id = sett.as_ref().map(|s| s.id).unwrap_or(Id(0));

        if let Some(sett) = &sett {
            if transfer.settings_id != sett.id {
                return Err(ProcessorError::InvalidSettingsId);
            }
            if !sett.public_key.is_empty() {
                let transfer_hash = transfer.request_hash();
                if !verify_hash(&transfer.sign, &transfer_hash, &sett.public_key) {
                    return Err(ProcessorError::InvalidSign);
                }
            } else if !transfer.sign.is_zero() {
                return Err(ProcessorError::InvalidSign);
            }
        } else if !transfer.sign.is_zero() {
            return Err(ProcessorError::InvalidSign);
        }

        if last_hash != transfer.prev_hash {
            return Err(ProcessorError::InvalidPrevHash);
        }

        let mut balance = self.chain.get_balance(transfer.sender);
        let mut txns = Vec::with_capacity(transfer.batch.len());
        for item in &transfer.batch {
            balance -= item.amount;
            if transfer.sender != qdp_primitives::MINT_ACCOUNT && balance < 0 {
                return Err(ProcessorError::NoBalance);
            }
            txns.push(Txn {
                id: Id(0),
                sender: transfer.sender,
                receiver: item.receiver,
                amount: item.amount,
                balance,
                settings_id: transfer.settings_id,
                spent_by: Id(0),
                prev_hash: qdp_primitives::Hash::ZERO,
                hash: qdp_primitives::Hash::ZERO,
                sign: qdp_primitives::Sign::ZERO,
            });
        }

        let mut id = last.as_ref().map(|t| t.id.0).unwrap_or(0);
        for txn in txns.iter_mut() {
            id += 1;
            txn.id = Id(id);
        }
        chain_hashes(&mut txns, transfer.prev_hash);
        txns[0].sign = transfer.sign;

        let first_new_id = last.as_ref().map(|t| t.id.0).unwrap_or(0) + 1;
        let mut inputs = self.chain.list_unspent_txns(transfer.sender);
        for input in &mut inputs {
            input.spent_by = Id(first_new_id);
        }

        let mut combined = txns.clone();
        combined.extend(inputs);

        if let Some(pusher) = &self.pusher {
            let started = Instant::now();
            let result = pusher.push(&combined).await;
            if let Some(histogram) = &self.push_duration {
                histogram.observe(started.elapsed().as_secs_f64());
            }
            if let Err(err) = result {
                self.preloader.reset(transfer.sender);
                return Err(ProcessorError::Push(err));
            }
        }

        self.chain.put_to(transfer.sender, &combined);

        Ok(TransferResult {
            txn_id: TxnId::new(transfer.sender, Id(first_new_id)),
            hash: txns[txns.len() - 1].hash,
            settings_id: reply_settings_id,
        })
    }

    /// Replay suppression for a batch identical to the most recently
    /// committed one. Multi-item batches compare against the chain tail in
    /// reverse: the tail's newest entry mirrors the batch's last item, the
    /// tail's oldest retained entry mirrors the batch's first.
    fn check_idempotence(&self, transfer: &Transfer, last: Option<&Txn>) -> Option<TransferResult> {
        let last = last?;

        if transfer.batch.len() == 1 {
            let item = &transfer.batch[0];
            if transfer.prev_hash == last.prev_hash
                && transfer.settings_id == last.settings_id
                && item.receiver == last.receiver
                && item.amount == last.amount
            {
                return Some(TransferResult {
                    txn_id: TxnId::new(transfer.sender, last.id),
                    hash: self.chain.get_last_hash(transfer.sender),
                    settings_id: transfer.settings_id,
                });
            }
            return None;
        }

        let k = transfer.batch.len();
        let prev = self.chain.get_last_n_txns(transfer.sender, k);
        if prev.len() != k {
            return None;
        }

        let oldest = &prev[k - 1];
        if oldest.prev_hash != transfer.prev_hash || oldest.settings_id != transfer.settings_id {
            return None;
        }

        for i in 0..k {
            let batch_item = &transfer.batch[k - 1 - i];
            if prev[i].receiver != batch_item.receiver || prev[i].amount != batch_item.amount {
                return None;
            }
        }

        Some(TransferResult {
            txn_id: TxnId::new(transfer.sender, oldest.id),
            hash: prev[0].hash,
            settings_id: transfer.settings_id,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_prev_hash(
        &self,
        acc: qdp_primitives::AccId,
        deadline: Option<Instant>,
    ) -> Result<qdp_primitives::Hash, ProcessorError> {
        let _guard = self.shard_lock.lock().await;
        self.preloader.preload(acc, deadline).await?;
        Ok(self.chain.get_last_hash(acc))
    }

    #[instrument(skip(self))]
    pub async fn get_balance(
        &self,
        acc: qdp_primitives::AccId,
        deadline: Option<Instant>,
    ) -> Result<i64, ProcessorError> {
        let _guard = self.shard_lock.lock().await;
        self.preloader.preload(acc, deadline).await?;
        Ok(self.chain.get_balance(acc))
    }
}

/// Links `prev_hash`/`hash` top to bottom: the first txn's predecessor is
/// the request's `prev_hash`, every following one chains off the previous
/// txn's freshly computed hash.
fn chain_hashes(txns: &mut [Txn], batch_prev_hash: qdp_primitives::Hash) {
    let mut prev = batch_prev_hash;
    for txn in txns.iter_mut() {
        txn.prev_hash = prev;
        txn.hash = txn.canonical_hash();
        prev = txn.hash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdp_bigchain::InMemoryBigChain;
    use qdp_primitives::{AccId, MINT_ACCOUNT, TransferItem, TxnId};

    fn processor() -> Processor<InMemoryBigChain> {
        let chain = Arc::new(Chain::new());
        let settings_chain = Arc::new(SettingsChain::new());
        let bigchain = Arc::new(InMemoryBigChain::new());
        let gauge = prometheus::IntGauge::new("test_accounts_cached", "help").unwrap();
        let preloader = Arc::new(Preloader::new(bigchain, chain.clone(), settings_chain.clone(), gauge));
        Processor::new(chain, settings_chain, preloader, None)
    }

    // Scenario 1: fresh mint account, single-item batch, empty prev_hash.
    #[tokio::test]
    async fn fresh_mint_transfer_assigns_first_id() {
        let p = processor();
        let transfer = Transfer::single(MINT_ACCOUNT, AccId(20), 1000);
        let result = p.process_transfer(transfer, None).await.unwrap();
        assert_eq!(result.txn_id, TxnId::new(MINT_ACCOUNT, Id(1)));
    }

    // Scenario 2: chain of two single-item batches from the same sender.
    #[tokio::test]
    async fn chained_transfers_link_prev_hash() {
        let p = processor();
        let first = p
            .process_transfer(Transfer::single(MINT_ACCOUNT, AccId(20), 1000), None)
            .await
            .unwrap();

        let second = Transfer {
            sender: MINT_ACCOUNT,
            batch: vec![TransferItem { receiver: AccId(30), amount: 1000 }],
            sign: qdp_primitives::Sign::ZERO,
            prev_hash: first.hash,
            settings_id: Id(0),
        };
        let result = p.process_transfer(second, None).await.unwrap();
        assert_eq!(result.txn_id, TxnId::new(MINT_ACCOUNT, Id(2)));
        assert_eq!(p.get_prev_hash(MINT_ACCOUNT, None).await.unwrap(), result.hash);
    }

    // Scenario 3: account preloaded from the durable store with an existing
    // head, then a new single-item batch spends against it.
    #[tokio::test]
    async fn preloaded_account_continues_existing_chain() {
        let chain = Arc::new(Chain::new());
        let settings_chain = Arc::new(SettingsChain::new());
        let bigchain = Arc::new(InMemoryBigChain::new());
        bigchain.seed_txns(
            AccId(10),
            vec![Txn {
                id: Id(1),
                sender: AccId(10),
                receiver: AccId(20),
                amount: 100,
                balance: 1000,
                settings_id: Id(0),
                spent_by: Id(0),
                prev_hash: qdp_primitives::Hash::ZERO,
                hash: qdp_primitives::Hash::ZERO,
                sign: qdp_primitives::Sign::ZERO,
            }],
        );
        let gauge = prometheus::IntGauge::new("test_accounts_cached", "help").unwrap();
        let preloader = Arc::new(Preloader::new(bigchain, chain.clone(), settings_chain.clone(), gauge));
        let p = Processor::new(chain, settings_chain, preloader, None);

        let head_hash = p.get_prev_hash(AccId(10), None).await.unwrap();
        let transfer = Transfer {
            sender: AccId(10),
            batch: vec![TransferItem { receiver: AccId(30), amount: 10 }],
            sign: qdp_primitives::Sign::ZERO,
            prev_hash: head_hash,
            settings_id: Id(0),
        };
        let result = p.process_transfer(transfer, None).await.unwrap();
        assert_eq!(result.txn_id, TxnId::new(AccId(10), Id(2)));
        assert_eq!(p.get_balance(AccId(10), None).await.unwrap(), 990);
    }

    // Scenario 5: resubmitting the exact same request replays the first
    // response instead of appending a new txn.
    #[tokio::test]
    async fn duplicate_request_is_idempotent() {
        let p = processor();
        let transfer = Transfer::single(MINT_ACCOUNT, AccId(20), 1000);
        let first = p.process_transfer(transfer.clone(), None).await.unwrap();
        let replay = p.process_transfer(transfer, None).await.unwrap();
        assert_eq!(replay.txn_id, first.txn_id);
        assert_eq!(replay.hash, first.hash);
        assert_eq!(p.chain.get_last_n_txns(MINT_ACCOUNT, 10).len(), 1);
    }

    // Scenario 6: a request whose prev_hash doesn't match the chain head.
    #[tokio::test]
    async fn mismatched_prev_hash_is_rejected() {
        let p = processor();
        p.process_transfer(Transfer::single(MINT_ACCOUNT, AccId(20), 1000), None)
            .await
            .unwrap();

        let bogus = Transfer {
            sender: MINT_ACCOUNT,
            batch: vec![TransferItem { receiver: AccId(30), amount: 1000 }],
            sign: qdp_primitives::Sign::ZERO,
            prev_hash: qdp_primitives::Hash([0x10; 32]),
            settings_id: Id(0),
        };
        let err = p.process_transfer(bogus, None).await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidPrevHash));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let p = processor();
        let transfer = Transfer {
            sender: AccId(1),
            batch: vec![],
            sign: qdp_primitives::Sign::ZERO,
            prev_hash: qdp_primitives::Hash::ZERO,
            settings_id: Id(0),
        };
        let err = p.process_transfer(transfer, None).await.unwrap_err();
        assert!(matches!(err, ProcessorError::NoReceivers));
    }
}
