//! Settings-update lifecycle: preload, verify signature and hash continuity,
//! assign the next generation id, push, commit. Mirrors `qdp-processor`'s
//! transfer lifecycle but without batching or idempotence suppression.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::instrument;

use qdp_bigchain::BigChain;
use qdp_preloader::Preloader;
use qdp_primitives::{verify_hash, AccId, Id, Settings, SettingsId, SettingsPusher};
use qdp_processor::ProcessorError;
use qdp_settings_chain::SettingsChain;

/// Mirrors `Processor`'s lifecycle for settings updates: simpler, since
/// there is no batching and no idempotence check.
pub struct SettingsProcessor<B> {
    shard_lock: AsyncMutex<()>,
    settings_chain: Arc<SettingsChain>,
    preloader: Arc<Preloader<B>>,
    pusher: Option<Arc<dyn SettingsPusher>>,
    push_duration: Option<prometheus::Histogram>,
}

impl<B: BigChain + 'static> SettingsProcessor<B> {
    pub fn new(
        settings_chain: Arc<SettingsChain>,
        preloader: Arc<Preloader<B>>,
        pusher: Option<Arc<dyn SettingsPusher>>,
    ) -> Self {
        SettingsProcessor {
            shard_lock: AsyncMutex::new(()),
            settings_chain,
            preloader,
            pusher,
            push_duration: None,
        }
    }

    /// Attaches a histogram that observes the wall time of each downstream
    /// `pusher.push_settings` call.
    pub fn with_push_duration(mut self, histogram: prometheus::Histogram) -> Self {
        self.push_duration = Some(histogram);
        self
    }

    #[instrument(skip(self, request), fields(account = %request.account))]
    pub async fn process_settings(
        &self,
        mut request: Settings,
        deadline: Option<Instant>,
    ) -> Result<(SettingsId, qdp_primitives::Hash), ProcessorError> {
        let _guard = self.shard_lock.lock().await;
        self.preloader.preload(request.account, deadline).await?;

        let last = self.settings_chain.get_last_settings(request.account);

        if let Some(last) = &last {
            if !last.public_key.is_empty() {
                let request_hash = request.request_hash();
                if !verify_hash(&request.sign, &request_hash, &last.public_key) {
                    return Err(ProcessorError::InvalidSign);
                }
            } else if !request.sign.is_zero() {
                return Err(ProcessorError::InvalidSign);
            }
        } else if !request.sign.is_zero() {
            return Err(ProcessorError::InvalidSign);
        }

        let last_hash = last.as_ref().map(|s| s.hash).unwrap_or(qdp_primitives::Hash::ZERO);
        if last_hash != request.prev_hash {
            return Err(ProcessorError::InvalidSettingsPrevHash);
        }

        request.id = Id(last.as_ref().map(|s| s.id.0).unwrap_or(0) + 1);
        request.hash = request.canonical_hash();

        if let Some(pusher) = &self.pusher {
            let started = Instant::now();
            let result = pusher.push_settings(&request).await;
            if let Some(histogram) = &self.push_duration {
                histogram.observe(started.elapsed().as_secs_f64());
            }
            if let Err(err) = result {
                self.preloader.reset(request.account);
                return Err(ProcessorError::Push(err));
            }
        }

        self.settings_chain.put(request.clone());

        Ok((SettingsId::new(request.account, request.id), request.hash))
    }

    #[instrument(skip(self))]
    pub async fn get_last_settings(
        &self,
        acc: AccId,
        deadline: Option<Instant>,
    ) -> Result<Option<Settings>, ProcessorError> {
        let _guard = self.shard_lock.lock().await;
        self.preloader.preload(acc, deadline).await?;
        Ok(self.settings_chain.get_last_settings(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdp_bigchain::InMemoryBigChain;
    use qdp_chain::Chain;

    fn settings_processor() -> SettingsProcessor<InMemoryBigChain> {
        let chain = Arc::new(Chain::new());
        let settings_chain = Arc::new(SettingsChain::new());
        let bigchain = Arc::new(InMemoryBigChain::new());
        let gauge = prometheus::IntGauge::new("test_accounts_cached", "help").unwrap();
        let preloader = Arc::new(Preloader::new(bigchain, chain, settings_chain.clone(), gauge));
        SettingsProcessor::new(settings_chain, preloader, None)
    }

    // Scenario 4: fresh settings for an account with no prior generation,
    // empty prev_hash and no public key.
    #[tokio::test]
    async fn fresh_settings_assigns_first_generation() {
        let p = settings_processor();
        let request = Settings {
            id: Id(0),
            account: AccId(10),
            public_key: qdp_primitives::PublicKey(vec![]),
            prev_hash: qdp_primitives::Hash::ZERO,
            hash: qdp_primitives::Hash::ZERO,
            verify_transfer_sign: false,
            data_hash: qdp_primitives::Hash::ZERO,
            sign: qdp_primitives::Sign::ZERO,
        };
        let (settings_id, _hash) = p.process_settings(request, None).await.unwrap();
        assert_eq!(settings_id, SettingsId::new(AccId(10), Id(1)));
    }

    #[tokio::test]
    async fn second_generation_must_chain_off_first_hash() {
        let p = settings_processor();
        let first = Settings {
            id: Id(0),
            account: AccId(10),
            public_key: qdp_primitives::PublicKey(vec![]),
            prev_hash: qdp_primitives::Hash::ZERO,
            hash: qdp_primitives::Hash::ZERO,
            verify_transfer_sign: false,
            data_hash: qdp_primitives::Hash::ZERO,
            sign: qdp_primitives::Sign::ZERO,
        };
        let (_, first_hash) = p.process_settings(first, None).await.unwrap();

        let bogus = Settings {
            id: Id(0),
            account: AccId(10),
            public_key: qdp_primitives::PublicKey(vec![]),
            prev_hash: qdp_primitives::Hash::ZERO,
            hash: qdp_primitives::Hash::ZERO,
            verify_transfer_sign: false,
            data_hash: qdp_primitives::Hash::ZERO,
            sign: qdp_primitives::Sign::ZERO,
        };
        let err = p.process_settings(bogus, None).await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidSettingsPrevHash));

        let next = Settings {
            id: Id(0),
            account: AccId(10),
            public_key: qdp_primitives::PublicKey(vec![]),
            prev_hash: first_hash,
            hash: qdp_primitives::Hash::ZERO,
            verify_transfer_sign: false,
            data_hash: qdp_primitives::Hash::ZERO,
            sign: qdp_primitives::Sign::ZERO,
        };
        let (settings_id, _) = p.process_settings(next, None).await.unwrap();
        assert_eq!(settings_id, SettingsId::new(AccId(10), Id(2)));
    }
}
