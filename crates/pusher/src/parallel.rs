use async_trait::async_trait;
use futures::future::try_join_all;

use qdp_primitives::{Pusher, PusherError, Settings, SettingsPusher, Txn};

/// Pushes the same batch to every sub-pusher concurrently, failing on the
/// first error any of them returns.
pub struct Parallel {
    list: Vec<std::sync::Arc<dyn Pusher>>,
}

impl Parallel {
    pub fn new(list: Vec<std::sync::Arc<dyn Pusher>>) -> Self {
        Parallel { list }
    }
}

#[async_trait]
impl Pusher for Parallel {
    async fn push(&self, txns: &[Txn]) -> Result<(), PusherError> {
        let futs = self.list.iter().map(|p| p.push(txns));
        try_join_all(futs)
            .await
            .map_err(|e| PusherError::new(format!("multipush failed: {e}")))?;
        Ok(())
    }
}

pub struct SettingsParallel {
    list: Vec<std::sync::Arc<dyn SettingsPusher>>,
}

impl SettingsParallel {
    pub fn new(list: Vec<std::sync::Arc<dyn SettingsPusher>>) -> Self {
        SettingsParallel { list }
    }
}

#[async_trait]
impl SettingsPusher for SettingsParallel {
    async fn push_settings(&self, settings: &Settings) -> Result<(), PusherError> {
        let futs = self.list.iter().map(|p| p.push_settings(settings));
        try_join_all(futs)
            .await
            .map_err(|e| PusherError::new(format!("multipush failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingPusher(Arc<AtomicUsize>);

    #[async_trait]
    impl Pusher for CountingPusher {
        async fn push(&self, _txns: &[Txn]) -> Result<(), PusherError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn pushes_to_every_sub_pusher() {
        let calls = Arc::new(AtomicUsize::new(0));
        let par = Parallel::new(vec![
            Arc::new(CountingPusher(calls.clone())),
            Arc::new(CountingPusher(calls.clone())),
            Arc::new(CountingPusher(calls.clone())),
        ]);
        par.push(&[]).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
