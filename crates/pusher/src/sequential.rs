use async_trait::async_trait;

use qdp_primitives::{Pusher, PusherError, Settings, SettingsPusher, Txn};

/// Pushes to subsequent pushers one at a time. If one fails the rest
/// are not executed.
pub struct Sequential {
    list: Vec<std::sync::Arc<dyn Pusher>>,
}

impl Sequential {
    pub fn new(list: Vec<std::sync::Arc<dyn Pusher>>) -> Self {
        Sequential { list }
    }
}

#[async_trait]
impl Pusher for Sequential {
    async fn push(&self, txns: &[Txn]) -> Result<(), PusherError> {
        for p in &self.list {
            p.push(txns)
                .await
                .map_err(|e| PusherError::new(format!("seqpusher: {e}")))?;
        }
        Ok(())
    }
}

/// Settings counterpart of [`Sequential`].
pub struct SettingsSequential {
    list: Vec<std::sync::Arc<dyn SettingsPusher>>,
}

impl SettingsSequential {
    pub fn new(list: Vec<std::sync::Arc<dyn SettingsPusher>>) -> Self {
        SettingsSequential { list }
    }
}

#[async_trait]
impl SettingsPusher for SettingsSequential {
    async fn push_settings(&self, settings: &Settings) -> Result<(), PusherError> {
        for p in &self.list {
            p.push_settings(settings)
                .await
                .map_err(|e| PusherError::new(format!("seqpusher: {e}")))?;
        }
        Ok(())
    }
}
