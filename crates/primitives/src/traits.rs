//! Interfaces shared across crate boundaries, collected here the way the
//! source keeps every service interface in one place alongside the data
//! types they operate on.

use async_trait::async_trait;

use crate::settings::Settings;
use crate::txn::Txn;

#[derive(Debug, Clone, thiserror::Error)]
#[error("push failed: {0}")]
pub struct PusherError(pub String);

impl PusherError {
    pub fn new(msg: impl Into<String>) -> Self {
        PusherError(msg.into())
    }
}

/// Pushes a combined batch of output txns and newly-spent inputs to whatever
/// sinks are configured (durable store, receiver shards, ...).
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(&self, txns: &[Txn]) -> Result<(), PusherError>;
}

/// Pushes a settings update to whatever sinks are configured.
#[async_trait]
pub trait SettingsPusher: Send + Sync {
    async fn push_settings(&self, settings: &Settings) -> Result<(), PusherError>;
}

/// Maps an account (or any string key) to the node responsible for it.
pub trait Router: Send + Sync {
    /// The host responsible for `key`, or empty if unknown.
    fn host_for_key(&self, key: &str) -> String;
    fn nodes(&self) -> Vec<String>;
    fn set_nodes(&self, nodes: Vec<String>);
    fn is_self(&self, host: &str) -> bool;
}
