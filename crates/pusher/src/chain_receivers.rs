use std::sync::Arc;

use async_trait::async_trait;

use qdp_chain::Chain;
use qdp_primitives::{Pusher, PusherError, Txn};

/// Installs each txn directly into its receiver's chain, in process.
/// Used for the local shard's own accounts instead of going out over the
/// network for a push that never leaves the node.
pub struct ChainReceivers {
    chain: Arc<Chain>,
}

impl ChainReceivers {
    pub fn new(chain: Arc<Chain>) -> Self {
        ChainReceivers { chain }
    }
}

#[async_trait]
impl Pusher for ChainReceivers {
    async fn push(&self, txns: &[Txn]) -> Result<(), PusherError> {
        for (i, txn) in txns.iter().enumerate() {
            self.chain.put_to(txn.receiver, &txns[i..i + 1]);
        }
        Ok(())
    }
}
