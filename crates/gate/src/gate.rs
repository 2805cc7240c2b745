use std::sync::Arc;

use tokio::time::Instant;

use qdp_bigchain::BigChain;
use qdp_primitives::{AccId, Router};
use qdp_processor::Multiprocessor;
use qdp_settings_processor::SettingsProcessor;

use crate::codes::{Status, TransferCode};
use crate::validate::{
    settings_from_request, transfer_from_request, SettingsRequest, TransferRequest, ValidationError,
};

/// Entry point for user requests: checks routing ownership, validates the
/// wire request, delegates to the processors, and maps results/errors onto
/// wire status codes.
pub struct Gate<B> {
    processor: Arc<Multiprocessor<B>>,
    settings_processor: Arc<SettingsProcessor<B>>,
    router: Option<Arc<dyn Router>>,
}

#[derive(serde::Serialize)]
pub struct TransferResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    pub settings_id: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub txn_id: String,
    pub account: u64,
    pub id: u64,
}

#[derive(serde::Serialize)]
pub struct SettingsResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub settings_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

#[derive(serde::Serialize)]
pub struct HashResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

#[derive(serde::Serialize)]
pub struct BalanceResponse {
    pub status: Status,
    pub balance: i64,
}

impl<B: BigChain + 'static> Gate<B> {
    pub fn new(processor: Arc<Multiprocessor<B>>, settings_processor: Arc<SettingsProcessor<B>>) -> Self {
        Gate { processor, settings_processor, router: None }
    }

    pub fn set_router(&mut self, router: Arc<dyn Router>) {
        self.router = Some(router);
    }

    /// `None` if this node does not own `acc` and a redirect was written
    /// into the caller's slot; `Some(Status::ok())` otherwise.
    fn check_routing(&self, acc: AccId) -> Option<Status> {
        let Some(router) = &self.router else {
            return Some(Status::ok());
        };
        let node = router.host_for_key(&acc.0.to_string());
        if router.is_self(&node) {
            return Some(Status::ok());
        }
        None
    }

    fn see_other(&self, acc: AccId) -> Status {
        let router = self.router.as_ref().expect("see_other called without a router");
        let node = router.host_for_key(&acc.0.to_string());
        Status::see_other(node, router.nodes())
    }

    pub async fn process_transfer(
        &self,
        req: TransferRequest,
        deadline: Option<Instant>,
    ) -> TransferResponse {
        let sender = AccId(req.sender);
        if self.check_routing(sender).is_none() {
            return TransferResponse {
                status: self.see_other(sender),
                hash: String::new(),
                settings_id: 0,
                txn_id: String::new(),
                account: 0,
                id: 0,
            };
        }

        let transfer = match transfer_from_request(req) {
            Ok(t) => t,
            Err(err) => return bad_request_transfer(err),
        };

        match self.processor.process_transfer(transfer, deadline).await {
            Ok(result) => TransferResponse {
                status: Status::ok(),
                hash: result.hash.to_string(),
                settings_id: result.settings_id.0,
                txn_id: result.txn_id.to_string(),
                account: result.txn_id.acc.0,
                id: result.txn_id.id.0,
            },
            Err(err) => TransferResponse {
                status: Status::from_processor_error(&err),
                hash: String::new(),
                settings_id: 0,
                txn_id: String::new(),
                account: 0,
                id: 0,
            },
        }
    }

    pub async fn update_settings(
        &self,
        req: SettingsRequest,
        deadline: Option<Instant>,
    ) -> SettingsResponse {
        let account = AccId(req.account);
        if self.check_routing(account).is_none() {
            return SettingsResponse { status: self.see_other(account), settings_id: String::new(), hash: String::new() };
        }

        let settings = match settings_from_request(req) {
            Ok(s) => s,
            Err(err) => {
                return SettingsResponse {
                    status: Status { code: TransferCode::BadRequest, message: format!("gate: {err}"), route: None },
                    settings_id: String::new(),
                    hash: String::new(),
                }
            }
        };

        match self.settings_processor.process_settings(settings, deadline).await {
            Ok((settings_id, hash)) => SettingsResponse {
                status: Status::ok(),
                settings_id: settings_id.to_string(),
                hash: hash.to_string(),
            },
            Err(err) => SettingsResponse {
                status: Status::from_processor_error(&err),
                settings_id: String::new(),
                hash: String::new(),
            },
        }
    }

    pub async fn get_prev_hash(&self, acc: AccId, deadline: Option<Instant>) -> HashResponse {
        if self.check_routing(acc).is_none() {
            return HashResponse { status: self.see_other(acc), hash: String::new() };
        }
        match self.processor.get_prev_hash(acc, deadline).await {
            Ok(hash) => HashResponse { status: Status::ok(), hash: hash.to_string() },
            Err(err) => HashResponse { status: Status::from_processor_error(&err), hash: String::new() },
        }
    }

    pub async fn get_balance(&self, acc: AccId, deadline: Option<Instant>) -> BalanceResponse {
        if self.check_routing(acc).is_none() {
            return BalanceResponse { status: self.see_other(acc), balance: 0 };
        }
        match self.processor.get_balance(acc, deadline).await {
            Ok(balance) => BalanceResponse { status: Status::ok(), balance },
            Err(err) => BalanceResponse { status: Status::from_processor_error(&err), balance: 0 },
        }
    }
}

fn bad_request_transfer(err: ValidationError) -> TransferResponse {
    TransferResponse {
        status: Status { code: TransferCode::BadRequest, message: format!("gate: {err}"), route: None },
        hash: String::new(),
        settings_id: 0,
        txn_id: String::new(),
        account: 0,
        id: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdp_bigchain::InMemoryBigChain;
    use qdp_chain::Chain;
    use qdp_preloader::Preloader;
    use qdp_settings_chain::SettingsChain;
    use crate::validate::TransferItemRequest;

    struct AlwaysElsewhere;

    impl Router for AlwaysElsewhere {
        fn host_for_key(&self, _key: &str) -> String {
            "node-b".into()
        }
        fn nodes(&self) -> Vec<String> {
            vec!["node-a".into(), "node-b".into()]
        }
        fn set_nodes(&self, _nodes: Vec<String>) {}
        fn is_self(&self, host: &str) -> bool {
            host == "node-a"
        }
    }

    fn gate() -> Gate<InMemoryBigChain> {
        let chain = Arc::new(Chain::new());
        let settings_chain = Arc::new(SettingsChain::new());
        let bigchain = Arc::new(InMemoryBigChain::new());
        let gauge = prometheus::IntGauge::new("gate_test_accounts_cached", "help").unwrap();
        let preloader = Arc::new(Preloader::new(bigchain, chain.clone(), settings_chain.clone(), gauge));
        let processor = Arc::new(Multiprocessor::new(4, chain, settings_chain.clone(), preloader.clone(), None));
        let settings_processor = Arc::new(SettingsProcessor::new(settings_chain, preloader, None));
        Gate::new(processor, settings_processor)
    }

    #[tokio::test]
    async fn redirects_when_not_owning_shard() {
        let mut g = gate();
        g.set_router(Arc::new(AlwaysElsewhere));
        let req = TransferRequest {
            sender: 1,
            batch: vec![TransferItemRequest { receiver: 2, amount: 10 }],
            settings_id: 0,
            prev_hash: String::new(),
            sign: String::new(),
        };
        let resp = g.process_transfer(req, None).await;
        assert_eq!(resp.status.code, TransferCode::SeeOther);
        assert_eq!(resp.status.route.unwrap().target, "node-b");
    }

    #[tokio::test]
    async fn processes_transfer_when_no_router_configured() {
        let g = gate();
        let req = TransferRequest {
            sender: 0,
            batch: vec![TransferItemRequest { receiver: 20, amount: 1000 }],
            settings_id: 0,
            prev_hash: String::new(),
            sign: String::new(),
        };
        let resp = g.process_transfer(req, None).await;
        assert_eq!(resp.status.code, TransferCode::Ok);
        assert_eq!(resp.account, 0);
        assert_eq!(resp.id, 1);
    }
}
