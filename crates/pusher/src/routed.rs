use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::try_join_all;

use qdp_primitives::{PusherError, Router, Settings, Txn};

use crate::wire::{PushRequest, PushResponse, PushSettingsRequest, WireSettings, WireTxn};

/// An HTTP client pusher pointed at one remote node's push endpoint.
pub struct HttpClientPusher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClientPusher {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpClientPusher {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl qdp_primitives::Pusher for HttpClientPusher {
    async fn push(&self, txns: &[Txn]) -> Result<(), PusherError> {
        if txns.is_empty() {
            return Ok(());
        }
        let req = PushRequest {
            txns: txns.iter().map(WireTxn::from).collect(),
        };
        let url = format!("{}/v1/push", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| PusherError::new(format!("remote push failed: {e}")))?;
        let body: PushResponse = resp
            .json()
            .await
            .map_err(|e| PusherError::new(format!("remote push failed: decode: {e}")))?;
        if body.code == crate::wire::PushCode::InternalError {
            return Err(PusherError::new(format!("remote push failed: {}", body.message)));
        }
        Ok(())
    }
}

#[async_trait]
impl qdp_primitives::SettingsPusher for HttpClientPusher {
    async fn push_settings(&self, settings: &Settings) -> Result<(), PusherError> {
        let req = PushSettingsRequest { settings: WireSettings::from(settings) };
        let url = format!("{}/v1/push_settings", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| PusherError::new(format!("remote settings push failed: {e}")))?;
        let body: PushResponse = resp
            .json()
            .await
            .map_err(|e| PusherError::new(format!("remote settings push failed: decode: {e}")))?;
        if body.code == crate::wire::PushCode::InternalError {
            return Err(PusherError::new(format!("remote settings push failed: {}", body.message)));
        }
        Ok(())
    }
}

/// Fans each txn out to the node responsible for its receiver, per the
/// router's current shard assignment; keeps one client per base URL.
pub struct Routed<R> {
    router: Arc<R>,
    clients: Mutex<HashMap<String, Arc<HttpClientPusher>>>,
}

impl<R: Router> Routed<R> {
    pub fn new(router: Arc<R>) -> Self {
        Routed {
            router,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, url: &str) -> Arc<HttpClientPusher> {
        let mut clients = self.clients.lock().expect("routed pusher mutex poisoned");
        clients
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(HttpClientPusher::new(url)))
            .clone()
    }

    fn remote_url_for(&self, acc: qdp_primitives::AccId) -> Option<String> {
        let host = self.router.host_for_key(&acc.0.to_string());
        if host.is_empty() {
            return None;
        }
        Some(host)
    }
}

#[async_trait]
impl<R: Router + Send + Sync + 'static> qdp_primitives::Pusher for Routed<R> {
    async fn push(&self, txns: &[Txn]) -> Result<(), PusherError> {
        let futs = txns.iter().map(|txn| {
            let txn = txn.clone();
            async move {
                let Some(url) = self.remote_url_for(txn.receiver) else {
                    return Err(PusherError::new(format!(
                        "no remote push url for account {}",
                        txn.receiver
                    )));
                };
                let client = self.client_for(&url);
                client.push(std::slice::from_ref(&txn)).await
            }
        });
        try_join_all(futs).await.map(|_| ())
    }
}

/// Settings counterpart of [`Routed`]: routes by the settings update's own
/// account rather than a txn's receiver, since a settings update has no
/// separate sender/receiver split.
pub struct SettingsRouted<R> {
    router: Arc<R>,
    clients: Mutex<HashMap<String, Arc<HttpClientPusher>>>,
}

impl<R: Router> SettingsRouted<R> {
    pub fn new(router: Arc<R>) -> Self {
        SettingsRouted { router, clients: Mutex::new(HashMap::new()) }
    }

    fn client_for(&self, url: &str) -> Arc<HttpClientPusher> {
        let mut clients = self.clients.lock().expect("settings routed pusher mutex poisoned");
        clients
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(HttpClientPusher::new(url)))
            .clone()
    }
}

#[async_trait]
impl<R: Router + Send + Sync + 'static> qdp_primitives::SettingsPusher for SettingsRouted<R> {
    async fn push_settings(&self, settings: &Settings) -> Result<(), PusherError> {
        let host = self.router.host_for_key(&settings.account.0.to_string());
        if host.is_empty() {
            return Err(PusherError::new(format!(
                "no remote push url for account {}",
                settings.account
            )));
        }
        self.client_for(&host).push_settings(settings).await
    }
}
