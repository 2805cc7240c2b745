//! Admin HTTP surface for an updatable router: read/replace the node
//! table, or trigger a DNS self-discovery pass.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use serde::{Deserialize, Serialize};

use crate::discovery::discover;

/// What the admin handlers need from a router besides [`qdp_primitives::Router`]:
/// the source tracks `self` separately from the node table's consistent-hash
/// structure, so routers expose it through this extra trait rather than
/// overloading `Router::host_for_key`.
pub trait UpdatableRouter: Send + Sync {
    fn self_host(&self) -> String;
    fn set_self_host(&self, host: String);
    fn nodes(&self) -> Vec<String>;
    fn set_nodes(&self, nodes: Vec<String>);
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HttpData {
    #[serde(rename = "self")]
    pub self_host: String,
    pub nodes: Vec<String>,
}

pub fn routes<R: UpdatableRouter + 'static>(router: Arc<R>) -> AxumRouter {
    AxumRouter::new()
        .route("/cfg/router", get(get_router::<R>).post(set_router::<R>))
        .route("/cfg/router/check/:service", get(check_router::<R>))
        .route("/hostname", get(hostname_handler))
        .with_state(router)
}

async fn get_router<R: UpdatableRouter>(State(router): State<Arc<R>>) -> Json<HttpData> {
    Json(HttpData { self_host: router.self_host(), nodes: router.nodes() })
}

async fn set_router<R: UpdatableRouter>(
    State(router): State<Arc<R>>,
    Json(data): Json<HttpData>,
) -> Json<HttpData> {
    router.set_self_host(data.self_host);
    router.set_nodes(data.nodes);
    Json(HttpData { self_host: router.self_host(), nodes: router.nodes() })
}

async fn check_router<R: UpdatableRouter>(
    State(router): State<Arc<R>>,
    Path(service): Path<String>,
) -> Json<HttpData> {
    if let Ok(discovered) = discover(&service, &reqwest::Client::new()).await {
        router.set_self_host(discovered.me.unwrap_or_default());
        router.set_nodes(discovered.nodes);
    }
    Json(HttpData { self_host: router.self_host(), nodes: router.nodes() })
}

async fn hostname_handler() -> String {
    ::hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubRouter {
        self_host: Mutex<String>,
        nodes: Mutex<Vec<String>>,
    }

    impl UpdatableRouter for StubRouter {
        fn self_host(&self) -> String {
            self.self_host.lock().unwrap().clone()
        }
        fn set_self_host(&self, host: String) {
            *self.self_host.lock().unwrap() = host;
        }
        fn nodes(&self) -> Vec<String> {
            self.nodes.lock().unwrap().clone()
        }
        fn set_nodes(&self, nodes: Vec<String>) {
            *self.nodes.lock().unwrap() = nodes;
        }
    }

    #[tokio::test]
    async fn get_router_reports_current_state() {
        let router = Arc::new(StubRouter {
            self_host: Mutex::new("a".into()),
            nodes: Mutex::new(vec!["a".into(), "b".into()]),
        });
        let resp = get_router(State(router)).await;
        assert_eq!(resp.0.self_host, "a");
        assert_eq!(resp.0.nodes, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn set_router_replaces_nodes() {
        let router = Arc::new(StubRouter {
            self_host: Mutex::new("a".into()),
            nodes: Mutex::new(vec![]),
        });
        let resp = set_router(
            State(router),
            Json(HttpData { self_host: "b".into(), nodes: vec!["x".into()] }),
        )
        .await;
        assert_eq!(resp.0.self_host, "b");
        assert_eq!(resp.0.nodes, vec!["x".to_string()]);
    }
}
