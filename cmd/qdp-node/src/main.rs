mod cli;
mod metrics;

use std::sync::Arc;

use axum::routing::get;
use axum::Router as AxumRouter;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qdp_bigchain::InMemoryBigChain;
use qdp_chain::Chain;
use qdp_config::{NodeConfig, RouterKind};
use qdp_gate::Gate;
use qdp_preloader::Preloader;
use qdp_primitives::{Pusher, Router, SettingsPusher};
use qdp_processor::Multiprocessor;
use qdp_pusher::{ChainReceivers, HttpClientPusher, Routed, Sequential, SettingsSequential};
use qdp_router::{ConsistentRouter, StaticRangeRouter};
use qdp_settings_chain::SettingsChain;
use qdp_settings_processor::SettingsProcessor;

use crate::cli::Args;
use crate::metrics::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = NodeConfig::load(&args.config_path)?;
    init_tracing(args.log_level.as_deref().unwrap_or(&config.log_level));

    tracing::info!(
        listen_addr = %config.listen_addr,
        self_host = %config.self_host,
        shard_count = config.shard_count,
        "starting qdp-node"
    );

    match config.router_kind {
        RouterKind::Consistent => {
            let router = Arc::new(ConsistentRouter::new(config.self_host.clone()));
            router.set_nodes(config.nodes.clone());
            run_with_router(config, router).await
        }
        RouterKind::StaticRange => {
            let router = Arc::new(StaticRangeRouter::new(config.self_host.clone()));
            router.set_nodes_from_entries(&config.nodes);
            run_with_router(config, router).await
        }
        RouterKind::None => run_without_router(config).await,
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn run_with_router<R>(config: NodeConfig, router: Arc<R>) -> anyhow::Result<()>
where
    R: Router + qdp_router::handler::UpdatableRouter + 'static,
{
    let chain = Arc::new(Chain::new());
    let settings_chain = Arc::new(SettingsChain::new());
    let metrics = Arc::new(Metrics::new()?);
    let preloader = build_preloader(&chain, &settings_chain, &metrics);

    // Mirrors the source's plutos wiring: the durable store (if any) gets
    // both txns and settings, but only txns are routed across the cluster by
    // receiver; a settings update always applies to the account that owns
    // the request, which routing already sent to the right node.
    let mut pushers: Vec<Arc<dyn Pusher>> = Vec::new();
    let mut settings_pushers: Vec<Arc<dyn SettingsPusher>> = Vec::new();
    if let Some(addr) = &config.durable_store_addr {
        let client = Arc::new(HttpClientPusher::new(addr.clone()));
        pushers.push(client.clone());
        settings_pushers.push(client);
    }
    pushers.push(Arc::new(Routed::new(router.clone())));

    let pusher: Arc<dyn Pusher> = Arc::new(Sequential::new(pushers));
    let settings_pusher: Option<Arc<dyn SettingsPusher>> = if settings_pushers.is_empty() {
        None
    } else {
        Some(Arc::new(SettingsSequential::new(settings_pushers)))
    };

    let processor = Arc::new(
        Multiprocessor::new(config.shard_count, chain.clone(), settings_chain.clone(), preloader.clone(), Some(pusher))
            .with_push_duration(metrics.push_duration.clone()),
    );
    let settings_processor = Arc::new(
        SettingsProcessor::new(settings_chain, preloader, settings_pusher)
            .with_push_duration(metrics.push_duration.clone()),
    );

    let mut gate = Gate::new(processor, settings_processor);
    let router_dyn: Arc<dyn Router> = router.clone();
    gate.set_router(router_dyn);
    let gate = Arc::new(gate);

    if let Some(service) = config.discovery_service.clone() {
        let router = router.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            match qdp_router::discover(&service, &reqwest::Client::new()).await {
                Ok(discovered) => {
                    if let Some(me) = discovered.me {
                        router.set_self_host(me);
                    }
                    router.set_nodes(discovered.nodes);
                }
                Err(err) => tracing::warn!(%err, "router self-discovery failed"),
            }
        });
    }

    let local_pusher: Arc<dyn Pusher> = Arc::new(ChainReceivers::new(chain));
    spawn_metrics_server(config.metrics_addr.clone(), metrics);

    let app = AxumRouter::new()
        .merge(qdp_gate::http::routes(gate))
        .merge(qdp_pusher::service::routes(local_pusher))
        .merge(qdp_router::handler::routes(router));

    serve(&config.listen_addr, app).await
}

async fn run_without_router(config: NodeConfig) -> anyhow::Result<()> {
    let chain = Arc::new(Chain::new());
    let settings_chain = Arc::new(SettingsChain::new());
    let metrics = Arc::new(Metrics::new()?);
    let preloader = build_preloader(&chain, &settings_chain, &metrics);

    let local_pusher: Arc<dyn Pusher> = Arc::new(ChainReceivers::new(chain.clone()));
    let processor = Arc::new(
        Multiprocessor::new(config.shard_count, chain, settings_chain.clone(), preloader.clone(), Some(local_pusher.clone()))
            .with_push_duration(metrics.push_duration.clone()),
    );
    let settings_processor = Arc::new(SettingsProcessor::new(settings_chain, preloader, None));

    let gate = Arc::new(Gate::new(processor, settings_processor));
    spawn_metrics_server(config.metrics_addr.clone(), metrics);

    let app = AxumRouter::new()
        .merge(qdp_gate::http::routes(gate))
        .merge(qdp_pusher::service::routes(local_pusher));

    serve(&config.listen_addr, app).await
}

fn build_preloader(
    chain: &Arc<Chain>,
    settings_chain: &Arc<SettingsChain>,
    metrics: &Arc<Metrics>,
) -> Arc<Preloader<InMemoryBigChain>> {
    let bigchain = Arc::new(InMemoryBigChain::new());
    let preloader = Preloader::new(
        bigchain,
        chain.clone(),
        settings_chain.clone(),
        metrics.accounts_cached.clone(),
    )
    .with_preload_duration(metrics.preload_duration.clone());
    Arc::new(preloader)
}

async fn serve_metrics(axum::extract::State(metrics): axum::extract::State<Arc<Metrics>>) -> String {
    metrics.gather().unwrap_or_else(|err| format!("# failed to gather metrics: {err}\n"))
}

/// Runs `/metrics` on its own listener so scraping never contends with the
/// gate's request handling.
fn spawn_metrics_server(metrics_addr: String, metrics: Arc<Metrics>) {
    tokio::spawn(async move {
        let app = AxumRouter::new().route("/metrics", get(serve_metrics)).with_state(metrics);
        match TcpListener::bind(&metrics_addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app).await {
                    tracing::error!(%err, "metrics server stopped");
                }
            }
            Err(err) => tracing::error!(%err, %metrics_addr, "failed to bind metrics listener"),
        }
    });
}

async fn serve(listen_addr: &str, app: AxumRouter) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
