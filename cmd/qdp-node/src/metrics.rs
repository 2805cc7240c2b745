use prometheus::{Encoder, Histogram, HistogramOpts, IntGauge, Registry, TextEncoder};

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(String),
    #[error("encoded metrics were not valid utf8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Metrics this node exposes at `/metrics`.
pub struct Metrics {
    registry: Registry,
    pub accounts_cached: IntGauge,
    pub preload_duration: Histogram,
    pub push_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let accounts_cached = IntGauge::new("qdp_accounts_cached", "accounts resident in memory")
            .map_err(|e| MetricsError::Prometheus(e.to_string()))?;
        let preload_duration = Histogram::with_opts(
            HistogramOpts::new(
                "qdp_preload_duration_seconds",
                "time spent fetching a cold account from the durable store",
            )
            .buckets(prometheus::exponential_buckets(0.001, 2.0, 12).map_err(|e| MetricsError::Prometheus(e.to_string()))?),
        )
        .map_err(|e| MetricsError::Prometheus(e.to_string()))?;
        let push_duration = Histogram::with_opts(
            HistogramOpts::new(
                "qdp_push_duration_seconds",
                "time spent in the downstream pusher pipeline",
            )
            .buckets(prometheus::exponential_buckets(0.001, 2.0, 12).map_err(|e| MetricsError::Prometheus(e.to_string()))?),
        )
        .map_err(|e| MetricsError::Prometheus(e.to_string()))?;

        registry
            .register(Box::new(accounts_cached.clone()))
            .map_err(|e| MetricsError::Prometheus(e.to_string()))?;
        registry
            .register(Box::new(preload_duration.clone()))
            .map_err(|e| MetricsError::Prometheus(e.to_string()))?;
        registry
            .register(Box::new(push_duration.clone()))
            .map_err(|e| MetricsError::Prometheus(e.to_string()))?;

        Ok(Metrics { registry, accounts_cached, preload_duration, push_duration })
    }

    pub fn gather(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Prometheus(e.to_string()))?;
        Ok(String::from_utf8(buffer)?)
    }
}
