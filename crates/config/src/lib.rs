//! Per-node configuration: loaded from a TOML file given on the CLI, then
//! overridden by `QDP_`-prefixed environment variables (`envy`), following
//! spec.md §6 "Configuration (per-node)".

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("parsing config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
    #[error("applying environment overrides: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterKind {
    Consistent,
    StaticRange,
    None,
}

impl Default for RouterKind {
    fn default() -> Self {
        RouterKind::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address this node's Gate HTTP server listens on.
    pub listen_addr: String,
    /// This node's own `host:port`, as seen by peers (router `self`).
    pub self_host: String,
    /// Static node table, `"host"` or `"shard_start=host"` entries.
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Durable store base URL the preloader/bigchain stub talks to.
    #[serde(default)]
    pub durable_store_addr: Option<String>,
    /// Number of processor shards (`Multiprocessor` fan-out).
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,
    #[serde(default)]
    pub router_kind: RouterKind,
    /// `host:port` DNS name probed for self-discovery; `None` disables it.
    #[serde(default)]
    pub discovery_service: Option<String>,
    /// Address the `/metrics` endpoint listens on.
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_shard_count() -> usize {
    qdp_processor_default_shards()
}

// Kept free of a qdp-processor dependency (config sits below the processor
// layer in the workspace graph); mirrors `qdp_processor::DEFAULT_SHARDS`.
fn qdp_processor_default_shards() -> usize {
    997
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Loads from `path` (TOML), then lets any `QDP_*` environment
    /// variable override a matching field.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let base: Self = toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let merged = envy::prefixed("QDP_").from_env::<PartialEnvConfig>()?.apply(base);
        Ok(merged)
    }
}

/// Every field optional so `envy` only overrides what's actually set in
/// the environment, instead of requiring every field to be present.
#[derive(Debug, Deserialize)]
struct PartialEnvConfig {
    listen_addr: Option<String>,
    self_host: Option<String>,
    durable_store_addr: Option<String>,
    shard_count: Option<usize>,
    metrics_addr: Option<String>,
    log_level: Option<String>,
}

impl PartialEnvConfig {
    fn apply(self, mut base: NodeConfig) -> NodeConfig {
        if let Some(v) = self.listen_addr {
            base.listen_addr = v;
        }
        if let Some(v) = self.self_host {
            base.self_host = v;
        }
        if let Some(v) = self.durable_store_addr {
            base.durable_store_addr = Some(v);
        }
        if let Some(v) = self.shard_count {
            base.shard_count = v;
        }
        if let Some(v) = self.metrics_addr {
            base.metrics_addr = v;
        }
        if let Some(v) = self.log_level {
            base.log_level = v;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let toml = "listen_addr = \"0.0.0.0:8080\"\nself_host = \"node-a:8080\"\n";
        let cfg: NodeConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.shard_count, 997);
        assert_eq!(cfg.router_kind, RouterKind::None);
        assert_eq!(cfg.metrics_addr, "0.0.0.0:9090");
    }

    #[test]
    fn env_override_replaces_shard_count() {
        let base = NodeConfig {
            listen_addr: "0.0.0.0:8080".into(),
            self_host: "node-a:8080".into(),
            nodes: vec![],
            durable_store_addr: None,
            shard_count: 997,
            router_kind: RouterKind::None,
            discovery_service: None,
            metrics_addr: "0.0.0.0:9090".into(),
            log_level: "info".into(),
        };
        let overrides = PartialEnvConfig {
            listen_addr: None,
            self_host: None,
            durable_store_addr: None,
            shard_count: Some(4),
            metrics_addr: None,
            log_level: None,
        };
        let merged = overrides.apply(base);
        assert_eq!(merged.shard_count, 4);
    }
}
