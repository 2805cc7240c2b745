//! Self-discovery via DNS: resolve a `host:port` service name, call every
//! resolved address's `/hostname` endpoint and keep the ones whose reply
//! matches our own hostname as "me", the rest become the node list.

use std::net::ToSocketAddrs;

use futures::future::join_all;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("split host:port for {0}: {1}")]
    SplitHostPort(String, String),
    #[error("dns lookup for {0} failed: {1}")]
    Lookup(String, String),
    #[error("local hostname unavailable: {0}")]
    Hostname(String),
}

pub struct Discovered {
    /// Our own `host:port`, if one of the resolved addresses is us.
    pub me: Option<String>,
    /// Every resolved `host:port`, sorted.
    pub nodes: Vec<String>,
}

/// Resolves `service` (a `host:port` string), probes each address's
/// `/hostname` endpoint and splits out which one (if any) is this process.
pub async fn discover(service: &str, client: &reqwest::Client) -> Result<Discovered, DiscoveryError> {
    let (host, port) = service
        .rsplit_once(':')
        .ok_or_else(|| DiscoveryError::SplitHostPort(service.to_string(), "missing ':'".into()))?;

    let my_hostname = ::hostname::get()
        .map_err(|e| DiscoveryError::Hostname(e.to_string()))?
        .to_string_lossy()
        .to_string();

    let addrs = resolve_host(host)?;

    let probes = addrs.iter().map(|addr| {
        let url = format!("http://{addr}:{port}/hostname");
        let client = client.clone();
        async move { (addr.clone(), client.get(&url).send().await) }
    });

    let results = join_all(probes).await;

    let mut me = None;
    for (addr, resp) in results {
        if let Ok(resp) = resp {
            if let Ok(body) = resp.text().await {
                if body.trim() == my_hostname {
                    me = Some(format!("{addr}:{port}"));
                }
            }
        }
    }

    let mut nodes: Vec<String> = addrs.iter().map(|a| format!("{a}:{port}")).collect();
    nodes.sort();

    Ok(Discovered { me, nodes })
}

fn resolve_host(host: &str) -> Result<Vec<String>, DiscoveryError> {
    let lookup = format!("{host}:0");
    let addrs: Vec<String> = lookup
        .to_socket_addrs()
        .map_err(|e| DiscoveryError::Lookup(host.to_string(), e.to_string()))?
        .map(|sa| sa.ip().to_string())
        .collect();
    Ok(addrs)
}
