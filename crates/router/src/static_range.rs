use std::sync::Mutex;

use qdp_primitives::Router;

/// Range-partitioned router: each node owns `[shards[i], shards[i+1])` of
/// the account-id keyspace. `set_nodes` accepts either `"host"` entries
/// (spread evenly) or `"shard_start=host"` entries for an explicit layout,
/// same as the source's `StaticRouter.SetNodes`.
#[derive(Default)]
struct State {
    shards: Vec<u64>,
    nodes: Vec<String>,
}

pub struct StaticRangeRouter {
    self_host: Mutex<String>,
    state: Mutex<State>,
}

impl StaticRangeRouter {
    pub fn new(self_host: impl Into<String>) -> Self {
        StaticRangeRouter {
            self_host: Mutex::new(self_host.into()),
            state: Mutex::new(State::default()),
        }
    }

    pub fn self_host(&self) -> String {
        self.self_host.lock().expect("router mutex poisoned").clone()
    }

    pub fn set_self_host(&self, host: impl Into<String>) {
        *self.self_host.lock().expect("router mutex poisoned") = host.into();
    }

    /// Display form used by the admin endpoint: `"{shard_start}={host}"`.
    pub fn nodes_display(&self) -> Vec<String> {
        let state = self.state.lock().expect("router mutex poisoned");
        state
            .shards
            .iter()
            .zip(state.nodes.iter())
            .map(|(shard, node)| format!("{shard}={node}"))
            .collect()
    }

    /// Parses entries of the form `"host"` (evenly spread) or
    /// `"shard_start=host"` (explicit), same grammar as the source.
    pub fn set_nodes_from_entries(&self, entries: &[String]) {
        let mut shards = Vec::with_capacity(entries.len());
        let mut nodes = Vec::with_capacity(entries.len());

        let equal_part = ((1u64 << 63) / entries.len().max(1) as u64) << 1;

        for (i, entry) in entries.iter().enumerate() {
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((shard, host)) => {
                    let shard: u64 = shard.parse().expect("format error: point parsing error");
                    shards.push(shard);
                    nodes.push(host.to_string());
                }
                None => {
                    shards.push(i as u64 * equal_part);
                    nodes.push(entry.clone());
                }
            }
        }

        let mut state = self.state.lock().expect("router mutex poisoned");
        state.shards = shards;
        state.nodes = nodes;
    }
}

impl Router for StaticRangeRouter {
    fn host_for_key(&self, key: &str) -> String {
        let id: u64 = key.parse().expect("host_for_key: key must be a decimal account id");
        let state = self.state.lock().expect("router mutex poisoned");
        if state.shards.is_empty() {
            return String::new();
        }
        let idx = match state.shards.binary_search(&id) {
            Ok(i) => i,
            Err(0) => state.shards.len() - 1,
            Err(i) => i - 1,
        };
        state.nodes[idx].clone()
    }

    fn nodes(&self) -> Vec<String> {
        self.nodes_display()
    }

    fn set_nodes(&self, nodes: Vec<String>) {
        self.set_nodes_from_entries(&nodes);
    }

    fn is_self(&self, host: &str) -> bool {
        self.self_host() == host
    }
}

impl crate::handler::UpdatableRouter for StaticRangeRouter {
    fn self_host(&self) -> String {
        StaticRangeRouter::self_host(self)
    }
    fn set_self_host(&self, host: String) {
        StaticRangeRouter::set_self_host(self, host)
    }
    fn nodes(&self) -> Vec<String> {
        Router::nodes(self)
    }
    fn set_nodes(&self, nodes: Vec<String>) {
        Router::set_nodes(self, nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_explicit_shard_ranges() {
        let r = StaticRangeRouter::new("a");
        r.set_nodes_from_entries(&["0=a".into(), "100=b".into(), "200=c".into()]);
        assert_eq!(r.host_for_key("0"), "a");
        assert_eq!(r.host_for_key("50"), "a");
        assert_eq!(r.host_for_key("100"), "b");
        assert_eq!(r.host_for_key("250"), "c");
    }

    #[test]
    fn wraps_around_below_first_shard() {
        let r = StaticRangeRouter::new("a");
        r.set_nodes_from_entries(&["100=a".into(), "200=b".into()]);
        assert_eq!(r.host_for_key("50"), "b");
    }

    #[test]
    fn bare_hosts_spread_evenly() {
        let r = StaticRangeRouter::new("a");
        r.set_nodes_from_entries(&["a".into(), "b".into()]);
        assert_eq!(r.nodes_display().len(), 2);
    }
}
