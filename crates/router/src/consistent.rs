use std::collections::BTreeMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use qdp_primitives::Router;

fn ring_hash(s: &str) -> u64 {
    let digest = Sha256::digest(s.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

/// Consistent-hash ring over a set of nodes, four virtual points per node
/// (matches the spread `serialx/hashring` gives with its default replica
/// count) so ownership only shifts for a small fraction of keys when the
/// node set changes.
const VIRTUAL_NODES: usize = 4;

struct State {
    ring: BTreeMap<u64, String>,
    nodes: Vec<String>,
}

pub struct ConsistentRouter {
    self_host: Mutex<String>,
    state: Mutex<State>,
}

impl ConsistentRouter {
    pub fn new(self_host: impl Into<String>) -> Self {
        ConsistentRouter {
            self_host: Mutex::new(self_host.into()),
            state: Mutex::new(State { ring: BTreeMap::new(), nodes: Vec::new() }),
        }
    }

    pub fn self_host(&self) -> String {
        self.self_host.lock().expect("router mutex poisoned").clone()
    }

    pub fn set_self_host(&self, host: impl Into<String>) {
        *self.self_host.lock().expect("router mutex poisoned") = host.into();
    }
}

impl Router for ConsistentRouter {
    fn host_for_key(&self, key: &str) -> String {
        let state = self.state.lock().expect("router mutex poisoned");
        if state.ring.is_empty() {
            return String::new();
        }
        let h = ring_hash(key);
        state
            .ring
            .range(h..)
            .next()
            .or_else(|| state.ring.iter().next())
            .map(|(_, host)| host.clone())
            .unwrap_or_default()
    }

    fn nodes(&self) -> Vec<String> {
        self.state.lock().expect("router mutex poisoned").nodes.clone()
    }

    fn set_nodes(&self, nodes: Vec<String>) {
        let mut ring = BTreeMap::new();
        for node in &nodes {
            for v in 0..VIRTUAL_NODES {
                let point = ring_hash(&format!("{node}-{v}"));
                ring.insert(point, node.clone());
            }
        }
        let mut state = self.state.lock().expect("router mutex poisoned");
        state.ring = ring;
        state.nodes = nodes;
    }

    fn is_self(&self, host: &str) -> bool {
        self.self_host() == host
    }
}

impl crate::handler::UpdatableRouter for ConsistentRouter {
    fn self_host(&self) -> String {
        ConsistentRouter::self_host(self)
    }
    fn set_self_host(&self, host: String) {
        ConsistentRouter::set_self_host(self, host)
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
    fn empty_ring_returns_no_host() {
        let r = ConsistentRouter::new("a");
        assert_eq!(r.host_for_key("1"), "");
    }

    #[test]
    fn same_key_maps_to_same_host_repeatedly() {
        let r = ConsistentRouter::new("a");
        r.set_nodes(vec!["a".into(), "b".into(), "c".into()]);
        let first = r.host_for_key("12345");
        for _ in 0..10 {
            assert_eq!(r.host_for_key("12345"), first);
        }
    }

    #[test]
    fn is_self_checks_configured_host() {
        let r = ConsistentRouter::new("node-a");
        assert!(r.is_self("node-a"));
        assert!(!r.is_self("node-b"));
    }

    #[test]
    fn most_keys_keep_their_node_after_adding_one_more() {
        let r = ConsistentRouter::new("a");
        r.set_nodes(vec!["a".into(), "b".into(), "c".into()]);
        let before: Vec<String> = (0..200).map(|i| r.host_for_key(&i.to_string())).collect();
        r.set_nodes(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let after: Vec<String> = (0..200).map(|i| r.host_for_key(&i.to_string())).collect();
        let unchanged = before.iter().zip(after.iter()).filter(|(a, b)| a == b).count();
        assert!(unchanged > 100, "expected most keys to keep their node, got {unchanged}/200");
    }
}
