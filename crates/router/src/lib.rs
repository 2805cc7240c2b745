//! Routing: maps an account to the node responsible for it, in either a
//! consistent-hash or explicit-range variant, plus DNS self-discovery and
//! an admin HTTP surface to inspect/replace the node table.

pub mod consistent;
pub mod discovery;
pub mod handler;
pub mod static_range;

pub use consistent::ConsistentRouter;
pub use discovery::{discover, Discovered, DiscoveryError};
pub use static_range::StaticRangeRouter;
