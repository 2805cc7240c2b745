//! Push pipeline: composable `Pusher`/`SettingsPusher` implementations plus
//! the remote wire client/service pair used between nodes.

pub mod chain_receivers;
pub mod parallel;
pub mod routed;
pub mod sequential;
pub mod service;
pub mod wire;

pub use chain_receivers::ChainReceivers;
pub use parallel::{Parallel, SettingsParallel};
pub use routed::{HttpClientPusher, Routed, SettingsRouted};
pub use sequential::{Sequential, SettingsSequential};
