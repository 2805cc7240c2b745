//! Entry point for user-facing transfer/settings requests: checks shard
//! ownership, validates the wire request, delegates to the processors and
//! maps results onto wire status codes.

pub mod codes;
pub mod gate;
pub mod http;
pub mod validate;

pub use codes::{RouteMap, Status, TransferCode};
pub use gate::Gate;
