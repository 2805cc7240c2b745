use serde::{Deserialize, Serialize};

use qdp_processor::ProcessorError;

/// Wire-level status code every Gate response carries. Named after the
/// source's `gatepb.TransferCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCode {
    Ok,
    BadRequest,
    NoBalance,
    InvalidPrevHash,
    Retry,
    SeeOther,
    InternalError,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    pub code: TransferCode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteMap>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteMap {
    pub nodes: Vec<String>,
    pub target: String,
}

impl Status {
    pub fn ok() -> Self {
        Status { code: TransferCode::Ok, message: String::new(), route: None }
    }

    pub fn see_other(target: String, nodes: Vec<String>) -> Self {
        Status {
            code: TransferCode::SeeOther,
            message: format!("route error: see other node {target}"),
            route: Some(RouteMap { nodes, target }),
        }
    }

    /// Maps a processor error onto a wire status code, following the
    /// source's `switch cause` in `gate.go`: only the causes it names get a
    /// dedicated code, everything else falls through to `INTERNAL_ERROR`.
    pub fn from_processor_error(err: &ProcessorError) -> Self {
        let code = match err {
            ProcessorError::NoBalance => TransferCode::NoBalance,
            ProcessorError::NoReceivers => TransferCode::BadRequest,
            ProcessorError::InvalidPrevHash | ProcessorError::InvalidSettingsPrevHash => {
                TransferCode::InvalidPrevHash
            }
            ProcessorError::Preloading(_) => TransferCode::Retry,
            _ => TransferCode::InternalError,
        };
        tracing::debug!(reason = err.to_metric(), "processor error");
        Status { code, message: format!("gate: {err}"), route: None }
    }
}
