use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};

use qdp_bigchain::BigChain;
use qdp_primitives::AccId;

use crate::gate::{BalanceResponse, Gate, HashResponse, SettingsResponse, TransferResponse};
use crate::validate::{SettingsRequest, TransferRequest};

pub fn routes<B: BigChain + 'static>(gate: Arc<Gate<B>>) -> AxumRouter {
    AxumRouter::new()
        .route("/v1/transfer", post(process_transfer::<B>))
        .route("/v1/settings", post(update_settings::<B>))
        .route("/v1/prev_hash/:account", get(get_prev_hash::<B>))
        .route("/v1/balance/:account", get(get_balance::<B>))
        .with_state(gate)
}

async fn process_transfer<B: BigChain + 'static>(
    State(gate): State<Arc<Gate<B>>>,
    Json(req): Json<TransferRequest>,
) -> Json<TransferResponse> {
    Json(gate.process_transfer(req, None).await)
}

async fn update_settings<B: BigChain + 'static>(
    State(gate): State<Arc<Gate<B>>>,
    Json(req): Json<SettingsRequest>,
) -> Json<SettingsResponse> {
    Json(gate.update_settings(req, None).await)
}

async fn get_prev_hash<B: BigChain + 'static>(
    State(gate): State<Arc<Gate<B>>>,
    Path(account): Path<u64>,
) -> Json<HashResponse> {
    Json(gate.get_prev_hash(AccId(account), None).await)
}

async fn get_balance<B: BigChain + 'static>(
    State(gate): State<Arc<Gate<B>>>,
    Path(account): Path<u64>,
) -> Json<BalanceResponse> {
    Json(gate.get_balance(AccId(account), None).await)
}
