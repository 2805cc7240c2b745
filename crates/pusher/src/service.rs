//! The server side of the remote push wire protocol: decode and validate
//! a batch of wire txns, then delegate to a local `Pusher`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router as AxumRouter};

use qdp_primitives::{Pusher, SettingsPusher};

use crate::wire::{PushCode, PushRequest, PushResponse, PushSettingsRequest};

pub fn routes(pusher: Arc<dyn Pusher>) -> AxumRouter {
    AxumRouter::new()
        .route("/v1/push", post(push_handler))
        .with_state(pusher)
}

pub fn settings_routes(pusher: Arc<dyn SettingsPusher>) -> AxumRouter {
    AxumRouter::new()
        .route("/v1/push_settings", post(push_settings_handler))
        .with_state(pusher)
}

async fn push_settings_handler(
    State(pusher): State<Arc<dyn SettingsPusher>>,
    Json(req): Json<PushSettingsRequest>,
) -> Json<PushResponse> {
    let settings = match qdp_primitives::Settings::try_from(req.settings) {
        Ok(settings) => settings,
        Err(message) => return Json(PushResponse { code: PushCode::InternalError, message }),
    };

    match pusher.push_settings(&settings).await {
        Ok(()) => Json(PushResponse { code: PushCode::Ok, message: String::new() }),
        Err(err) => Json(PushResponse {
            code: PushCode::InternalError,
            message: format!("settings pusher: {err}"),
        }),
    }
}

async fn push_handler(
    State(pusher): State<Arc<dyn Pusher>>,
    Json(req): Json<PushRequest>,
) -> Json<PushResponse> {
    let txns = match decode(req) {
        Ok(txns) => txns,
        Err(message) => {
            return Json(PushResponse { code: PushCode::InternalError, message });
        }
    };

    match pusher.push(&txns).await {
        Ok(()) => Json(PushResponse { code: PushCode::Ok, message: String::new() }),
        Err(err) => Json(PushResponse {
            code: PushCode::InternalError,
            message: format!("pusher: {err}"),
        }),
    }
}

fn decode(req: PushRequest) -> Result<Vec<qdp_primitives::Txn>, String> {
    req.txns
        .into_iter()
        .map(|w| qdp_primitives::Txn::try_from(w).map_err(|e| e.to_string()))
        .collect()
}
