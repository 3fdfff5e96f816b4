use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use bitbadge_core::tx;

use super::error::AppError;
use super::SharedState;

#[derive(Deserialize)]
pub(super) struct StripRequest {
    hex: String,
}

#[derive(Serialize)]
pub(super) struct StripResponse {
    hex: String,
}

#[derive(Deserialize)]
pub(super) struct VerifySenderRequest {
    hex: String,
    address: String,
}

#[derive(Serialize)]
pub(super) struct VerifySenderResponse {
    verified: bool,
    network: &'static str,
}

pub(super) async fn strip(Json(body): Json<StripRequest>) -> Result<Json<StripResponse>, AppError> {
    let hex = tx::strip_witness(&body.hex).map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(StripResponse { hex }))
}

/// Never fails on bad input: anything unverifiable is `verified: false`.
pub(super) async fn verify_sender(
    State(state): State<SharedState>,
    Json(body): Json<VerifySenderRequest>,
) -> Json<VerifySenderResponse> {
    let network = state.ctx.config().network;
    Json(VerifySenderResponse {
        verified: tx::verify_sender(&body.hex, body.address.trim(), &network),
        network: network.name,
    })
}
