use axum::extract::State;
use axum::Json;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use bitbadge_core::clarity::{parse_principal, parse_standard_principal, StandardPrincipalData};
use bitbadge_core::flow::{MerkleCheck, PreparedMint, SessionView, TransferRequest};

use super::error::AppError;
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
pub(super) struct ReserveRequest {
    txid: String,
}

#[derive(Deserialize)]
pub(super) struct MintRequest {
    recipient: String,
    /// Bitcoin address the payment must come from.
    #[serde(default)]
    sender: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct ReadOnlyRequest {
    sender: String,
}

#[derive(Serialize)]
pub(super) struct CheckResponse {
    result: String,
}

#[derive(Serialize)]
pub(super) struct PaidResponse {
    received: bool,
}

fn parse_stx_sender(sender: &str) -> Result<StandardPrincipalData, AppError> {
    parse_standard_principal(sender)
        .map_err(|e| AppError::BadRequest(format!("invalid sender: {e}")))
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn get_state(State(state): State<SharedState>) -> Json<SessionView> {
    Json(state.ctx.view().await)
}

pub(super) async fn get_transfer(State(state): State<SharedState>) -> Json<TransferRequest> {
    Json(state.ctx.transfer_request())
}

pub(super) async fn reserve(
    State(state): State<SharedState>,
    Json(body): Json<ReserveRequest>,
) -> Result<Json<SessionView>, AppError> {
    let txid: Txid = body
        .txid
        .trim()
        .trim_matches('"')
        .parse()
        .map_err(|e| AppError::BadRequest(format!("invalid txid `{}`: {e}", body.txid)))?;

    state.ctx.reserve(txid).await?;
    state.restart_watcher().await;
    Ok(Json(state.ctx.view().await))
}

pub(super) async fn mint(
    State(state): State<SharedState>,
    Json(body): Json<MintRequest>,
) -> Result<Json<PreparedMint>, AppError> {
    let recipient = parse_principal(&body.recipient)
        .map_err(|e| AppError::BadRequest(format!("invalid recipient: {e}")))?;
    let prepared = state
        .ctx
        .prepare_mint(recipient, body.sender.as_deref())
        .await?;
    Ok(Json(prepared))
}

pub(super) async fn check(
    State(state): State<SharedState>,
    Json(body): Json<ReadOnlyRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let sender = parse_stx_sender(&body.sender)?;
    let result = state.ctx.check_mined(&sender).await?;
    Ok(Json(CheckResponse {
        result: result.to_string(),
    }))
}

pub(super) async fn verify_merkle(
    State(state): State<SharedState>,
    Json(body): Json<ReadOnlyRequest>,
) -> Result<Json<MerkleCheck>, AppError> {
    let sender = parse_stx_sender(&body.sender)?;
    Ok(Json(state.ctx.verify_merkle(&sender).await?))
}

pub(super) async fn paid(State(state): State<SharedState>) -> Result<Json<PaidResponse>, AppError> {
    let received = state.ctx.payment_received().await?;
    Ok(Json(PaidResponse { received }))
}

pub(super) async fn reset(State(state): State<SharedState>) -> Result<Json<SessionView>, AppError> {
    state.stop_watcher().await;
    state.ctx.reset().await?;
    Ok(Json(state.ctx.view().await))
}
