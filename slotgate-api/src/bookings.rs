use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use slotgate_core::booking::{BookingConfirmation, BookingRequest};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/resend", post(resend_booking))
        .route("/v1/slots/{slot}/availability", get(slot_availability))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<Json<BookingConfirmation>, AppError> {
    let confirmation = state.orchestrator.book(&req).await?;
    info!(booking_id = %confirmation.booking_id, "booking accepted");
    Ok(Json(confirmation))
}

#[derive(Debug, Deserialize)]
struct ResendRequest {
    identity_number: String,
    email: String,
}

/// Read-only: looks up the latest booking and re-queues its
/// confirmation event. Never mutates the ledger.
async fn resend_booking(
    State(state): State<AppState>,
    Json(req): Json<ResendRequest>,
) -> Result<Json<Value>, AppError> {
    match state
        .orchestrator
        .resend_latest(&req.identity_number, &req.email)
        .await?
    {
        Some(event) => Ok(Json(json!({
            "booking_id": event.booking_id,
            "message": "The ticket will shortly be sent to your email.",
        }))),
        None => Err(AppError::NotFound(
            "no booking found for the given identity and email".to_string(),
        )),
    }
}

async fn slot_availability(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<Json<Value>, AppError> {
    let available = state.orchestrator.availability(&slot).await?;
    Ok(Json(json!({
        "slot": slot,
        "available": available,
    })))
}
