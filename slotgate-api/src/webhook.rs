use axum::{extract::State, routing::post, Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotgate_booking::session::{BookingSession, SessionInput, SessionOutcome};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

/// Conversational fulfillment endpoint. Each turn carries one intent;
/// session state lives in the external store so any instance can serve
/// any turn.
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub session_id: String,
    pub intent: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub fulfillment_text: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhook", post(handle_turn))
}

fn param_str(params: &Value, key: &str) -> Option<String> {
    params.get(key)?.as_str().map(str::to_string)
}

fn parse_input(intent: &str, params: &Value) -> Option<SessionInput> {
    match intent {
        "provide_name" => param_str(params, "name").map(SessionInput::Name),
        "provide_email" => param_str(params, "email").map(SessionInput::Address),
        "provide_identity" => param_str(params, "identity_number").map(SessionInput::Identity),
        "provide_slot" => param_str(params, "slot_time").map(SessionInput::Slot),
        "provide_ticket_count" => params
            .get("count")
            .and_then(Value::as_u64)
            .map(|c| SessionInput::Count(c as u32)),
        "provide_passenger_names" => params.get("passenger_names")?.as_array().map(|names| {
            SessionInput::Passengers(
                names
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )
        }),
        "confirm_booking" => Some(SessionInput::Confirm),
        "cancel_booking" => Some(SessionInput::Decline),
        _ => None,
    }
}

async fn handle_turn(
    State(state): State<AppState>,
    Json(req): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, AppError> {
    // Re-notify is a standalone lookup, not a session turn.
    if req.intent == "resend_ticket" {
        return resend_turn(&state, &req.parameters).await;
    }

    let mut session = state
        .sessions
        .load(&req.session_id)
        .await?
        .unwrap_or_else(BookingSession::new);

    let Some(input) = parse_input(&req.intent, &req.parameters) else {
        return Ok(reply(session.prompt()));
    };

    let now = Local::now().naive_local();
    match session.apply(input, now, &state.rules) {
        Ok(SessionOutcome::Prompt(prompt)) => {
            let text = with_availability(&state, &session, prompt).await;
            state.sessions.save(&req.session_id, &session).await?;
            Ok(reply(text))
        }
        Ok(SessionOutcome::ReadyToBook(booking_req)) => {
            state.sessions.clear(&req.session_id).await?;
            match state.orchestrator.book(&booking_req).await {
                Ok(confirmation) => {
                    info!(booking_id = %confirmation.booking_id, "webhook booking confirmed");
                    Ok(reply(format!(
                        "Congratulations! Your ticket has been booked. Booking ID: {}. \
                         A confirmation email will follow shortly.",
                        confirmation.booking_id
                    )))
                }
                // Conversational relay: the error text goes back as a
                // normal fulfillment message.
                Err(e) => Ok(reply(format!("Booking failed: {}. Please try again.", e))),
            }
        }
        Ok(SessionOutcome::Cancelled) => {
            state.sessions.clear(&req.session_id).await?;
            Ok(reply("Booking cancelled.".to_string()))
        }
        Err(e) => {
            state.sessions.save(&req.session_id, &session).await?;
            Ok(reply(format!("{}. {}", e, session.prompt())))
        }
    }
}

/// After the slot is accepted, show how many tickets are left before
/// asking for the count. Advisory only; the ledger re-checks.
async fn with_availability(state: &AppState, session: &BookingSession, prompt: String) -> String {
    if let Some(slot_time) = session.slot_time.as_deref() {
        if session.ticket_count.is_none() {
            if let Ok(available) = state.orchestrator.availability(slot_time).await {
                return format!("Available tickets: {}. {}", available, prompt);
            }
        }
    }
    prompt
}

async fn resend_turn(state: &AppState, params: &Value) -> Result<Json<WebhookResponse>, AppError> {
    let (Some(identity), Some(email)) = (
        param_str(params, "identity_number"),
        param_str(params, "email"),
    ) else {
        return Ok(reply(
            "Please provide your 12-digit identity number and email.".to_string(),
        ));
    };

    match state.orchestrator.resend_latest(&identity, &email).await {
        Ok(Some(_)) => Ok(reply(
            "The ticket will shortly be sent to your email.".to_string(),
        )),
        Ok(None) => Ok(reply(
            "No booking found for the given identity and email.".to_string(),
        )),
        Err(e) => Ok(reply(format!("{}", e))),
    }
}

fn reply(text: String) -> Json<WebhookResponse> {
    Json(WebhookResponse {
        fulfillment_text: text,
    })
}
