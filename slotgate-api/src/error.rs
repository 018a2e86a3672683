use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use slotgate_core::error::BookingError;

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    NotFound(String),
    Internal(String),
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        Self::Booking(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Booking(e) => {
                let status = match e {
                    BookingError::InvalidAddress
                    | BookingError::InvalidIdentityNumber
                    | BookingError::InvalidDateFormat
                    | BookingError::OutOfBookingWindow
                    | BookingError::InvalidTicketCount
                    | BookingError::PassengerCountMismatch => StatusCode::BAD_REQUEST,
                    BookingError::DuplicateInProgress
                    | BookingError::SlotFull
                    | BookingError::PerIdentityLimitExceeded => StatusCode::CONFLICT,
                    BookingError::Timeout | BookingError::StoreUnavailable(_) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    BookingError::Unknown(_) => {
                        tracing::error!("booking failed unexpectedly: {}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.kind(), e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "kind": kind,
            "error": message,
        }));

        (status, body).into_response()
    }
}
