use thiserror::Error;

/// Every way a booking attempt can fail. Validation variants are
/// rejected before the store is touched; the rest come out of the
/// ledger transaction, which has already rolled back by the time the
/// error is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("invalid email address")]
    InvalidAddress,
    #[error("identity number must be exactly 12 digits")]
    InvalidIdentityNumber,
    #[error("invalid slot format, expected YYYY-MM-DD HH")]
    InvalidDateFormat,
    #[error("requested slot is outside the booking window")]
    OutOfBookingWindow,
    #[error("ticket count must be between 1 and 4")]
    InvalidTicketCount,
    #[error("passenger name list must match the ticket count")]
    PassengerCountMismatch,
    #[error("a booking for this identity and slot is already in progress")]
    DuplicateInProgress,
    #[error("slot is full")]
    SlotFull,
    #[error("per-identity ticket limit reached for this slot")]
    PerIdentityLimitExceeded,
    #[error("booking attempt timed out")]
    Timeout,
    #[error("booking store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("unexpected store error: {0}")]
    Unknown(String),
}

impl BookingError {
    /// Stable machine-readable tag for API payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::InvalidAddress => "INVALID_ADDRESS",
            BookingError::InvalidIdentityNumber => "INVALID_IDENTITY_NUMBER",
            BookingError::InvalidDateFormat => "INVALID_DATE_FORMAT",
            BookingError::OutOfBookingWindow => "OUT_OF_BOOKING_WINDOW",
            BookingError::InvalidTicketCount => "INVALID_TICKET_COUNT",
            BookingError::PassengerCountMismatch => "PASSENGER_COUNT_MISMATCH",
            BookingError::DuplicateInProgress => "DUPLICATE_IN_PROGRESS",
            BookingError::SlotFull => "SLOT_FULL",
            BookingError::PerIdentityLimitExceeded => "PER_IDENTITY_LIMIT_EXCEEDED",
            BookingError::Timeout => "TIMEOUT",
            BookingError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            BookingError::Unknown(_) => "UNKNOWN",
        }
    }

    /// True for errors the caller can fix by changing the request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BookingError::InvalidAddress
                | BookingError::InvalidIdentityNumber
                | BookingError::InvalidDateFormat
                | BookingError::OutOfBookingWindow
                | BookingError::InvalidTicketCount
                | BookingError::PassengerCountMismatch
        )
    }
}
