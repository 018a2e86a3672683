use crate::slot::SlotKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Externally visible booking token, `BK-` followed by 8 uppercase hex
/// characters. Collisions are possible in principle; the ledger treats
/// a primary-key conflict on insert as fatal rather than retrying.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(String);

impl BookingId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("BK-{}", hex[..8].to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("BK-")?;
        if rest.len() == 8 && rest.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw submission as it arrives from the conversational front-end or a
/// direct caller. Nothing here is trusted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub username: String,
    pub email: String,
    pub identity_number: String,
    /// `YYYY-MM-DD HH`
    pub slot_time: String,
    pub ticket_count: u32,
    #[serde(default)]
    pub passenger_names: Vec<String>,
}

/// A fully validated request, ready for the ledger. Only the
/// orchestrator constructs these.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub username: String,
    pub email: String,
    pub identity_number: String,
    pub slot: SlotKey,
    pub ticket_count: u32,
    pub passenger_names: Vec<String>,
}

/// A committed booking as read back from the ledger. Immutable; this
/// core never deletes one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub username: String,
    pub email: String,
    pub identity_number: String,
    pub slot: SlotKey,
    pub ticket_count: u32,
    pub passenger_names: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub booking_id: BookingId,
    pub slot: SlotKey,
    pub ticket_count: u32,
    pub message: String,
}
