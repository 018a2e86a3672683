use crate::booking::{Booking, BookingId};
use crate::slot::SlotKey;
use serde::{Deserialize, Serialize};

/// Published by the orchestrator after a ledger commit; consumed by the
/// notification dispatcher off the request path. Losing one never
/// affects the booking it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmed {
    pub booking_id: BookingId,
    pub username: String,
    pub email: String,
    pub slot: SlotKey,
    pub ticket_count: u32,
}

impl From<&Booking> for BookingConfirmed {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.booking_id.clone(),
            username: b.username.clone(),
            email: b.email.clone(),
            slot: b.slot,
            ticket_count: b.ticket_count,
        }
    }
}
