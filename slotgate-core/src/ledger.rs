use crate::booking::{Booking, BookingDraft};
use crate::error::BookingError;
use crate::slot::SlotKey;
use async_trait::async_trait;

/// The transactional store of bookings and the sole arbiter of
/// capacity. `attempt_booking` is the only write path; no other code
/// may touch booking or lock rows.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// One atomic attempt: lock the (identity, slot) pair, re-check
    /// capacity under the store's own locking, insert, commit. Any
    /// failure rolls back fully, including the lock.
    async fn attempt_booking(&self, draft: &BookingDraft) -> Result<Booking, BookingError>;

    /// Most recent committed booking for an identity + address, for
    /// the re-notify flow. Read-only.
    async fn latest_booking(
        &self,
        identity_number: &str,
        email: &str,
    ) -> Result<Option<Booking>, BookingError>;

    /// Remaining capacity for a slot. Read-only, advisory; the real
    /// check happens again inside `attempt_booking`.
    async fn slot_availability(&self, slot: SlotKey) -> Result<i64, BookingError>;
}
