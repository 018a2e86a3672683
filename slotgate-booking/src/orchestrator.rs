use chrono::Local;
use slotgate_core::booking::{BookingConfirmation, BookingDraft, BookingRequest};
use slotgate_core::error::BookingError;
use slotgate_core::events::BookingConfirmed;
use slotgate_core::ledger::BookingLedger;
use slotgate_core::rules::BookingRules;
use slotgate_core::slot::SlotKey;
use slotgate_core::validate::{valid_email, valid_identity_number, validate_slot_window};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::warn;

/// Sequences a booking: validation, slot derivation, the ledger
/// transaction, then the out-of-band confirmation event. Holds no
/// mutable state of its own; every instance of the service runs one.
pub struct BookingOrchestrator {
    ledger: Arc<dyn BookingLedger>,
    events: mpsc::Sender<BookingConfirmed>,
    rules: BookingRules,
}

impl BookingOrchestrator {
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        events: mpsc::Sender<BookingConfirmed>,
        rules: BookingRules,
    ) -> Self {
        Self {
            ledger,
            events,
            rules,
        }
    }

    pub async fn book(&self, request: &BookingRequest) -> Result<BookingConfirmation, BookingError> {
        let draft = self.validate(request)?;

        let attempt = self.ledger.attempt_booking(&draft);
        let booking = match timeout(
            Duration::from_secs(self.rules.attempt_timeout_seconds),
            attempt,
        )
        .await
        {
            Ok(result) => result?,
            // The transaction may still commit behind our back; the
            // caller has to resubmit and will then see the duplicate
            // or limit error if it did.
            Err(_) => return Err(BookingError::Timeout),
        };

        self.publish(BookingConfirmed::from(&booking));

        Ok(BookingConfirmation {
            booking_id: booking.booking_id.clone(),
            slot: booking.slot,
            ticket_count: booking.ticket_count,
            message: format!(
                "Booking confirmed: {} ticket(s) for {} at slot {}. Booking ID: {}",
                booking.ticket_count, booking.username, booking.slot, booking.booking_id
            ),
        })
    }

    /// Re-notify flow: look up the most recent booking for an identity
    /// and address and republish its confirmation event. Never writes.
    pub async fn resend_latest(
        &self,
        identity_number: &str,
        email: &str,
    ) -> Result<Option<BookingConfirmed>, BookingError> {
        if !valid_identity_number(identity_number) {
            return Err(BookingError::InvalidIdentityNumber);
        }
        if !valid_email(email) {
            return Err(BookingError::InvalidAddress);
        }

        let Some(booking) = self.ledger.latest_booking(identity_number, email).await? else {
            return Ok(None);
        };

        let event = BookingConfirmed::from(&booking);
        self.publish(event.clone());
        Ok(Some(event))
    }

    pub async fn availability(&self, slot_time: &str) -> Result<i64, BookingError> {
        let slot = SlotKey::parse(slot_time)?;
        self.ledger.slot_availability(slot).await
    }

    fn validate(&self, request: &BookingRequest) -> Result<BookingDraft, BookingError> {
        if !valid_email(&request.email) {
            return Err(BookingError::InvalidAddress);
        }
        if !valid_identity_number(&request.identity_number) {
            return Err(BookingError::InvalidIdentityNumber);
        }
        if request.ticket_count < 1 || request.ticket_count as i64 > self.rules.per_identity_limit {
            return Err(BookingError::InvalidTicketCount);
        }

        // A single ticket means the requester travels alone; the list
        // may be omitted. Anything else must match the count exactly.
        let passenger_names = if request.ticket_count == 1 {
            match request.passenger_names.len() {
                0 => vec![request.username.clone()],
                1 => request.passenger_names.clone(),
                _ => return Err(BookingError::PassengerCountMismatch),
            }
        } else {
            if request.passenger_names.len() != request.ticket_count as usize {
                return Err(BookingError::PassengerCountMismatch);
            }
            request.passenger_names.clone()
        };

        let slot = SlotKey::parse(&request.slot_time)?;
        validate_slot_window(slot, Local::now().naive_local(), &self.rules)?;

        Ok(BookingDraft {
            username: request.username.clone(),
            email: request.email.clone(),
            identity_number: request.identity_number.clone(),
            slot,
            ticket_count: request.ticket_count,
            passenger_names,
        })
    }

    fn publish(&self, event: BookingConfirmed) {
        // Fire and forget: a full or closed channel costs the requester
        // their email, never their booking.
        if let Err(e) = self.events.try_send(event) {
            warn!("failed to queue confirmation event: {}", e);
        }
    }
}

/// In-memory ledger with the same lock and capacity semantics as the
/// Postgres implementation. Backs local development and the test
/// suites; never wired up in production.
pub struct MemoryLedger {
    state: std::sync::Mutex<MemoryState>,
    rules: BookingRules,
    hold: Duration,
}

#[derive(Default)]
struct MemoryState {
    bookings: Vec<slotgate_core::booking::Booking>,
    locks: std::collections::HashSet<(String, SlotKey)>,
    attempts: u64,
}

impl MemoryLedger {
    pub fn new(rules: BookingRules) -> Self {
        Self::with_hold(rules, Duration::ZERO)
    }

    /// Keep the pair lock held for `hold` before the capacity checks,
    /// to widen the race window in concurrency tests.
    pub fn with_hold(rules: BookingRules, hold: Duration) -> Self {
        Self {
            state: std::sync::Mutex::new(MemoryState::default()),
            rules,
            hold,
        }
    }

    /// Number of attempts that reached the ledger at all.
    pub fn attempts(&self) -> u64 {
        self.lock_state().attempts
    }

    /// Pre-load committed tickets, bypassing the attempt path.
    pub fn seed(&self, identity_number: &str, email: &str, slot: SlotKey, ticket_count: u32) {
        let mut st = self.lock_state();
        st.bookings.push(slotgate_core::booking::Booking {
            booking_id: slotgate_core::booking::BookingId::generate(),
            username: "seed".to_string(),
            email: email.to_string(),
            identity_number: identity_number.to_string(),
            slot,
            ticket_count,
            passenger_names: Vec::new(),
            created_at: chrono::Utc::now(),
        });
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl BookingLedger for MemoryLedger {
    async fn attempt_booking(
        &self,
        draft: &BookingDraft,
    ) -> Result<slotgate_core::booking::Booking, BookingError> {
        let pair = (draft.identity_number.clone(), draft.slot);
        {
            let mut st = self.lock_state();
            st.attempts += 1;
            if !st.locks.insert(pair.clone()) {
                return Err(BookingError::DuplicateInProgress);
            }
        }

        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }

        let mut st = self.lock_state();
        let count = draft.ticket_count as i64;
        let slot_total: i64 = st
            .bookings
            .iter()
            .filter(|b| b.slot == draft.slot)
            .map(|b| b.ticket_count as i64)
            .sum();
        let identity_total: i64 = st
            .bookings
            .iter()
            .filter(|b| b.slot == draft.slot && b.identity_number == draft.identity_number)
            .map(|b| b.ticket_count as i64)
            .sum();

        let result = if slot_total + count > self.rules.slot_capacity {
            Err(BookingError::SlotFull)
        } else if identity_total + count > self.rules.per_identity_limit {
            Err(BookingError::PerIdentityLimitExceeded)
        } else {
            let booking = slotgate_core::booking::Booking {
                booking_id: slotgate_core::booking::BookingId::generate(),
                username: draft.username.clone(),
                email: draft.email.clone(),
                identity_number: draft.identity_number.clone(),
                slot: draft.slot,
                ticket_count: draft.ticket_count,
                passenger_names: draft.passenger_names.clone(),
                created_at: chrono::Utc::now(),
            };
            st.bookings.push(booking.clone());
            Ok(booking)
        };

        st.locks.remove(&pair);
        result
    }

    async fn latest_booking(
        &self,
        identity_number: &str,
        email: &str,
    ) -> Result<Option<slotgate_core::booking::Booking>, BookingError> {
        let st = self.lock_state();
        Ok(st
            .bookings
            .iter()
            .filter(|b| b.identity_number == identity_number && b.email == email)
            .max_by_key(|b| b.slot)
            .cloned())
    }

    async fn slot_availability(&self, slot: SlotKey) -> Result<i64, BookingError> {
        let st = self.lock_state();
        let booked: i64 = st
            .bookings
            .iter()
            .filter(|b| b.slot == slot)
            .map(|b| b.ticket_count as i64)
            .sum();
        Ok((self.rules.slot_capacity - booked).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn future_slot(days: i64) -> String {
        let date = Local::now().date_naive() + ChronoDuration::days(days);
        format!("{} 10", date.format("%Y-%m-%d"))
    }

    fn request(identity: &str, slot_time: String, count: u32, passengers: Vec<&str>) -> BookingRequest {
        BookingRequest {
            username: "Rugved".to_string(),
            email: "rugved@example.com".to_string(),
            identity_number: identity.to_string(),
            slot_time,
            ticket_count: count,
            passenger_names: passengers.into_iter().map(String::from).collect(),
        }
    }

    fn setup(ledger: Arc<MemoryLedger>) -> (BookingOrchestrator, mpsc::Receiver<BookingConfirmed>) {
        let (tx, rx) = mpsc::channel(16);
        (
            BookingOrchestrator::new(ledger, tx, BookingRules::default()),
            rx,
        )
    }

    #[tokio::test]
    async fn successful_booking_confirms_and_publishes() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let (orch, mut rx) = setup(ledger);

        let confirmation = orch
            .book(&request("123456789012", future_slot(2), 2, vec!["Rugved", "Sandeep"]))
            .await
            .unwrap();

        assert!(confirmation.booking_id.as_str().starts_with("BK-"));
        assert_eq!(confirmation.ticket_count, 2);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.booking_id, confirmation.booking_id);
        assert_eq!(event.email, "rugved@example.com");
    }

    #[tokio::test]
    async fn passenger_mismatch_never_reaches_ledger() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let (orch, _rx) = setup(ledger.clone());

        let err = orch
            .book(&request("123456789012", future_slot(2), 2, vec!["only one"]))
            .await
            .unwrap_err();

        assert_eq!(err, BookingError::PassengerCountMismatch);
        assert_eq!(ledger.attempts(), 0);
    }

    #[tokio::test]
    async fn thirteen_digit_identity_always_rejected() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let (orch, _rx) = setup(ledger.clone());

        let err = orch
            .book(&request("1234567890123", future_slot(2), 1, vec![]))
            .await
            .unwrap_err();

        assert_eq!(err, BookingError::InvalidIdentityNumber);
        assert_eq!(ledger.attempts(), 0);
    }

    #[tokio::test]
    async fn ninety_days_out_is_outside_the_window() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let (orch, _rx) = setup(ledger);

        let err = orch
            .book(&request("123456789012", future_slot(90), 1, vec![]))
            .await
            .unwrap_err();

        assert_eq!(err, BookingError::OutOfBookingWindow);
    }

    #[tokio::test]
    async fn slot_capacity_boundary() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let slot = SlotKey::parse(&future_slot(2)).unwrap();
        // 498 seats already gone, spread over other identities.
        ledger.seed("999999999991", "a@b.com", slot, 4);
        for i in 0..247 {
            ledger.seed(&format!("888888888{:03}", i), "a@b.com", slot, 2);
        }
        let (orch, _rx) = setup(ledger);

        let err = orch
            .book(&request("123456789012", future_slot(2), 3, vec!["a", "b", "c"]))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::SlotFull);

        let ok = orch
            .book(&request("123456789012", future_slot(2), 2, vec!["a", "b"]))
            .await;
        assert!(ok.is_ok());

        assert_eq!(orch.availability(&future_slot(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn per_identity_limit_boundary() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let slot = SlotKey::parse(&future_slot(2)).unwrap();
        ledger.seed("123456789012", "rugved@example.com", slot, 3);
        let (orch, _rx) = setup(ledger);

        let err = orch
            .book(&request("123456789012", future_slot(2), 2, vec!["a", "b"]))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::PerIdentityLimitExceeded);

        let ok = orch
            .book(&request("123456789012", future_slot(2), 1, vec![]))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_same_pair_attempts_exactly_one_wins() {
        let ledger = Arc::new(MemoryLedger::with_hold(
            BookingRules::default(),
            Duration::from_millis(50),
        ));
        let (tx, _rx) = mpsc::channel(16);
        let orch = Arc::new(BookingOrchestrator::new(
            ledger,
            tx,
            BookingRules::default(),
        ));

        let a = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.book(&request("123456789012", future_slot(2), 1, vec![]))
                    .await
            })
        };
        let b = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.book(&request("123456789012", future_slot(2), 1, vec![]))
                    .await
            })
        };

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        let outcomes = [ra, rb];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(BookingError::DuplicateInProgress)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn closed_event_channel_does_not_fail_the_booking() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let orch = BookingOrchestrator::new(ledger, tx, BookingRules::default());

        let ok = orch
            .book(&request("123456789012", future_slot(2), 1, vec![]))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn resend_latest_finds_and_republishes() {
        let ledger = Arc::new(MemoryLedger::new(BookingRules::default()));
        let slot = SlotKey::parse(&future_slot(2)).unwrap();
        ledger.seed("123456789012", "rugved@example.com", slot, 2);
        let (orch, mut rx) = setup(ledger);

        let found = orch
            .resend_latest("123456789012", "rugved@example.com")
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(rx.recv().await.is_some());

        let missing = orch
            .resend_latest("123456789012", "other@example.com")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
