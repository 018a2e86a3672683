use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use slotgate_core::booking::BookingRequest;
use slotgate_core::error::BookingError;
use slotgate_core::rules::BookingRules;
use slotgate_core::slot::SlotKey;
use slotgate_core::validate::{valid_email, valid_identity_number, validate_slot_window};
use slotgate_store::RedisClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One field collected per state, in order. Stored in the external
/// session store between turns so any instance can serve any turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    AwaitingName,
    AwaitingAddress,
    AwaitingIdentity,
    AwaitingSlot,
    AwaitingCount,
    AwaitingPassengers,
    AwaitingConfirmation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSession {
    pub state: SessionState,
    pub username: Option<String>,
    pub email: Option<String>,
    pub identity_number: Option<String>,
    pub slot_time: Option<String>,
    pub ticket_count: Option<u32>,
    pub passenger_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum SessionInput {
    Name(String),
    Address(String),
    Identity(String),
    Slot(String),
    Count(u32),
    Passengers(Vec<String>),
    Confirm,
    Decline,
}

#[derive(Debug)]
pub enum SessionOutcome {
    /// The next question to relay to the requester.
    Prompt(String),
    /// All fields collected and confirmed; hand this to the
    /// orchestrator.
    ReadyToBook(BookingRequest),
    Cancelled,
}

impl Default for BookingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingName,
            username: None,
            email: None,
            identity_number: None,
            slot_time: None,
            ticket_count: None,
            passenger_names: Vec::new(),
        }
    }

    /// Question for the current state, used both on entry and when the
    /// requester answers out of turn.
    pub fn prompt(&self) -> String {
        match self.state {
            SessionState::AwaitingName => "Please tell me your name.".to_string(),
            SessionState::AwaitingAddress => {
                "Please provide your email address, e.g. xyz@abc.com.".to_string()
            }
            SessionState::AwaitingIdentity => {
                "Please provide your 12-digit identity number.".to_string()
            }
            SessionState::AwaitingSlot => {
                "Enter your preferred date and hour, e.g. 2026-05-01 15.".to_string()
            }
            SessionState::AwaitingCount => {
                "How many tickets would you like (1-4)?".to_string()
            }
            SessionState::AwaitingPassengers => format!(
                "Please list the {} passenger names.",
                self.ticket_count.unwrap_or(0)
            ),
            SessionState::AwaitingConfirmation => "Confirm your booking? (yes/no)".to_string(),
        }
    }

    /// Consume one input. A validated field advances the state; a
    /// field error leaves the session where it was so the requester
    /// can retry; an answer for the wrong state just re-prompts.
    pub fn apply(
        &mut self,
        input: SessionInput,
        now: NaiveDateTime,
        rules: &BookingRules,
    ) -> Result<SessionOutcome, BookingError> {
        use SessionInput as In;
        use SessionState as St;

        if let In::Decline = input {
            return Ok(SessionOutcome::Cancelled);
        }

        match (self.state, input) {
            (St::AwaitingName, In::Name(name)) => {
                self.username = Some(name);
                self.state = St::AwaitingAddress;
            }
            (St::AwaitingAddress, In::Address(addr)) => {
                if !valid_email(&addr) {
                    return Err(BookingError::InvalidAddress);
                }
                self.email = Some(addr);
                self.state = St::AwaitingIdentity;
            }
            (St::AwaitingIdentity, In::Identity(id)) => {
                if !valid_identity_number(&id) {
                    return Err(BookingError::InvalidIdentityNumber);
                }
                self.identity_number = Some(id);
                self.state = St::AwaitingSlot;
            }
            (St::AwaitingSlot, In::Slot(s)) => {
                let slot = SlotKey::parse(&s)?;
                validate_slot_window(slot, now, rules)?;
                self.slot_time = Some(slot.as_naive().format("%Y-%m-%d %H").to_string());
                self.state = St::AwaitingCount;
            }
            (St::AwaitingCount, In::Count(count)) => {
                if count < 1 || count as i64 > rules.per_identity_limit {
                    return Err(BookingError::InvalidTicketCount);
                }
                self.ticket_count = Some(count);
                if count == 1 {
                    // Single ticket: the requester travels alone.
                    self.passenger_names = self.username.iter().cloned().collect();
                    self.state = St::AwaitingConfirmation;
                } else {
                    self.state = St::AwaitingPassengers;
                }
            }
            (St::AwaitingPassengers, In::Passengers(names)) => {
                if Some(names.len() as u32) != self.ticket_count {
                    return Err(BookingError::PassengerCountMismatch);
                }
                self.passenger_names = names;
                self.state = St::AwaitingConfirmation;
            }
            (St::AwaitingConfirmation, In::Confirm) => {
                return Ok(SessionOutcome::ReadyToBook(self.assemble()));
            }
            // Out-of-turn answer: keep state, ask again.
            _ => {}
        }

        Ok(SessionOutcome::Prompt(self.prompt()))
    }

    fn assemble(&self) -> BookingRequest {
        BookingRequest {
            username: self.username.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            identity_number: self.identity_number.clone().unwrap_or_default(),
            slot_time: self.slot_time.clone().unwrap_or_default(),
            ticket_count: self.ticket_count.unwrap_or(0),
            passenger_names: self.passenger_names.clone(),
        }
    }
}

/// Keyed session persistence. The front-end never keeps sessions in
/// process memory.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<BookingSession>, BookingError>;
    async fn save(&self, session_id: &str, session: &BookingSession) -> Result<(), BookingError>;
    async fn clear(&self, session_id: &str) -> Result<(), BookingError>;
}

pub struct RedisSessionStore {
    client: Arc<RedisClient>,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(client: Arc<RedisClient>, ttl_seconds: u64) -> Self {
        Self {
            client,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<BookingSession>, BookingError> {
        let raw = self
            .client
            .get_session(session_id)
            .await
            .map_err(|e| BookingError::StoreUnavailable(e.to_string()))?;
        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| BookingError::Unknown(format!("corrupt session payload: {}", e))),
            None => Ok(None),
        }
    }

    async fn save(&self, session_id: &str, session: &BookingSession) -> Result<(), BookingError> {
        let json = serde_json::to_string(session)
            .map_err(|e| BookingError::Unknown(e.to_string()))?;
        self.client
            .set_session(session_id, &json, self.ttl_seconds)
            .await
            .map_err(|e| BookingError::StoreUnavailable(e.to_string()))
    }

    async fn clear(&self, session_id: &str) -> Result<(), BookingError> {
        self.client
            .del_session(session_id)
            .await
            .map_err(|e| BookingError::StoreUnavailable(e.to_string()))
    }
}

/// Hash-map store for tests and local development.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, BookingSession>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<BookingSession>, BookingError> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned())
    }

    async fn save(&self, session_id: &str, session: &BookingSession) -> Result<(), BookingError> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), session.clone());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), BookingError> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        Ok(())
    }
}
