use slotgate_booking::{BookingOrchestrator, SessionStore};
use slotgate_core::rules::BookingRules;
use slotgate_store::RedisClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BookingOrchestrator>,
    pub sessions: Arc<dyn SessionStore>,
    pub redis: Arc<RedisClient>,
    pub rules: BookingRules,
}
