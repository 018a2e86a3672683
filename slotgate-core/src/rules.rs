use serde::Deserialize;

/// Venue booking rules. Defaults match the production venue; deploys
/// override individual values through configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRules {
    #[serde(default = "default_slot_capacity")]
    pub slot_capacity: i64,
    #[serde(default = "default_per_identity_limit")]
    pub per_identity_limit: i64,
    #[serde(default = "default_booking_window_days")]
    pub booking_window_days: i64,
    // Slots outside [open_hour, close_hour) are never bookable.
    #[serde(default = "default_open_hour")]
    pub open_hour: u32,
    #[serde(default = "default_close_hour")]
    pub close_hour: u32,
    #[serde(default = "default_attempt_timeout_seconds")]
    pub attempt_timeout_seconds: u64,
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,
}

fn default_slot_capacity() -> i64 {
    500
}
fn default_per_identity_limit() -> i64 {
    4
}
fn default_booking_window_days() -> i64 {
    60
}
fn default_open_hour() -> u32 {
    7
}
fn default_close_hour() -> u32 {
    21
}
fn default_attempt_timeout_seconds() -> u64 {
    10
}
fn default_session_ttl_seconds() -> u64 {
    1800
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            slot_capacity: default_slot_capacity(),
            per_identity_limit: default_per_identity_limit(),
            booking_window_days: default_booking_window_days(),
            open_hour: default_open_hour(),
            close_hour: default_close_hour(),
            attempt_timeout_seconds: default_attempt_timeout_seconds(),
            session_ttl_seconds: default_session_ttl_seconds(),
        }
    }
}
