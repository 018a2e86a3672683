use crate::error::BookingError;
use crate::rules::BookingRules;
use crate::slot::SlotKey;
use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.+-]+@[A-Za-z0-9-]+\.[A-Za-z0-9-.]+$")
            .expect("email pattern is valid")
    })
}

/// Conventional local@domain shape. Not full RFC 5322; the same shape
/// the notification sink can actually deliver to.
pub fn valid_email(s: &str) -> bool {
    email_re().is_match(s)
}

/// Exactly 12 ASCII digits, nothing else.
pub fn valid_identity_number(s: &str) -> bool {
    s.len() == 12 && s.bytes().all(|b| b.is_ascii_digit())
}

/// A slot is bookable iff it lies between `now` and `now +
/// booking_window_days`, and its hour falls inside the venue's open
/// hours. The hour check applies on every path, conversational or
/// direct.
pub fn validate_slot_window(
    slot: SlotKey,
    now: NaiveDateTime,
    rules: &BookingRules,
) -> Result<(), BookingError> {
    let t = slot.as_naive();
    let max = now + Duration::days(rules.booking_window_days);
    if t < now || t > max {
        return Err(BookingError::OutOfBookingWindow);
    }
    if slot.hour() < rules.open_hour || slot.hour() >= rules.close_hour {
        return Err(BookingError::OutOfBookingWindow);
    }
    Ok(())
}
