use crate::error::BookingError;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The hour-granularity bucket capacity is accounted against. Two
/// requests landing anywhere inside the same hour derive the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey(NaiveDateTime);

impl SlotKey {
    /// Truncate a timestamp to its slot: minutes, seconds and
    /// sub-second all zeroed.
    pub fn derive(t: NaiveDateTime) -> Self {
        let truncated = t
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t);
        Self(truncated)
    }

    /// Parse the wire format `YYYY-MM-DD HH` (a `T` separator is also
    /// accepted so the value survives URL paths).
    pub fn parse(s: &str) -> Result<Self, BookingError> {
        let s = s.trim();
        let (date_part, hour_part) = s
            .split_once(' ')
            .or_else(|| s.split_once('T'))
            .ok_or(BookingError::InvalidDateFormat)?;

        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|_| BookingError::InvalidDateFormat)?;
        let hour: u32 = hour_part
            .trim()
            .parse()
            .map_err(|_| BookingError::InvalidDateFormat)?;

        date.and_hms_opt(hour, 0, 0)
            .map(Self)
            .ok_or(BookingError::InvalidDateFormat)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Canonical textual form, also used as the advisory-lock hash
    /// input in the store. Must stay stable across releases.
    pub fn storage_key(&self) -> String {
        self.0.format("%Y-%m-%d %H:00").to_string()
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_hour_yields_equal_keys() {
        let a = SlotKey::derive(
            NaiveDate::from_ymd_opt(2026, 5, 1)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap(),
        );
        let b = SlotKey::derive(
            NaiveDate::from_ymd_opt(2026, 5, 1)
                .unwrap()
                .and_hms_milli_opt(15, 59, 59, 999)
                .unwrap(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_hours_differ() {
        let a = SlotKey::parse("2026-05-01 15").unwrap();
        let b = SlotKey::parse("2026-05-01 16").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_t_separator() {
        assert_eq!(
            SlotKey::parse("2026-05-01T09").unwrap(),
            SlotKey::parse("2026-05-01 9").unwrap()
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(SlotKey::parse("not a date"), Err(BookingError::InvalidDateFormat));
        assert_eq!(SlotKey::parse("2026-05-01"), Err(BookingError::InvalidDateFormat));
        assert_eq!(SlotKey::parse("2026-05-01 25"), Err(BookingError::InvalidDateFormat));
        assert_eq!(SlotKey::parse("2026-13-01 10"), Err(BookingError::InvalidDateFormat));
    }

    #[test]
    fn storage_key_is_stable() {
        let key = SlotKey::parse("2026-05-01 7").unwrap();
        assert_eq!(key.storage_key(), "2026-05-01 07:00");
    }
}
