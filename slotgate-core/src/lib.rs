pub mod booking;
pub mod error;
pub mod events;
pub mod ledger;
pub mod notify;
pub mod rules;
pub mod slot;
pub mod validate;

pub use booking::{Booking, BookingConfirmation, BookingDraft, BookingId, BookingRequest};
pub use error::BookingError;
pub use events::BookingConfirmed;
pub use ledger::BookingLedger;
pub use notify::Notifier;
pub use rules::BookingRules;
pub use slot::SlotKey;
