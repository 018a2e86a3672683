pub mod dispatcher;
pub mod orchestrator;
pub mod session;

pub use dispatcher::{EmailNotifier, NotificationDispatcher};
pub use orchestrator::{BookingOrchestrator, MemoryLedger};
pub use session::{BookingSession, MemorySessionStore, RedisSessionStore, SessionStore};
