use crate::events::BookingConfirmed;
use async_trait::async_trait;

/// Delivery seam for confirmation artifacts. Implementations own their
/// retry policy; a failure here must never reach back into a committed
/// booking.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(
        &self,
        event: &BookingConfirmed,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
