use slotgate_core::events::BookingConfirmed;
use slotgate_core::notify::Notifier;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Consumes confirmation events off the request path and hands them to
/// the notifier. A delivery failure is logged against the booking id
/// and dropped; the booking it belongs to is already committed.
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    pub fn spawn(
        mut rx: mpsc::Receiver<BookingConfirmed>,
        notifier: Arc<dyn Notifier>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("notification dispatcher started");
            while let Some(event) = rx.recv().await {
                if let Err(e) = notifier.send_confirmation(&event).await {
                    error!(
                        booking_id = %event.booking_id,
                        "confirmation delivery failed: {}", e
                    );
                }
            }
            info!("notification channel closed, dispatcher stopping");
        })
    }
}

/// Renders the confirmation artifact and hands it to the mail
/// transport. The transport itself lives with the delivery
/// collaborator; here the rendered artifact is logged.
pub struct EmailNotifier;

impl EmailNotifier {
    pub fn render(event: &BookingConfirmed) -> String {
        format!(
            "Dear {},\n\nYour booking is confirmed.\n\n\
             Booking ID: {}\nSlot: {}\nTickets: {}\n\n\
             Please carry a valid identity document for entry.",
            event.username, event.booking_id, event.slot, event.ticket_count
        )
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send_confirmation(
        &self,
        event: &BookingConfirmed,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let body = Self::render(event);
        info!(
            booking_id = %event.booking_id,
            to = %event.email,
            "sending confirmation ({} bytes)", body.len()
        );
        Ok(())
    }
}
