use slotgate_api::{app, AppState};
use slotgate_booking::{
    BookingOrchestrator, EmailNotifier, NotificationDispatcher, RedisSessionStore,
};
use slotgate_store::{DbClient, PgBookingLedger, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotgate_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = slotgate_store::app_config::Config::load()?;
    tracing::info!("Starting Slotgate API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url).await?;
    db.migrate().await?;

    let redis = Arc::new(RedisClient::new(&config.redis.url).await?);

    let rules = config.booking.clone();
    let ledger = Arc::new(PgBookingLedger::new(db.pool.clone(), rules.clone()));

    // Confirmation events leave the request path here; the dispatcher
    // owns delivery.
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(256);
    let _dispatcher = NotificationDispatcher::spawn(event_rx, Arc::new(EmailNotifier));

    let orchestrator = Arc::new(BookingOrchestrator::new(ledger, event_tx, rules.clone()));
    let sessions = Arc::new(RedisSessionStore::new(
        redis.clone(),
        rules.session_ttl_seconds,
    ));

    let app_state = AppState {
        orchestrator,
        sessions,
        redis,
        rules,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
