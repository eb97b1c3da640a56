use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use noah_api::{app, metrics::Metrics, state::AuthConfig, worker, AppState};
use noah_billing::ReceiptLedger;
use noah_booking::{BookingClock, BookingLifecycle};
use noah_payment::{
    PaymentOrchestrator, PaymentWatcher, SePayConfig, SePayGateway, SessionStore, WatcherConfig,
    WatcherRegistry,
};
use noah_store::{
    Config, DbClient, PgAmenityRepository, PgApartmentRepository, PgBookingRepository,
    PgInvoiceRepository, PgReceiptRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noah_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting NOAH API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let bookings = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let amenities = Arc::new(PgAmenityRepository::new(db.pool.clone()));
    let apartments = Arc::new(PgApartmentRepository::new(db.pool.clone()));
    let invoices = Arc::new(PgInvoiceRepository::new(db.pool.clone()));
    let receipts_repo = Arc::new(PgReceiptRepository::new(db.pool.clone()));

    let lifecycle = Arc::new(BookingLifecycle::new(
        bookings,
        amenities.clone(),
        apartments,
        BookingClock::UtcOffsetHours(config.booking.utc_offset_hours),
    ));
    let receipts = Arc::new(ReceiptLedger::new(invoices.clone(), receipts_repo));

    let gateway = Arc::new(SePayGateway::new(SePayConfig {
        api_token: config.sepay.api_token.clone(),
        transactions_url: config.sepay.transactions_url.clone(),
        qr_base_url: config.sepay.qr_base_url.clone(),
        bank_id: config.sepay.bank_id.clone(),
        account_number: config.sepay.account_number.clone(),
        account_name: config.sepay.account_name.clone(),
    }));
    let sessions = Arc::new(SessionStore::new(chrono::Duration::seconds(
        config.booking.session_ttl_seconds as i64,
    )));
    let orchestrator = Arc::new(PaymentOrchestrator::new(gateway, sessions));
    let watcher = Arc::new(PaymentWatcher::new(
        orchestrator.clone(),
        lifecycle.clone(),
        receipts.clone(),
    ));

    let state = AppState {
        lifecycle,
        amenities,
        invoices,
        receipts,
        orchestrator,
        watcher,
        watchers: Arc::new(WatcherRegistry::new()),
        watcher_config: WatcherConfig {
            poll_interval: Duration::from_secs(config.booking.poll_interval_seconds),
            deadline: Duration::from_secs(config.booking.session_ttl_seconds),
        },
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        metrics: Arc::new(Metrics::new()),
    };

    worker::spawn_sweeper(
        state.clone(),
        Duration::from_secs(config.booking.sweep_interval_seconds),
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
