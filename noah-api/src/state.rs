use std::sync::Arc;

use noah_billing::{InvoiceRepository, ReceiptLedger};
use noah_booking::BookingLifecycle;
use noah_catalog::AmenityRepository;
use noah_payment::{PaymentOrchestrator, PaymentWatcher, WatcherConfig, WatcherRegistry};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret shared with the identity provider. Token issuance is
    /// external; this service only verifies.
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<BookingLifecycle>,
    pub amenities: Arc<dyn AmenityRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub receipts: Arc<ReceiptLedger>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub watcher: Arc<PaymentWatcher>,
    pub watchers: Arc<WatcherRegistry>,
    pub watcher_config: WatcherConfig,
    pub auth: AuthConfig,
    pub metrics: Arc<Metrics>,
}
