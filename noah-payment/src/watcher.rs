use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use noah_billing::{CreateReceipt, ReceiptLedger};
use noah_booking::{BookingLifecycle, PaymentState};

use crate::gateway::GatewayStatus;
use crate::orchestrator::PaymentOrchestrator;
use crate::session::{PaymentSession, SessionState};

#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            deadline: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Paid,
    Failed,
    Cancelled,
    TimedOut,
    /// A newer payment attempt replaced this one; the booking is untouched.
    Superseded,
}

impl WatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchOutcome::Paid => "paid",
            WatchOutcome::Failed => "failed",
            WatchOutcome::Cancelled => "cancelled",
            WatchOutcome::TimedOut => "timed_out",
            WatchOutcome::Superseded => "superseded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CancelKind {
    User,
    Superseded,
}

/// Cancel side of a running watcher. Signalling after the watcher finished
/// is a no-op.
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<Option<CancelKind>>,
}

impl CancelHandle {
    /// User-initiated cancel: the watcher cancels the booking too.
    pub fn cancel(&self) {
        let _ = self.tx.send(Some(CancelKind::User));
    }

    /// A replacement attempt is taking over; the watcher stops without
    /// touching the booking.
    pub fn supersede(&self) {
        let _ = self.tx.send(Some(CancelKind::Superseded));
    }
}

/// Owns one payment attempt's poll task: cancel it, or await its outcome.
pub struct WatcherHandle {
    cancel: CancelHandle,
    task: JoinHandle<WatchOutcome>,
}

impl WatcherHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<WatchOutcome, tokio::task::JoinError> {
        let WatcherHandle { cancel, task } = self;
        let outcome = task.await;
        drop(cancel);
        outcome
    }

    pub fn into_parts(self) -> (CancelHandle, JoinHandle<WatchOutcome>) {
        (self.cancel, self.task)
    }
}

/// Server-side replacement for the browser payment dialog: one cancellable
/// task owns the 3-second poll cadence and the 5-minute deadline, and drives
/// every state transition exactly once. The select loop exiting on the first
/// terminal event is what guarantees single handling; there are no re-entry
/// flags to keep in sync.
pub struct PaymentWatcher {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub lifecycle: Arc<BookingLifecycle>,
    pub receipts: Arc<ReceiptLedger>,
}

impl PaymentWatcher {
    pub fn new(
        orchestrator: Arc<PaymentOrchestrator>,
        lifecycle: Arc<BookingLifecycle>,
        receipts: Arc<ReceiptLedger>,
    ) -> Self {
        Self {
            orchestrator,
            lifecycle,
            receipts,
        }
    }

    pub fn spawn(self: Arc<Self>, session: PaymentSession, config: WatcherConfig) -> WatcherHandle {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(self.run(session, config, rx));
        WatcherHandle {
            cancel: CancelHandle { tx },
            task,
        }
    }

    async fn run(
        self: Arc<Self>,
        session: PaymentSession,
        config: WatcherConfig,
        mut cancel_rx: watch::Receiver<Option<CancelKind>>,
    ) -> WatchOutcome {
        let order_code = session.order_code.clone();
        let mut ticker = tokio::time::interval(config.poll_interval);
        let deadline = tokio::time::sleep(config.deadline);
        tokio::pin!(deadline);
        // Stop listening if the cancel side is dropped without firing.
        let mut cancel_open = true;

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!(%order_code, "payment window elapsed");
                    self.settle_abandoned(&session, "timeout", SessionState::Expired).await;
                    return WatchOutcome::TimedOut;
                }
                changed = cancel_rx.changed(), if cancel_open => {
                    match changed {
                        Ok(()) => {
                            let kind = *cancel_rx.borrow();
                            match kind {
                                Some(CancelKind::User) => {
                                    info!(%order_code, "payment cancelled by user");
                                    self.settle_abandoned(&session, "user cancelled", SessionState::Cancelled).await;
                                    return WatchOutcome::Cancelled;
                                }
                                Some(CancelKind::Superseded) => {
                                    info!(%order_code, "payment attempt superseded");
                                    self.orchestrator
                                        .sessions()
                                        .set_state(&order_code, SessionState::Cancelled);
                                    return WatchOutcome::Superseded;
                                }
                                None => {}
                            }
                        }
                        Err(_) => cancel_open = false,
                    }
                }
                _ = ticker.tick() => {
                    match self.orchestrator.check_status(&order_code).await {
                        Ok(GatewayStatus::Paid) => {
                            self.settle_paid(&session).await;
                            return WatchOutcome::Paid;
                        }
                        Ok(GatewayStatus::Failed) => {
                            self.settle_abandoned(&session, "payment failed", SessionState::Failed).await;
                            return WatchOutcome::Failed;
                        }
                        Ok(GatewayStatus::Cancelled) => {
                            self.settle_abandoned(&session, "payment cancelled by provider", SessionState::Cancelled).await;
                            return WatchOutcome::Failed;
                        }
                        Ok(GatewayStatus::Pending) => {}
                        Err(err) => {
                            // Transient; the next tick retries.
                            warn!(%order_code, %err, "payment status check failed");
                        }
                    }
                }
            }
        }
    }

    async fn settle_paid(&self, session: &PaymentSession) {
        let order_code = &session.order_code;

        if let Some(invoice_id) = session.target.invoice_id {
            let receipt = self
                .receipts
                .create_for_invoice(CreateReceipt {
                    invoice_id,
                    amount_vnd: session.amount_vnd,
                    payment_method_code: "VIETQR".to_string(),
                    payment_date: Utc::now(),
                    note: Some(session.description.clone()),
                })
                .await;
            match receipt {
                Ok((receipt, created)) => {
                    if created {
                        info!(%order_code, receipt_no = %receipt.receipt_no, "receipt issued");
                    }
                }
                // Payment stands even when bookkeeping hiccups.
                Err(err) => warn!(%order_code, %err, "failed to issue receipt"),
            }
        }

        if let Some(booking_id) = session.target.booking_id {
            if let Err(err) = self.lifecycle.confirm_booking(booking_id).await {
                warn!(%order_code, %booking_id, %err, "confirm after payment failed");
            }
            if let Err(err) = self
                .lifecycle
                .update_payment_status(booking_id, PaymentState::Paid)
                .await
            {
                warn!(%order_code, %booking_id, %err, "payment-state update failed");
            }
        }

        self.orchestrator
            .sessions()
            .set_state(order_code, SessionState::Paid);
        info!(%order_code, "payment settled");
    }

    async fn settle_abandoned(
        &self,
        session: &PaymentSession,
        reason: &str,
        state: SessionState,
    ) {
        if let Some(booking_id) = session.target.booking_id {
            if let Err(err) = self.lifecycle.cancel_booking(booking_id, reason).await {
                warn!(
                    order_code = %session.order_code,
                    %booking_id,
                    %err,
                    "cancel after abandoned payment failed"
                );
            }
        }
        self.orchestrator
            .sessions()
            .set_state(&session.order_code, state);
    }
}

/// Live cancel handles keyed by order code. The API layer inserts on spawn
/// and removes when the watcher's outcome is recorded.
#[derive(Default)]
pub struct WatcherRegistry {
    inner: Mutex<HashMap<String, CancelHandle>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order_code: String, handle: CancelHandle) {
        self.inner
            .lock()
            .expect("watcher registry poisoned")
            .insert(order_code, handle);
    }

    /// Signals the watcher for an order code. Returns false when no watcher
    /// is live (already finished, or the process restarted).
    pub fn cancel(&self, order_code: &str) -> bool {
        let inner = self.inner.lock().expect("watcher registry poisoned");
        match inner.get(order_code) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Stops the watcher for an order code without touching its booking.
    pub fn supersede(&self, order_code: &str) -> bool {
        let inner = self.inner.lock().expect("watcher registry poisoned");
        match inner.get(order_code) {
            Some(handle) => {
                handle.supersede();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, order_code: &str) {
        self.inner
            .lock()
            .expect("watcher registry poisoned")
            .remove(order_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::MockGateway;
    use crate::session::{PaymentTarget, SessionStore};
    use noah_billing::{
        Invoice, InvoiceRepository, MemoryInvoiceRepository, MemoryReceiptRepository,
        ReceiptLedger, ReceiptRepository,
    };
    use noah_booking::{
        BookingClock, BookingStatus, CreateBooking, MemoryBookingRepository,
    };
    use noah_catalog::{Amenity, AmenityRepository, MemoryAmenityRepository, PackageTerm};
    use noah_core::residence::{Apartment, MemoryApartmentDirectory};
    use uuid::Uuid;

    struct Harness {
        watcher: Arc<PaymentWatcher>,
        gateway: Arc<MockGateway>,
        lifecycle: Arc<BookingLifecycle>,
        receipts_repo: Arc<MemoryReceiptRepository>,
        invoices: Arc<MemoryInvoiceRepository>,
        booking_id: Uuid,
    }

    async fn harness(statuses: Vec<GatewayStatus>) -> Harness {
        let bookings = Arc::new(MemoryBookingRepository::new());
        let amenities = Arc::new(MemoryAmenityRepository::new());
        let apartments = Arc::new(MemoryApartmentDirectory::new());

        let amenity = Amenity::new("Gym", None);
        let amenity_id = amenity.amenity_id;
        amenities.create_amenity(&amenity).await.unwrap();
        let package = noah_catalog::AmenityPackage::new(
            amenity_id,
            "1 month",
            300_000,
            PackageTerm::Months(1),
        );
        let package_id = package.package_id;
        amenities.create_package(&package).await.unwrap();

        let user_id = Uuid::new_v4();
        let apartment = Apartment {
            apartment_id: Uuid::new_v4(),
            code: "B-0704".into(),
            floor: Some(7),
        };
        apartments.insert(apartment.clone());
        apartments.register_resident(user_id, apartment.apartment_id);

        let lifecycle = Arc::new(BookingLifecycle::new(
            bookings,
            amenities,
            apartments,
            BookingClock::Fixed(chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
        ));

        let booking = lifecycle
            .create_booking(
                user_id,
                CreateBooking {
                    amenity_id,
                    package_id,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let invoices = Arc::new(MemoryInvoiceRepository::new());
        let receipts_repo = Arc::new(MemoryReceiptRepository::new());
        let receipts = Arc::new(ReceiptLedger::new(invoices.clone(), receipts_repo.clone()));

        let gateway = Arc::new(MockGateway::scripted(statuses));
        let sessions = Arc::new(SessionStore::new(chrono::Duration::minutes(5)));
        let orchestrator = Arc::new(PaymentOrchestrator::new(gateway.clone(), sessions));

        Harness {
            watcher: Arc::new(PaymentWatcher::new(orchestrator, lifecycle.clone(), receipts)),
            gateway,
            lifecycle,
            receipts_repo,
            invoices,
            booking_id: booking.booking_id,
        }
    }

    fn fast_config() -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_secs(3),
            deadline: Duration::from_secs(300),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn paid_status_confirms_booking_and_stops_polling() {
        let h = harness(vec![
            GatewayStatus::Pending,
            GatewayStatus::Pending,
            GatewayStatus::Paid,
        ])
        .await;

        let session = h
            .watcher
            .orchestrator
            .create_session(
                PaymentTarget::booking(h.booking_id),
                300_000,
                "Gym pass".into(),
                vec![],
            )
            .await
            .unwrap();
        let order_code = session.order_code.clone();

        let handle = h.watcher.clone().spawn(session, fast_config());
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome, WatchOutcome::Paid);

        let booking = h.lifecycle.get(h.booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_status, noah_booking::PaymentState::Paid);

        // Terminal observed once: later status checks answer from the
        // session without touching the gateway.
        let calls_at_settle = h.gateway.status_calls();
        assert_eq!(calls_at_settle, 3);
        h.watcher
            .orchestrator
            .check_status(&order_code)
            .await
            .unwrap();
        h.watcher
            .orchestrator
            .check_status(&order_code)
            .await
            .unwrap();
        assert_eq!(h.gateway.status_calls(), calls_at_settle);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_cancels_booking_with_timeout_reason() {
        let h = harness(vec![GatewayStatus::Pending]).await;

        let session = h
            .watcher
            .orchestrator
            .create_session(
                PaymentTarget::booking(h.booking_id),
                300_000,
                "Gym pass".into(),
                vec![],
            )
            .await
            .unwrap();

        let handle = h.watcher.clone().spawn(session, fast_config());
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome, WatchOutcome::TimedOut);

        let booking = h.lifecycle.get(h.booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancel_reason.as_deref(), Some("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn user_cancel_stops_the_watcher() {
        let h = harness(vec![GatewayStatus::Pending]).await;

        let session = h
            .watcher
            .orchestrator
            .create_session(
                PaymentTarget::booking(h.booking_id),
                300_000,
                "Gym pass".into(),
                vec![],
            )
            .await
            .unwrap();

        let handle = h.watcher.clone().spawn(session, fast_config());
        // Let a couple of polls land first.
        tokio::time::sleep(Duration::from_secs(7)).await;
        handle.cancel();
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome, WatchOutcome::Cancelled);

        let booking = h.lifecycle.get(h.booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancel_reason.as_deref(), Some("user cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_stops_polling_but_keeps_the_booking() {
        let h = harness(vec![GatewayStatus::Pending]).await;

        let session = h
            .watcher
            .orchestrator
            .create_session(
                PaymentTarget::booking(h.booking_id),
                300_000,
                "Gym pass".into(),
                vec![],
            )
            .await
            .unwrap();
        let order_code = session.order_code.clone();

        let handle = h.watcher.clone().spawn(session, fast_config());
        tokio::time::sleep(Duration::from_secs(4)).await;
        let (cancel, task) = handle.into_parts();
        cancel.supersede();
        assert_eq!(task.await.unwrap(), WatchOutcome::Superseded);

        let booking = h.lifecycle.get(h.booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(
            h.watcher
                .orchestrator
                .sessions()
                .get(&order_code)
                .unwrap()
                .state,
            crate::session::SessionState::Cancelled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_cancels_booking() {
        let h = harness(vec![GatewayStatus::Pending, GatewayStatus::Failed]).await;

        let session = h
            .watcher
            .orchestrator
            .create_session(
                PaymentTarget::booking(h.booking_id),
                300_000,
                "Gym pass".into(),
                vec![],
            )
            .await
            .unwrap();

        let handle = h.watcher.clone().spawn(session, fast_config());
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome, WatchOutcome::Failed);

        let booking = h.lifecycle.get(h.booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancel_reason.as_deref(), Some("payment failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn invoice_payment_issues_exactly_one_receipt() {
        let h = harness(vec![GatewayStatus::Paid]).await;

        let invoice = Invoice::new(Uuid::new_v4(), 300_000, "Gym pass June");
        let invoice_id = invoice.invoice_id;
        h.invoices.create(&invoice).await.unwrap();

        let session = h
            .watcher
            .orchestrator
            .create_session(
                PaymentTarget {
                    booking_id: Some(h.booking_id),
                    invoice_id: Some(invoice_id),
                },
                300_000,
                "Gym pass".into(),
                vec![],
            )
            .await
            .unwrap();

        let handle = h.watcher.clone().spawn(session.clone(), fast_config());
        assert_eq!(handle.join().await.unwrap(), WatchOutcome::Paid);

        // The settle path running a second time still books one receipt.
        h.watcher.settle_paid(&session).await;

        let receipt = h
            .receipts_repo
            .find_by_invoice(invoice_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.amount_vnd, 300_000);
        assert_eq!(
            h.invoices.get(invoice_id).await.unwrap().unwrap().status,
            noah_billing::InvoiceStatus::Paid
        );
    }
}
