use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::gateway::{CreatePaymentLink, GatewayError, GatewayStatus, PaymentGateway, PaymentItem};
use crate::session::{PaymentSession, PaymentTarget, SessionState, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("unknown order code: {0}")]
    UnknownOrder(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Bridges the external gateway and the in-process session store. Once a
/// session has gone terminal, status checks answer from the session and the
/// gateway is never queried again for that order code.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    sessions: Arc<SessionStore>,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, sessions: Arc<SessionStore>) -> Self {
        Self { gateway, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn create_session(
        &self,
        target: PaymentTarget,
        amount_vnd: i64,
        description: String,
        items: Vec<PaymentItem>,
    ) -> Result<PaymentSession, PaymentError> {
        let req = CreatePaymentLink {
            amount_vnd,
            description: description.clone(),
            items,
        };
        let link = self.gateway.create_payment_link(&req).await?;

        let session = self.sessions.insert(
            link.order_code.clone(),
            link.qr_url,
            link.checkout_url,
            link.amount_vnd,
            description,
            target,
        );
        info!(order_code = %session.order_code, amount = session.amount_vnd, "payment session created");
        Ok(session)
    }

    pub async fn check_status(&self, order_code: &str) -> Result<GatewayStatus, PaymentError> {
        let session = self
            .sessions
            .get(order_code)
            .ok_or_else(|| PaymentError::UnknownOrder(order_code.to_string()))?;

        if session.state.is_terminal() {
            return Ok(session.state.as_gateway_status());
        }

        let status = self
            .gateway
            .fetch_status(order_code, session.amount_vnd)
            .await?;
        debug!(order_code, ?status, "gateway status");

        match status {
            GatewayStatus::Paid => {
                self.sessions.set_state(order_code, SessionState::Paid);
            }
            GatewayStatus::Failed => {
                self.sessions.set_state(order_code, SessionState::Failed);
            }
            GatewayStatus::Cancelled => {
                self.sessions.set_state(order_code, SessionState::Cancelled);
            }
            GatewayStatus::Pending => {}
        }
        Ok(status)
    }

    /// Marks the session cancelled locally and forwards to the provider when
    /// it supports cancellation (the QR-transfer provider does not; the link
    /// simply goes unused).
    pub async fn cancel_session(
        &self,
        order_code: &str,
        reason: Option<&str>,
    ) -> Result<PaymentSession, PaymentError> {
        let session = self
            .sessions
            .set_state(order_code, SessionState::Cancelled)
            .ok_or_else(|| PaymentError::UnknownOrder(order_code.to_string()))?;

        match self.gateway.cancel_payment_link(order_code, reason).await {
            Ok(()) => {}
            Err(GatewayError::CancelUnsupported) => {
                debug!(order_code, "provider has no cancel operation; local cancel only");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(session)
    }
}

/// Scriptable gateway for tests: statuses are served in order, the last one
/// repeating, and every status fetch is counted.
pub struct MockGateway {
    statuses: Mutex<Vec<GatewayStatus>>,
    cursor: AtomicUsize,
    status_calls: AtomicUsize,
    fail_create: bool,
}

impl MockGateway {
    pub fn scripted(statuses: Vec<GatewayStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses),
            cursor: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            fail_create: false,
        }
    }

    pub fn failing_create() -> Self {
        Self {
            statuses: Mutex::new(vec![]),
            cursor: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            fail_create: true,
        }
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_link(
        &self,
        req: &CreatePaymentLink,
    ) -> Result<crate::gateway::PaymentLink, GatewayError> {
        if self.fail_create {
            return Err(GatewayError::Rejected("provider offline".into()));
        }
        let order_code = Uuid::new_v4().simple().to_string()[..16].to_uppercase();
        Ok(crate::gateway::PaymentLink {
            qr_url: format!("https://qr.test/img?code={order_code}"),
            checkout_url: None,
            amount_vnd: req.final_amount(),
            order_code,
        })
    }

    async fn fetch_status(
        &self,
        _order_code: &str,
        _expected_amount: i64,
    ) -> Result<GatewayStatus, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let statuses = self.statuses.lock().expect("mock gateway poisoned");
        if statuses.is_empty() {
            return Ok(GatewayStatus::Pending);
        }
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        Ok(statuses[idx.min(statuses.len() - 1)])
    }

    async fn cancel_payment_link(
        &self,
        _order_code: &str,
        _reason: Option<&str>,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::CancelUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn orchestrator(gateway: Arc<MockGateway>) -> PaymentOrchestrator {
        PaymentOrchestrator::new(gateway, Arc::new(SessionStore::new(Duration::minutes(5))))
    }

    #[tokio::test]
    async fn terminal_status_short_circuits_the_gateway() {
        let gateway = Arc::new(MockGateway::scripted(vec![
            GatewayStatus::Pending,
            GatewayStatus::Paid,
        ]));
        let orch = orchestrator(gateway.clone());

        let session = orch
            .create_session(
                PaymentTarget::booking(Uuid::new_v4()),
                300_000,
                "Pool pass".into(),
                vec![],
            )
            .await
            .unwrap();

        assert_eq!(
            orch.check_status(&session.order_code).await.unwrap(),
            GatewayStatus::Pending
        );
        assert_eq!(
            orch.check_status(&session.order_code).await.unwrap(),
            GatewayStatus::Paid
        );
        assert_eq!(gateway.status_calls(), 2);

        // Observed terminal once; later polls never reach the gateway.
        assert_eq!(
            orch.check_status(&session.order_code).await.unwrap(),
            GatewayStatus::Paid
        );
        assert_eq!(
            orch.check_status(&session.order_code).await.unwrap(),
            GatewayStatus::Paid
        );
        assert_eq!(gateway.status_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_order_code_is_an_error() {
        let orch = orchestrator(Arc::new(MockGateway::scripted(vec![])));
        let err = orch.check_status("NOPE").await.unwrap_err();
        assert!(matches!(err, PaymentError::UnknownOrder(_)));
    }

    #[tokio::test]
    async fn create_surfaces_gateway_rejection() {
        let orch = orchestrator(Arc::new(MockGateway::failing_create()));
        let err = orch
            .create_session(
                PaymentTarget::invoice(Uuid::new_v4()),
                100,
                "x".into(),
                vec![],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
    }

    #[tokio::test]
    async fn cancel_tolerates_unsupported_provider_cancel() {
        let orch = orchestrator(Arc::new(MockGateway::scripted(vec![])));
        let session = orch
            .create_session(
                PaymentTarget::booking(Uuid::new_v4()),
                100,
                "x".into(),
                vec![],
            )
            .await
            .unwrap();

        let cancelled = orch
            .cancel_session(&session.order_code, Some("user cancelled"))
            .await
            .unwrap();
        assert_eq!(cancelled.state, SessionState::Cancelled);
    }
}
