use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Status a gateway can report for a payment attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl GatewayStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GatewayStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentItem {
    pub name: String,
    pub quantity: u32,
    pub price_vnd: i64,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentLink {
    pub amount_vnd: i64,
    pub description: String,
    pub items: Vec<PaymentItem>,
}

impl CreatePaymentLink {
    /// Item lines win over the passed amount when they sum to something,
    /// matching the provider service this models.
    pub fn final_amount(&self) -> i64 {
        let from_items: i64 = self
            .items
            .iter()
            .map(|i| i.price_vnd * i64::from(i.quantity))
            .sum();
        if from_items > 0 {
            from_items
        } else {
            self.amount_vnd
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentLink {
    /// Opaque code correlating this attempt with its gateway-side
    /// transaction; embedded in the transfer content.
    pub order_code: String,
    pub qr_url: String,
    pub checkout_url: Option<String>,
    pub amount_vnd: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    #[error("the provider does not support cancelling a payment link")]
    CancelUnsupported,
}

/// External payment provider operations. Implementations do not retry;
/// callers own the polling cadence.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(
        &self,
        req: &CreatePaymentLink,
    ) -> Result<PaymentLink, GatewayError>;

    /// Amount is advisory: transfer fees can skew it, so implementations
    /// match on the order code and use the amount for logging only.
    async fn fetch_status(
        &self,
        order_code: &str,
        expected_amount: i64,
    ) -> Result<GatewayStatus, GatewayError>;

    async fn cancel_payment_link(
        &self,
        order_code: &str,
        reason: Option<&str>,
    ) -> Result<(), GatewayError>;
}
