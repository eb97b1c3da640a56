use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gateway::{
    CreatePaymentLink, GatewayError, GatewayStatus, PaymentGateway, PaymentLink,
};

/// Transfer-content prefix embedded in every QR payload. The provider echoes
/// the transfer content back on the bank transaction, which is what status
/// checks match on.
const TRANSFER_PREFIX: &str = "NOAHPAY";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SePayConfig {
    pub api_token: String,
    /// Full URL of the provider's transaction-listing endpoint.
    pub transactions_url: String,
    pub qr_base_url: String,
    pub bank_id: String,
    pub account_number: String,
    pub account_name: String,
}

/// QR bank-transfer gateway. The provider has no payment-intent object: a
/// "payment link" is just a QR image encoding account, amount and transfer
/// content, and settlement is detected by listing recent inbound bank
/// transactions and matching the content. There is no cancel API and no
/// webhook; polling is the only signal.
pub struct SePayGateway {
    http: reqwest::Client,
    config: SePayConfig,
}

impl SePayGateway {
    pub fn new(config: SePayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn transfer_content(order_code: &str) -> String {
        format!("{TRANSFER_PREFIX}{order_code}")
    }

    async fn list_transactions(&self) -> Result<Vec<BankTransaction>, GatewayError> {
        let response = self
            .http
            .get(&self.config.transactions_url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            let preview: String = body.chars().take(200).collect();
            return Err(GatewayError::Rejected(format!(
                "transaction listing returned {status}: {preview}"
            )));
        }

        let root: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Rejected(format!("unparseable response: {e}")))?;

        // The provider has shipped several response shapes; accept each.
        let rows = if let Some(rows) = root.get("transactions").and_then(Value::as_array) {
            rows.clone()
        } else if let Some(rows) = root.get("data").and_then(Value::as_array) {
            rows.clone()
        } else if let Some(rows) = root.get("items").and_then(Value::as_array) {
            rows.clone()
        } else if let Some(rows) = root.as_array() {
            rows.clone()
        } else {
            warn!("no transaction array in provider response");
            Vec::new()
        };

        Ok(rows.iter().map(BankTransaction::from_json).collect())
    }
}

#[derive(Debug)]
struct BankTransaction {
    id: Option<String>,
    amount_vnd: i64,
    content: Option<String>,
}

impl BankTransaction {
    fn from_json(tx: &Value) -> Self {
        // Amounts arrive as decimal strings under amount_in/amount_out, or
        // as a bare number on older payloads.
        let amount_vnd = ["amount_in", "amount_out"]
            .iter()
            .find_map(|key| tx.get(*key))
            .and_then(|v| match v {
                Value::String(s) => s.parse::<f64>().ok(),
                Value::Number(n) => n.as_f64(),
                _ => None,
            })
            .or_else(|| tx.get("amount").and_then(Value::as_f64))
            .map(|f| f.round() as i64)
            .unwrap_or(0);

        let content = ["transaction_content", "transactionContent", "content"]
            .iter()
            .find_map(|key| tx.get(*key).and_then(Value::as_str))
            .or_else(|| tx.get("description").and_then(Value::as_str))
            .map(str::to_string);

        Self {
            id: tx.get("id").and_then(Value::as_str).map(str::to_string),
            amount_vnd,
            content,
        }
    }
}

#[async_trait]
impl PaymentGateway for SePayGateway {
    async fn create_payment_link(
        &self,
        req: &CreatePaymentLink,
    ) -> Result<PaymentLink, GatewayError> {
        // 16 uppercase hex chars: short enough for a transfer memo, unique
        // enough to never collide in practice.
        let order_code = Uuid::new_v4().simple().to_string()[..16].to_uppercase();
        let amount = req.final_amount();
        let content = Self::transfer_content(&order_code);

        let qr_url = format!(
            "{}?acc={}&bank={}&amount={}&des={}",
            self.config.qr_base_url, self.config.account_number, self.config.bank_id, amount,
            content
        );

        info!(%order_code, amount, "QR payment link generated");
        Ok(PaymentLink {
            order_code,
            qr_url,
            checkout_url: None,
            amount_vnd: amount,
        })
    }

    async fn fetch_status(
        &self,
        order_code: &str,
        expected_amount: i64,
    ) -> Result<GatewayStatus, GatewayError> {
        let expected_content = Self::transfer_content(order_code);
        let transactions = self.list_transactions().await?;

        if transactions.is_empty() {
            return Ok(GatewayStatus::Pending);
        }

        let matched = transactions.iter().find(|tx| {
            tx.content
                .as_deref()
                .map(|c| c.to_uppercase().contains(&expected_content))
                .unwrap_or(false)
        });

        match matched {
            Some(tx) => {
                if tx.amount_vnd != expected_amount {
                    // Fees can skew the settled amount; content match decides.
                    debug!(
                        order_code,
                        settled = tx.amount_vnd,
                        expected = expected_amount,
                        "settled amount differs from expected"
                    );
                }
                info!(order_code, transaction_id = ?tx.id, "payment settled");
                Ok(GatewayStatus::Paid)
            }
            None => Ok(GatewayStatus::Pending),
        }
    }

    async fn cancel_payment_link(
        &self,
        _order_code: &str,
        _reason: Option<&str>,
    ) -> Result<(), GatewayError> {
        // The provider only sees bank transfers; an unused QR simply expires
        // with the session.
        Err(GatewayError::CancelUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amount_in_string_payload() {
        let tx = BankTransaction::from_json(&serde_json::json!({
            "id": "12345",
            "amount_in": "300000.00",
            "transaction_content": "NOAHPAY0A1B2C3D4E5F6071 chuyen khoan"
        }));
        assert_eq!(tx.amount_vnd, 300_000);
        assert!(tx.content.unwrap().contains("NOAHPAY"));
    }

    #[test]
    fn falls_back_to_bare_amount_and_description() {
        let tx = BankTransaction::from_json(&serde_json::json!({
            "amount": 150000,
            "description": "NOAHPAYFFFF000011112222"
        }));
        assert_eq!(tx.amount_vnd, 150_000);
        assert_eq!(tx.content.as_deref(), Some("NOAHPAYFFFF000011112222"));
    }

    #[test]
    fn transfer_content_embeds_order_code() {
        assert_eq!(
            SePayGateway::transfer_content("ABCD"),
            "NOAHPAYABCD".to_string()
        );
    }
}
