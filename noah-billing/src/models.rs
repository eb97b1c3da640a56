use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Paid => "PAID",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(InvoiceStatus::Unpaid),
            "PAID" => Ok(InvoiceStatus::Paid),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub apartment_id: Uuid,
    pub amount_vnd: i64,
    pub description: String,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(apartment_id: Uuid, amount_vnd: i64, description: impl Into<String>) -> Self {
        Self {
            invoice_id: Uuid::new_v4(),
            apartment_id,
            amount_vnd,
            description: description.into(),
            status: InvoiceStatus::Unpaid,
            created_at: Utc::now(),
        }
    }
}

/// Accounting record confirming funds received against an invoice.
/// Exactly one receipt exists per invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub receipt_no: String,
    pub invoice_id: Uuid,
    pub amount_vnd: i64,
    pub payment_method_code: String,
    pub payment_date: DateTime<Utc>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    /// Receipt numbers are derived from the receipt id, so concurrent
    /// creation never needs a shared sequence.
    pub fn number_for(id: Uuid) -> String {
        let simple = id.simple().to_string();
        format!("RC-{}", simple[..8].to_uppercase())
    }
}
