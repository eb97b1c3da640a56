use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::gateway::GatewayStatus;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Expired,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Pending)
    }

    pub fn as_gateway_status(&self) -> GatewayStatus {
        match self {
            SessionState::Pending => GatewayStatus::Pending,
            SessionState::Paid => GatewayStatus::Paid,
            SessionState::Failed => GatewayStatus::Failed,
            // An expired session reads as a cancelled attempt.
            SessionState::Cancelled | SessionState::Expired => GatewayStatus::Cancelled,
        }
    }
}

/// What a payment attempt settles: a booking, an invoice, or both (booking
/// payments that also clear an invoice).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PaymentTarget {
    pub booking_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
}

impl PaymentTarget {
    pub fn booking(booking_id: Uuid) -> Self {
        Self {
            booking_id: Some(booking_id),
            invoice_id: None,
        }
    }

    pub fn invoice(invoice_id: Uuid) -> Self {
        Self {
            booking_id: None,
            invoice_id: Some(invoice_id),
        }
    }
}

/// One payment attempt. Ephemeral: a new attempt gets a new order code, and
/// nothing here survives a process restart.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub order_code: String,
    pub qr_url: String,
    pub checkout_url: Option<String>,
    pub amount_vnd: i64,
    pub description: String,
    pub target: PaymentTarget,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-process session map with a fixed time-to-live per attempt.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, PaymentSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(
        &self,
        order_code: String,
        qr_url: String,
        checkout_url: Option<String>,
        amount_vnd: i64,
        description: String,
        target: PaymentTarget,
    ) -> PaymentSession {
        let now = Utc::now();
        let session = PaymentSession {
            order_code: order_code.clone(),
            qr_url,
            checkout_url,
            amount_vnd,
            description,
            target,
            state: SessionState::Pending,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .lock()
            .expect("session store poisoned")
            .insert(order_code, session.clone());
        session
    }

    pub fn get(&self, order_code: &str) -> Option<PaymentSession> {
        self.sessions
            .lock()
            .expect("session store poisoned")
            .get(order_code)
            .cloned()
    }

    /// Records a state change. Terminal states stick: once set, later
    /// writes are ignored so a stale poll can never resurrect a session.
    pub fn set_state(&self, order_code: &str, state: SessionState) -> Option<PaymentSession> {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        let session = sessions.get_mut(order_code)?;
        if !session.state.is_terminal() {
            session.state = state;
        }
        Some(session.clone())
    }

    /// The pending session for a booking, if one exists.
    pub fn active_for_booking(&self, booking_id: Uuid) -> Option<PaymentSession> {
        self.sessions
            .lock()
            .expect("session store poisoned")
            .values()
            .find(|s| {
                s.state == SessionState::Pending && s.target.booking_id == Some(booking_id)
            })
            .cloned()
    }

    /// Drops sessions past their expiry, marking still-pending ones Expired
    /// first. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        let before = sessions.len();
        sessions.retain(|_, s| {
            if !s.is_expired(now) {
                return true;
            }
            if s.state == SessionState::Pending {
                s.state = SessionState::Expired;
            }
            false
        });
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::minutes(5))
    }

    fn insert_pending(store: &SessionStore, code: &str, booking_id: Uuid) -> PaymentSession {
        store.insert(
            code.to_string(),
            "https://qr.example/img".into(),
            None,
            300_000,
            "Pool pass".into(),
            PaymentTarget::booking(booking_id),
        )
    }

    #[test]
    fn terminal_state_sticks() {
        let store = store();
        insert_pending(&store, "A1B2", Uuid::new_v4());

        store.set_state("A1B2", SessionState::Paid);
        store.set_state("A1B2", SessionState::Cancelled);

        assert_eq!(store.get("A1B2").unwrap().state, SessionState::Paid);
    }

    #[test]
    fn finds_active_session_per_booking() {
        let store = store();
        let booking_id = Uuid::new_v4();
        insert_pending(&store, "OLD1", booking_id);
        store.set_state("OLD1", SessionState::Cancelled);
        insert_pending(&store, "NEW1", booking_id);

        let active = store.active_for_booking(booking_id).unwrap();
        assert_eq!(active.order_code, "NEW1");
    }

    #[test]
    fn purge_removes_only_expired_sessions() {
        let store = store();
        insert_pending(&store, "LIVE", Uuid::new_v4());

        assert_eq!(store.purge_expired(Utc::now()), 0);
        let removed = store.purge_expired(Utc::now() + Duration::minutes(6));
        assert_eq!(removed, 1);
        assert!(store.get("LIVE").is_none());
    }
}
