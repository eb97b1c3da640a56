use axum::extract::State;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub payment_sessions_created: IntCounter,
    pub payment_outcomes: IntCounterVec,
    pub bookings_created: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let payment_sessions_created = IntCounter::new(
            "noah_payment_sessions_created_total",
            "Payment sessions created",
        )
        .expect("metric definition");
        let payment_outcomes = IntCounterVec::new(
            Opts::new("noah_payment_outcomes_total", "Payment watcher outcomes"),
            &["outcome"],
        )
        .expect("metric definition");
        let bookings_created =
            IntCounter::new("noah_bookings_created_total", "Bookings created")
                .expect("metric definition");

        registry
            .register(Box::new(payment_sessions_created.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(payment_outcomes.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(bookings_created.clone()))
            .expect("metric registration");

        Self {
            registry,
            payment_sessions_created,
            payment_outcomes,
            bookings_created,
        }
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, AppError> {
    state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}
