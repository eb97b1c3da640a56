use chrono::Utc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::state::AppState;

/// Background sweep enforcing expiry server-side: abandoned payment sessions
/// are purged, their Pending/Unpaid bookings cancelled, and Confirmed
/// bookings past their service window completed.
pub fn spawn_sweeper(state: AppState, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "sweep worker started");
        loop {
            sleep(interval).await;
            sweep(&state).await;
        }
    })
}

pub async fn sweep(state: &AppState) {
    let now = Utc::now();

    let purged = state.orchestrator.sessions().purge_expired(now);
    if purged > 0 {
        info!(purged, "expired payment sessions purged");
    }

    let cutoff = now - state.orchestrator.sessions().ttl();
    match state.lifecycle.cancel_stale(cutoff).await {
        Ok(cancelled) if cancelled > 0 => {
            info!(cancelled, "stale unpaid bookings cancelled");
        }
        Ok(_) => {}
        Err(err) => error!(%err, "stale-booking sweep failed"),
    }

    match state.lifecycle.complete_expired(state.lifecycle.today()).await {
        Ok(completed) if completed > 0 => {
            info!(completed, "elapsed bookings completed");
        }
        Ok(_) => {}
        Err(err) => error!(%err, "booking completion sweep failed"),
    }
}
