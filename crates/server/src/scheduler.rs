//! Background scheduler for the portfolio refresh cycle.
//!
//! Ticks run start-to-start at the configured interval; a slow tick delays the
//! next one instead of stacking up behind it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::main_lib::AppState;

/// Starts the background refresh loop. The first tick fires immediately.
pub fn start_portfolio_scheduler(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Portfolio scheduler started ({}s interval)", every.as_secs());

        let mut refresh_interval = interval(every);
        refresh_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            refresh_interval.tick().await;
            run_scheduled_refresh(&state).await;
        }
    })
}

async fn run_scheduled_refresh(state: &Arc<AppState>) {
    debug!("Running scheduled portfolio refresh...");
    let outcome = state.dashboard.refresh().await;
    if let Some(error) = &outcome.error {
        warn!(
            "Scheduled refresh failed (stale snapshot kept: {}): {error}",
            outcome.stale
        );
    }
}
