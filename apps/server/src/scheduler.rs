//! Background polling scheduler.
//!
//! Re-invokes the fallback chain on a fixed interval and merges results
//! into the hub. The very first run uses the cold-start path (primary
//! retries); a failed tick is logged and skipped, leaving the previous
//! snapshot as the served value.

use std::sync::Arc;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::main_lib::AppState;

/// Run the cold-start fetch chain and publish the result.
///
/// Shared by the first scheduler tick and the request handler's
/// fetch-if-empty guard. Returns the number of quotes obtained.
pub async fn cold_start_fetch(state: &Arc<AppState>) -> usize {
    let quotes = state.chain.resolve_cold_start(&state.symbols).await;
    if quotes.is_empty() {
        return 0;
    }
    state.record_successful_fetch();
    let count = quotes.len();
    state.hub.broadcast(quotes);
    count
}

/// Starts the background poll scheduler, unless polling is disabled.
pub fn start_poll_scheduler(state: Arc<AppState>) {
    if state.poll_disabled {
        info!("Polling disabled, quotes are fetched on request only");
        return;
    }

    tokio::spawn(async move {
        info!(
            "Poll scheduler started ({}s interval, {} symbols)",
            state.poll_interval.as_secs(),
            state.symbols.len()
        );

        if state.fetch_permitted() {
            let count = cold_start_fetch(&state).await;
            info!("Initial fetch produced {} quotes", count);
        }

        let mut tick = interval(state.poll_interval);
        // the first tick completes immediately; the initial fetch above
        // already covered it
        tick.tick().await;

        loop {
            tick.tick().await;
            run_scheduled_fetch(&state).await;
        }
    });
}

/// Runs a single scheduled fetch cycle.
async fn run_scheduled_fetch(state: &Arc<AppState>) {
    if !state.fetch_permitted() {
        debug!("Scheduled fetch skipped: daily throttle already satisfied");
        return;
    }

    let quotes = state.chain.resolve(&state.symbols).await;
    if quotes.is_empty() {
        warn!("Scheduled fetch produced no quotes, keeping previous snapshot");
        return;
    }

    state.record_successful_fetch();
    debug!(
        "Scheduled fetch merged {} quotes, {} subscribers",
        quotes.len(),
        state.hub.subscriber_count()
    );
    state.hub.broadcast(quotes);
}
