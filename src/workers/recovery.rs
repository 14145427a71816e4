//! Advances jobs nobody is polling anymore.
//!
//! This is just another caller of `advance`; the lease keeps it from
//! colliding with client polls.

use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::modules::job::driver::Advance;
use crate::modules::job::error::JobError;
use crate::state::AppState;

const SWEEP_LIMIT: i64 = 50;

pub async fn start_recovery_worker(state: AppState, interval: Duration, idle_after: Duration) {
    info!(
        interval_secs = interval.as_secs(),
        idle_secs = idle_after.as_secs(),
        "🩺 Starting recovery worker"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sweep(&state, idle_after).await {
            Ok(0) => {}
            Ok(advanced) => info!(advanced, "Recovery sweep advanced idle jobs"),
            Err(e) => error!(error = %e, "Recovery sweep failed"),
        }
    }
}

/// Calls `advance` once on every idle job. Returns how many did work.
pub async fn sweep(state: &AppState, idle_after: Duration) -> Result<usize, JobError> {
    let cutoff = OffsetDateTime::now_utc() - idle_after;
    let ids = state.jobs.list_idle(cutoff, SWEEP_LIMIT).await?;

    let mut advanced = 0;
    for id in ids {
        match state.driver.advance(id).await {
            Ok(Advance::Skipped) => {}
            Ok(outcome) => {
                info!(job_id = %id, ?outcome, "Recovered idle job");
                advanced += 1;
            }
            Err(e) => warn!(job_id = %id, error = %e, "Recovery advance failed"),
        }
    }
    Ok(advanced)
}
