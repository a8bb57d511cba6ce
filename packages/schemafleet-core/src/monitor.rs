//! Batch progress monitoring
//!
//! Polls batch state at a fixed interval. Observations are eventually
//! consistent, not real time; the batch's own finished flag is the
//! authoritative terminal predicate.

use crate::batch::{BatchSnapshot, MigrationBatch};
use std::time::Duration;

/// Poll `batch` until it finishes, reporting each observation through
/// `on_progress`, and return the final snapshot.
///
/// On the first observed failure the batch is asked to cancel so that
/// no further jobs start. Reported processed counts never regress.
pub async fn watch_batch(
    batch: &MigrationBatch,
    poll_interval: Duration,
    mut on_progress: impl FnMut(&BatchSnapshot),
) -> BatchSnapshot {
    let mut last_processed = 0;
    let mut cancel_requested = false;

    loop {
        let mut snapshot = batch.snapshot().await;

        snapshot.processed = snapshot.processed.max(last_processed);
        last_processed = snapshot.processed;

        if snapshot.failed > 0 && !cancel_requested {
            tracing::warn!(
                batch = %batch.name(),
                failed = snapshot.failed,
                "batch reported failures, requesting cancellation",
            );
            batch.cancel();
            cancel_requested = true;
        }

        on_progress(&snapshot);

        if snapshot.finished {
            tracing::info!(
                batch = %batch.name(),
                processed = snapshot.processed,
                failed = snapshot.failed,
                cancelled = snapshot.cancelled,
                "batch finished",
            );
            return snapshot;
        }

        tokio::time::sleep(poll_interval).await;
    }
}
