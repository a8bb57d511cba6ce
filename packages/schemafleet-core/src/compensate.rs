//! Compensation for partially failed migration batches
//!
//! When a migration batch fails part way through, the tenants that had
//! already succeeded are rolled back one step so the fleet does not end
//! up split across schema versions. The subset is the exact set of
//! succeeded tenant identities recorded in the batch state, not a
//! positional prefix of the input list.

use crate::{
    batch::{BatchConfig, BatchOp, JobStatus, MigrationBatch, dispatch_batch},
    connector::TenantConnector,
    monitor::watch_batch,
    selector::TenantTarget,
};
use schemafleet_runner::MigrationRunner;
use std::{sync::Arc, time::Duration};

/// Outcome of a compensation attempt
#[derive(Debug, Clone)]
pub enum CompensationOutcome {
    /// No job in the failed batch had succeeded, nothing to revert
    NotNeeded,

    /// A rollback batch ran over the succeeded subset
    Compensated {
        /// Tenants rolled back successfully
        reverted: Vec<TenantTarget>,
        /// Tenants whose rollback itself failed. Reported as warnings
        /// and left for manual intervention; compensation is single
        /// level and never retried.
        failed: Vec<(String, TenantTarget)>,
    },
}

impl CompensationOutcome {
    /// True when every attempted rollback succeeded (or none was needed)
    pub fn fully_succeeded(&self) -> bool {
        match self {
            CompensationOutcome::NotNeeded => true,
            CompensationOutcome::Compensated { failed, .. } => failed.is_empty(),
        }
    }
}

/// Roll back the tenants that succeeded within `batch` by one step.
///
/// Blocks until the rollback batch finishes. Rollback failures never
/// escalate to an error and never trigger further compensation.
#[tracing::instrument(skip_all, fields(batch = %batch.name()))]
pub async fn compensate_batch<C: TenantConnector, R: MigrationRunner>(
    connector: Arc<C>,
    runner: Arc<R>,
    batch: &MigrationBatch,
    config: BatchConfig,
    poll_interval: Duration,
) -> CompensationOutcome {
    let snapshot = batch.snapshot().await;
    let successful_count = snapshot.processed - snapshot.failed;

    if successful_count == 0 {
        tracing::info!("no tenant had succeeded, nothing to compensate");
        return CompensationOutcome::NotNeeded;
    }

    let subset = batch.succeeded_routes().await;
    debug_assert_eq!(subset.len(), successful_count);

    tracing::warn!(
        tenants = subset.len(),
        "rolling back tenants that had already migrated",
    );

    // One tenant's failed rollback must not cancel the others, and a
    // failed rollback never triggers another compensation round.
    let rollback_config = BatchConfig {
        allow_failures: true,
        ..config
    };

    let rollback_batch = dispatch_batch(
        connector,
        runner,
        format!("{}-rollback", batch.name()),
        BatchOp::Revert { steps: Some(1) },
        subset,
        rollback_config,
    );

    let final_snapshot = watch_batch(&rollback_batch, poll_interval, |_| {}).await;

    let mut reverted = Vec::new();
    let mut failed = Vec::new();

    for (target, status) in final_snapshot.jobs {
        match status {
            JobStatus::Succeeded { .. } => reverted.push(target),
            JobStatus::Failed { message } => {
                tracing::warn!(
                    tenant = %target.base,
                    %message,
                    "rollback failed, manual intervention required",
                );
                failed.push((message, target));
            }
            JobStatus::Pending | JobStatus::Running => {
                failed.push(("rollback job never completed".to_string(), target));
            }
        }
    }

    CompensationOutcome::Compensated { reverted, failed }
}
