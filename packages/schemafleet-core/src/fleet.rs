//! Fleet entry points
//!
//! A target set with exactly one tenant runs synchronously through the
//! executor and propagates its error to the caller. Anything larger is
//! dispatched as a batch, watched to completion, and (for the apply
//! direction) compensated on partial failure.

use crate::{
    batch::{BatchConfig, BatchOp, BatchSnapshot, JobStatus, dispatch_batch},
    compensate::{CompensationOutcome, compensate_batch},
    connector::TenantConnector,
    executor::{TenantJobError, migrate_tenant, rollback_tenant},
    monitor::watch_batch,
    selector::{SelectTenantsError, TenantSelector, TenantTarget, resolve_targets},
};
use schemafleet_database::pool::DbConnectErr;
use schemafleet_runner::MigrationRunner;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Tuning for fleet operations
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub batch: BatchConfig,
    /// Interval the progress monitor polls batch state at
    pub poll_interval: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("error connecting to root database: {0}")]
    ConnectRootDatabase(DbConnectErr),

    #[error(transparent)]
    SelectTenants(SelectTenantsError),

    /// Fatal single-tenant failure. Only produced on the synchronous
    /// path where there is no batch to coordinate.
    #[error("migration failed for tenant {}: {source}", target.base)]
    Execution {
        target: TenantTarget,
        #[source]
        source: TenantJobError,
    },
}

/// Aggregate outcome of a fleet migration
#[derive(Debug, Clone, Default)]
pub struct MigrateFleetOutcome {
    /// Tenants migrated successfully, with the migrations each applied
    pub applied: Vec<(TenantTarget, Vec<String>)>,
    /// Tenants whose migration failed
    pub failed: Vec<(String, TenantTarget)>,
    /// Compensation report when any tenant failed mid-batch
    pub compensation: Option<CompensationOutcome>,
}

/// Aggregate outcome of a fleet rollback
#[derive(Debug, Clone, Default)]
pub struct RollbackFleetOutcome {
    /// Tenants rolled back successfully, with the migrations each reverted
    pub reverted: Vec<(TenantTarget, Vec<String>)>,
    /// Tenants whose rollback failed
    pub failed: Vec<(String, TenantTarget)>,
}

/// Apply pending migrations across the selected tenants
#[tracing::instrument(skip(connector, runner, config, on_progress))]
pub async fn migrate_fleet<C: TenantConnector, R: MigrationRunner>(
    connector: Arc<C>,
    runner: Arc<R>,
    selector: &TenantSelector,
    config: &FleetConfig,
    mut on_progress: impl FnMut(&BatchSnapshot),
) -> Result<MigrateFleetOutcome, FleetError> {
    let root_db = connector
        .root_pool()
        .await
        .map_err(FleetError::ConnectRootDatabase)?;
    let routes = resolve_targets(&root_db, selector)
        .await
        .map_err(FleetError::SelectTenants)?;

    // Exactly one target runs synchronously, no batch to coordinate
    if let [route] = routes.as_slice() {
        let target = TenantTarget::from(route);
        let outcome = migrate_tenant(&*connector, &*runner, route)
            .await
            .map_err(|source| FleetError::Execution {
                target: target.clone(),
                source,
            })?;

        return Ok(MigrateFleetOutcome {
            applied: vec![(target, outcome.applied_now)],
            ..Default::default()
        });
    }

    if routes.is_empty() {
        return Ok(MigrateFleetOutcome::default());
    }

    let batch = dispatch_batch(
        connector.clone(),
        runner.clone(),
        "tenant-migrate",
        BatchOp::Apply,
        routes,
        config.batch.clone(),
    );

    let snapshot = watch_batch(&batch, config.poll_interval, &mut on_progress).await;

    let compensation = if snapshot.failed > 0 {
        Some(
            compensate_batch(
                connector,
                runner,
                &batch,
                config.batch.clone(),
                config.poll_interval,
            )
            .await,
        )
    } else {
        None
    };

    let mut outcome = MigrateFleetOutcome {
        compensation,
        ..Default::default()
    };

    for (target, status) in snapshot.jobs {
        match status {
            JobStatus::Succeeded { migrations } => outcome.applied.push((target, migrations)),
            JobStatus::Failed { message } => outcome.failed.push((message, target)),
            // Skipped by cancellation, never started
            JobStatus::Pending | JobStatus::Running => {}
        }
    }

    Ok(outcome)
}

/// Revert migrations across the selected tenants. A failed rollback is
/// reported in the outcome; it never triggers compensation.
#[tracing::instrument(skip(connector, runner, config, on_progress))]
pub async fn rollback_fleet<C: TenantConnector, R: MigrationRunner>(
    connector: Arc<C>,
    runner: Arc<R>,
    selector: &TenantSelector,
    steps: Option<usize>,
    config: &FleetConfig,
    mut on_progress: impl FnMut(&BatchSnapshot),
) -> Result<RollbackFleetOutcome, FleetError> {
    let root_db = connector
        .root_pool()
        .await
        .map_err(FleetError::ConnectRootDatabase)?;
    let routes = resolve_targets(&root_db, selector)
        .await
        .map_err(FleetError::SelectTenants)?;

    if let [route] = routes.as_slice() {
        let target = TenantTarget::from(route);
        let outcome = rollback_tenant(&*connector, &*runner, route, steps)
            .await
            .map_err(|source| FleetError::Execution {
                target: target.clone(),
                source,
            })?;

        return Ok(RollbackFleetOutcome {
            reverted: vec![(target, outcome.reverted_now)],
            ..Default::default()
        });
    }

    if routes.is_empty() {
        return Ok(RollbackFleetOutcome::default());
    }

    let batch = dispatch_batch(
        connector,
        runner,
        "tenant-rollback",
        BatchOp::Revert { steps },
        routes,
        config.batch.clone(),
    );

    let snapshot = watch_batch(&batch, config.poll_interval, &mut on_progress).await;

    let mut outcome = RollbackFleetOutcome::default();

    for (target, status) in snapshot.jobs {
        match status {
            JobStatus::Succeeded { migrations } => outcome.reverted.push((target, migrations)),
            JobStatus::Failed { message } => outcome.failed.push((message, target)),
            JobStatus::Pending | JobStatus::Running => {}
        }
    }

    Ok(outcome)
}
