use crate::connector::TenantConnector;
use schemafleet_database::{models::TenantRoute, pool::DbConnectErr};
use schemafleet_runner::{
    ApplyOutcome, MigrationApplyError, MigrationRevertError, MigrationRunner, RevertOutcome,
};
use std::time::Duration;
use thiserror::Error;

/// Errors from one tenant's unit of work. On the single-tenant path
/// these are fatal to the caller; on the batch path one tenant's error
/// is isolated from the jobs already dispatched.
#[derive(Debug, Error)]
pub enum TenantJobError {
    #[error("error connecting to tenant database: {0}")]
    Connect(DbConnectErr),

    #[error(transparent)]
    Apply(MigrationApplyError),

    #[error(transparent)]
    Revert(MigrationRevertError),

    /// The job exceeded the wall clock ceiling and is treated as failed
    /// for batch accounting. Statements may still be running server
    /// side; nothing is preempted.
    #[error("tenant job exceeded the wall clock ceiling of {0:?}")]
    TimedOut(Duration),
}

/// Apply all pending migrations to a single tenant
#[tracing::instrument(skip_all, fields(tenant = %route.tenant.base))]
pub async fn migrate_tenant<C: TenantConnector, R: MigrationRunner>(
    connector: &C,
    runner: &R,
    route: &TenantRoute,
) -> Result<ApplyOutcome, TenantJobError> {
    let tenant_db = connector
        .tenant_pool(route)
        .await
        .map_err(TenantJobError::Connect)?;

    touch_last_connected(connector, route).await;

    let outcome = runner
        .apply(&tenant_db)
        .await
        .map_err(TenantJobError::Apply)?;

    tracing::info!(
        applied = outcome.applied_now.len(),
        already_applied = outcome.already_applied.len(),
        "applied migrations against tenant",
    );

    Ok(outcome)
}

/// Revert migrations on a single tenant. `steps` omitted reverts
/// exactly the most recent migration run.
#[tracing::instrument(skip_all, fields(tenant = %route.tenant.base))]
pub async fn rollback_tenant<C: TenantConnector, R: MigrationRunner>(
    connector: &C,
    runner: &R,
    route: &TenantRoute,
    steps: Option<usize>,
) -> Result<RevertOutcome, TenantJobError> {
    let tenant_db = connector
        .tenant_pool(route)
        .await
        .map_err(TenantJobError::Connect)?;

    touch_last_connected(connector, route).await;

    let outcome = runner
        .revert(&tenant_db, steps)
        .await
        .map_err(TenantJobError::Revert)?;

    tracing::info!(
        reverted = outcome.reverted_now.len(),
        "reverted migrations against tenant",
    );

    Ok(outcome)
}

/// Best effort bookkeeping of when the orchestrator last connected to
/// a tenant. Never fails the job.
async fn touch_last_connected<C: TenantConnector>(connector: &C, route: &TenantRoute) {
    let root_db = match connector.root_pool().await {
        Ok(root_db) => root_db,
        Err(error) => {
            tracing::warn!(?error, "failed to connect to registry for bookkeeping");
            return;
        }
    };

    let mut tenant = route.tenant.clone();
    if let Err(error) = tenant.touch_last_connected(&root_db).await {
        tracing::warn!(?error, "failed to record tenant connection time");
    }
}
