//! Read-only per-tenant migration status
//!
//! Compares applied against available migrations for each tenant.
//! Never mutates schema. Tenants are visited one at a time; a tenant
//! that cannot be reached is reported and the sweep continues.

use crate::{connector::TenantConnector, selector::TenantTarget};
use schemafleet_database::models::TenantRoute;
use schemafleet_runner::MigrationRunner;

/// Pending migrations for one tenant
#[derive(Debug, Clone)]
pub struct TenantMigrationStatus {
    pub target: TenantTarget,
    /// Available migrations not yet applied, in application order
    pub pending: Vec<String>,
}

impl TenantMigrationStatus {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Outcome of a status sweep across a set of tenants
#[derive(Debug, Clone, Default)]
pub struct FleetStatusOutcome {
    pub statuses: Vec<TenantMigrationStatus>,
    /// Tenants that could not be inspected
    pub failed: Vec<(String, TenantTarget)>,
}

#[tracing::instrument(skip_all, fields(tenants = routes.len()))]
pub async fn fleet_status<C: TenantConnector, R: MigrationRunner>(
    connector: &C,
    runner: &R,
    routes: &[TenantRoute],
) -> FleetStatusOutcome {
    let available = runner.list_available();

    let mut outcome = FleetStatusOutcome::default();

    for route in routes {
        let target = TenantTarget::from(route);

        let tenant_db = match connector.tenant_pool(route).await {
            Ok(tenant_db) => tenant_db,
            Err(error) => {
                tracing::error!(tenant = %target.base, ?error, "failed to connect to tenant");
                outcome.failed.push((error.to_string(), target));
                continue;
            }
        };

        let applied = match runner.list_applied(&tenant_db).await {
            Ok(applied) => applied,
            Err(error) => {
                tracing::error!(tenant = %target.base, ?error, "failed to list applied migrations");
                outcome.failed.push((error.to_string(), target));
                continue;
            }
        };

        let pending = available
            .iter()
            .filter(|name| !applied.contains(name))
            .cloned()
            .collect();

        outcome.statuses.push(TenantMigrationStatus { target, pending });
    }

    outcome
}
