use schemafleet_database::{
    DbErr, DbPool,
    models::{
        TenantRoute,
        group::{Group, GroupId},
        tenant::{Tenant, TenantId},
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Which tenants a fleet operation targets
#[derive(Debug, Clone)]
pub enum TenantSelector {
    /// A single tenant addressed by its base name
    One(String),
    /// Every active tenant of one group
    Group(GroupId),
    /// Every active tenant across all groups
    All,
}

/// Compact identity of a tenant used in outcomes and reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantTarget {
    pub tenant_id: TenantId,
    pub base: String,
    pub group_id: GroupId,
}

impl From<&TenantRoute> for TenantTarget {
    fn from(route: &TenantRoute) -> Self {
        Self {
            tenant_id: route.tenant.id,
            base: route.tenant.base.clone(),
            group_id: route.tenant.group_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum SelectTenantsError {
    /// Unknown or inactive tenant. Fatal before any tenant
    /// connection work happens.
    #[error("tenant {base} was not found or is inactive")]
    TenantNotFound { base: String },

    #[error("group {group_id} was not found")]
    GroupNotFound { group_id: GroupId },

    #[error("failed to load tenants: {0}")]
    GetTenants(DbErr),

    #[error("failed to load groups: {0}")]
    GetGroups(DbErr),
}

/// Resolve a selector against the registry into concrete tenant routes,
/// in registry order
#[tracing::instrument(skip(root_db))]
pub async fn resolve_targets(
    root_db: &DbPool,
    selector: &TenantSelector,
) -> Result<Vec<TenantRoute>, SelectTenantsError> {
    match selector {
        TenantSelector::One(base) => {
            let tenant = Tenant::find_by_base(root_db, base)
                .await
                .map_err(SelectTenantsError::GetTenants)?
                .filter(|tenant| tenant.active)
                .ok_or_else(|| SelectTenantsError::TenantNotFound { base: base.clone() })?;

            let group = Group::find_by_id(root_db, tenant.group_id)
                .await
                .map_err(SelectTenantsError::GetGroups)?
                .ok_or(SelectTenantsError::GroupNotFound {
                    group_id: tenant.group_id,
                })?;

            Ok(vec![TenantRoute { tenant, group }])
        }

        TenantSelector::Group(group_id) => {
            let group = Group::find_by_id(root_db, *group_id)
                .await
                .map_err(SelectTenantsError::GetGroups)?
                .ok_or(SelectTenantsError::GroupNotFound {
                    group_id: *group_id,
                })?;

            let tenants = Tenant::find_by_group(root_db, *group_id)
                .await
                .map_err(SelectTenantsError::GetTenants)?;

            Ok(tenants
                .into_iter()
                .map(|tenant| TenantRoute {
                    tenant,
                    group: group.clone(),
                })
                .collect())
        }

        TenantSelector::All => {
            let groups = Group::all(root_db)
                .await
                .map_err(SelectTenantsError::GetGroups)?;
            let groups: HashMap<GroupId, Group> =
                groups.into_iter().map(|group| (group.id, group)).collect();

            let tenants = Tenant::all_active(root_db)
                .await
                .map_err(SelectTenantsError::GetTenants)?;

            tenants
                .into_iter()
                .map(|tenant| {
                    let group = groups.get(&tenant.group_id).cloned().ok_or(
                        SelectTenantsError::GroupNotFound {
                            group_id: tenant.group_id,
                        },
                    )?;
                    Ok(TenantRoute { tenant, group })
                })
                .collect()
        }
    }
}
