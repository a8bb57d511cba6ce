use crate::models::{group::Group, tenant::Tenant};

pub mod group;
pub mod tenant;

/// A tenant paired with its owning group. This is the unit the
/// orchestrator routes work against: the group supplies the default
/// connection parameters, the tenant may override them.
#[derive(Debug, Clone)]
pub struct TenantRoute {
    pub tenant: Tenant,
    pub group: Group,
}

impl TenantRoute {
    /// Name of the secret holding the database credentials for this route
    pub fn secret_name(&self) -> &str {
        self.tenant
            .secret_name
            .as_deref()
            .unwrap_or(&self.group.secret_name)
    }
}
