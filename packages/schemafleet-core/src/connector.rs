use schemafleet_database::{
    DbPool,
    models::TenantRoute,
    pool::{DatabasePoolCache, DbConnectErr},
};
use std::future::Future;

/// Provider of database access for the orchestrator
///
/// Hands out connection pools for the root registry database and for
/// individual tenant databases. Tenant pools are scoped to the route
/// they were requested for; there is no shared "current tenant" state
/// to restore afterwards.
pub trait TenantConnector: Send + Sync + 'static {
    /// Connect to the root registry database
    fn root_pool(&self) -> impl Future<Output = Result<DbPool, DbConnectErr>> + Send;

    /// Connect to the database of the tenant described by `route`
    fn tenant_pool(
        &self,
        route: &TenantRoute,
    ) -> impl Future<Output = Result<DbPool, DbConnectErr>> + Send;
}

impl TenantConnector for DatabasePoolCache {
    async fn root_pool(&self) -> Result<DbPool, DbConnectErr> {
        self.get_root_pool().await
    }

    async fn tenant_pool(&self, route: &TenantRoute) -> Result<DbPool, DbConnectErr> {
        self.get_tenant_pool(route).await
    }
}
