//! # Connection routing
//!
//! Pure resolution of effective connection parameters for a tenant.
//! Tenant overrides fall back to the owning group's defaults field by
//! field; the resulting [PgConnectOptions] is what a pool gets built
//! from. No global connection state is involved anywhere.

use crate::models::TenantRoute;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

/// Database credentials loaded from a secrets manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbSecrets {
    /// Optional user override. When absent the registry username
    /// (tenant override, then group default) is used.
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

/// Resolve the effective connection options for a tenant route.
///
/// Precedence for the username is secret, then tenant override, then
/// group default. Host and port come from the tenant override when set,
/// the group otherwise.
pub fn resolve_connect_options(route: &TenantRoute, credentials: &DbSecrets) -> PgConnectOptions {
    let tenant = &route.tenant;
    let group = &route.group;

    let host = tenant.host.as_deref().unwrap_or(&group.host);
    let port = tenant.port.unwrap_or(group.port) as u16;
    let username = credentials
        .username
        .as_deref()
        .or(tenant.username.as_deref())
        .unwrap_or(&group.username);

    PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(username)
        .password(&credentials.password)
        .database(&tenant.db_name)
}

/// Cache key for a tenant's pool. Scoped to the tenant identity, the
/// database name, and the secret in use so pools can never be shared
/// across tenants or survive a credential rotation.
pub fn tenant_cache_key(route: &TenantRoute) -> String {
    format!(
        "tenant-{}-{}-{}",
        route.tenant.id,
        route.tenant.db_name,
        route.secret_name()
    )
}
