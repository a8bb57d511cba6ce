use crate::{DbExecutor, DbResult, models::group::GroupId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::prelude::FromRow;

pub type TenantId = i64;

/// A single tenant database. Belongs to exactly one group; any of the
/// optional connection fields override the group defaults when set.
///
/// The registry is the sole writer of tenant metadata. The orchestrator
/// only reads, with the one exception of the `last_connected_at`
/// bookkeeping field.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    /// Unique ID for the tenant
    pub id: TenantId,
    /// Unique base name for the tenant
    pub base: String,
    /// Group the tenant belongs to
    pub group_id: GroupId,
    /// Name of the tenant database
    pub db_name: String,
    /// Optional host override
    pub host: Option<String>,
    /// Optional port override
    pub port: Option<i32>,
    /// Optional database user override
    pub username: Option<String>,
    /// Optional credentials secret override
    pub secret_name: Option<String>,
    /// Whether the tenant takes part in fleet operations
    pub active: bool,
    /// When the orchestrator last connected to this tenant
    pub last_connected_at: Option<DateTime<Utc>>,
}

pub struct CreateTenant {
    pub base: String,
    pub group_id: GroupId,
    pub db_name: String,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub username: Option<String>,
    pub secret_name: Option<String>,
}

impl Tenant {
    /// Create a new tenant
    pub async fn create(db: impl DbExecutor<'_>, create: CreateTenant) -> DbResult<Tenant> {
        let id: TenantId = sqlx::query_scalar(
            r#"
            INSERT INTO "schemafleet_tenants" (
                "base",
                "group_id",
                "db_name",
                "host",
                "port",
                "username",
                "secret_name"
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING "id"
        "#,
        )
        .bind(create.base.as_str())
        .bind(create.group_id)
        .bind(create.db_name.as_str())
        .bind(create.host.as_ref())
        .bind(create.port)
        .bind(create.username.as_ref())
        .bind(create.secret_name.as_ref())
        .fetch_one(db)
        .await?;

        Ok(Tenant {
            id,
            base: create.base,
            group_id: create.group_id,
            db_name: create.db_name,
            host: create.host,
            port: create.port,
            username: create.username,
            secret_name: create.secret_name,
            active: true,
            last_connected_at: None,
        })
    }

    /// Find a tenant by its unique `base` name
    pub async fn find_by_base(db: impl DbExecutor<'_>, base: &str) -> DbResult<Option<Tenant>> {
        sqlx::query_as(r#"SELECT * FROM "schemafleet_tenants" WHERE "base" = $1"#)
            .bind(base)
            .fetch_optional(db)
            .await
    }

    /// Find a tenant by `id`
    pub async fn find_by_id(db: impl DbExecutor<'_>, id: TenantId) -> DbResult<Option<Tenant>> {
        sqlx::query_as(r#"SELECT * FROM "schemafleet_tenants" WHERE "id" = $1"#)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Finds all active tenants within a specific group
    pub async fn find_by_group(db: impl DbExecutor<'_>, group_id: GroupId) -> DbResult<Vec<Tenant>> {
        sqlx::query_as(
            r#"SELECT * FROM "schemafleet_tenants" WHERE "group_id" = $1 AND "active" ORDER BY "id""#,
        )
        .bind(group_id)
        .fetch_all(db)
        .await
    }

    /// Finds all active tenants
    pub async fn all_active(db: impl DbExecutor<'_>) -> DbResult<Vec<Tenant>> {
        sqlx::query_as(r#"SELECT * FROM "schemafleet_tenants" WHERE "active" ORDER BY "id""#)
            .fetch_all(db)
            .await
    }

    /// Finds all tenants, active or not
    pub async fn all(db: impl DbExecutor<'_>) -> DbResult<Vec<Tenant>> {
        sqlx::query_as(r#"SELECT * FROM "schemafleet_tenants" ORDER BY "id""#)
            .fetch_all(db)
            .await
    }

    /// Record that the orchestrator connected to this tenant
    pub async fn touch_last_connected(&mut self, db: impl DbExecutor<'_>) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(r#"UPDATE "schemafleet_tenants" SET "last_connected_at" = $1 WHERE "id" = $2"#)
            .bind(now)
            .bind(self.id)
            .execute(db)
            .await?;

        self.last_connected_at = Some(now);
        Ok(())
    }
}
