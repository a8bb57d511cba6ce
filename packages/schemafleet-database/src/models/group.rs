use crate::{DbExecutor, DbResult};
use serde::Serialize;
use sqlx::prelude::FromRow;

pub type GroupId = i64;

/// A database group (cluster). Connection parameters on the group are
/// the defaults for every tenant that belongs to it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Group {
    /// Unique ID for the group
    pub id: GroupId,
    /// Human readable description of the cluster
    pub description: String,
    /// Database host for the cluster
    pub host: String,
    /// Database port for the cluster
    pub port: i32,
    /// Default database user for tenants of this cluster
    pub username: String,
    /// Name of the secret holding the cluster database credentials
    pub secret_name: String,
}

pub struct CreateGroup {
    pub description: String,
    pub host: String,
    pub port: i32,
    pub username: String,
    pub secret_name: String,
}

impl Group {
    /// Create a new group
    pub async fn create(db: impl DbExecutor<'_>, create: CreateGroup) -> DbResult<Group> {
        let id: GroupId = sqlx::query_scalar(
            r#"
            INSERT INTO "schemafleet_groups" (
                "description",
                "host",
                "port",
                "username",
                "secret_name"
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING "id"
        "#,
        )
        .bind(create.description.as_str())
        .bind(create.host.as_str())
        .bind(create.port)
        .bind(create.username.as_str())
        .bind(create.secret_name.as_str())
        .fetch_one(db)
        .await?;

        Ok(Group {
            id,
            description: create.description,
            host: create.host,
            port: create.port,
            username: create.username,
            secret_name: create.secret_name,
        })
    }

    /// Find a group by `id`
    pub async fn find_by_id(db: impl DbExecutor<'_>, id: GroupId) -> DbResult<Option<Group>> {
        sqlx::query_as(r#"SELECT * FROM "schemafleet_groups" WHERE "id" = $1"#)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Finds all groups
    pub async fn all(db: impl DbExecutor<'_>) -> DbResult<Vec<Group>> {
        sqlx::query_as(r#"SELECT * FROM "schemafleet_groups" ORDER BY "id""#)
            .fetch_all(db)
            .await
    }
}
