//! Applied-migration log stored inside each tenant database

use chrono::{DateTime, Utc};
use schemafleet_database::{DbExecutor, DbPool, DbResult};
use sqlx::prelude::FromRow;

/// One row of the append-only applied-migration log. Migrations applied
/// together share a `run` number.
#[derive(Debug, Clone, FromRow)]
pub struct AppliedMigration {
    pub seq: i64,
    pub name: String,
    pub run: i64,
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    /// Create the log table if the tenant database doesn't have one yet
    pub async fn ensure_table(db: &DbPool) -> DbResult<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS "schemafleet_migrations" (
                "seq" BIGINT PRIMARY KEY GENERATED ALWAYS AS IDENTITY,
                "name" TEXT NOT NULL UNIQUE,
                "run" BIGINT NOT NULL,
                "applied_at" TIMESTAMPTZ NOT NULL
            )
        "#,
        )
        .execute(db)
        .await?;

        Ok(())
    }

    /// Record a migration as applied
    pub async fn create(
        db: impl DbExecutor<'_>,
        name: &str,
        run: i64,
        applied_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO "schemafleet_migrations" ("name", "run", "applied_at")
            VALUES ($1, $2, $3)
        "#,
        )
        .bind(name)
        .bind(run)
        .bind(applied_at)
        .execute(db)
        .await?;

        Ok(())
    }

    /// All applied migrations in application order
    pub async fn all(db: impl DbExecutor<'_>) -> DbResult<Vec<AppliedMigration>> {
        sqlx::query_as(r#"SELECT * FROM "schemafleet_migrations" ORDER BY "seq""#)
            .fetch_all(db)
            .await
    }

    /// Remove a migration from the log after its down SQL ran
    pub async fn delete(db: impl DbExecutor<'_>, name: &str) -> DbResult<()> {
        sqlx::query(r#"DELETE FROM "schemafleet_migrations" WHERE "name" = $1"#)
            .bind(name)
            .execute(db)
            .await?;

        Ok(())
    }
}
