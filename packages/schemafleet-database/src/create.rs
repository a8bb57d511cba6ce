//! # Create
//!
//! Registry database bootstrap

use crate::{DbPool, DbResult};

/// Creates a new database.
///
/// Running this requires using an account with a higher level of access
/// than the standard db user
pub async fn create_database(db: &DbPool, db_name: &str) -> DbResult<()> {
    let sql = format!(r#"CREATE DATABASE "{db_name}";"#);
    sqlx::raw_sql(&sql).execute(db).await?;

    Ok(())
}

/// Setup the groups and tenants tables in the root registry database
pub async fn create_registry_tables(db: &DbPool) -> DbResult<()> {
    sqlx::raw_sql(include_str!("./registry/m1_create_groups_table.sql"))
        .execute(db)
        .await?;

    sqlx::raw_sql(include_str!("./registry/m2_create_tenants_table.sql"))
        .execute(db)
        .await?;

    Ok(())
}

/// Check whether `table_name` exists in the connected database
pub async fn check_database_table_exists(db: &DbPool, table_name: &str) -> DbResult<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM "information_schema"."tables"
            WHERE "table_schema" = 'public' AND "table_name" = $1
        )
    "#,
    )
    .bind(table_name)
    .fetch_one(db)
    .await?;

    Ok(exists)
}
