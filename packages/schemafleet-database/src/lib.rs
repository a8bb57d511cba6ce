//! # schemafleet database
//!
//! Tenant registry models and connection routing for the migration
//! orchestrator. Every tenant is a separate Postgres database reachable
//! through its owning group (cluster); the registry itself lives in the
//! root "schemafleet" database.
//!
//! Connection handling is pool-per-tenant: there is no process-wide
//! "current tenant" binding. Switching tenants means picking a different
//! entry out of the [pool::DatabasePoolCache].

use sqlx::{Postgres, Transaction};

pub use sqlx::PgExecutor as DbExecutor;

pub mod connect;
pub mod create;
pub mod models;
pub mod pool;
pub mod utils;

/// Type of the database connection pool
pub type DbPool = sqlx::PgPool;

/// Short type alias for a database error
pub type DbErr = sqlx::Error;

/// Type alias for a result where the error is a [DbErr]
pub type DbResult<T> = Result<T, DbErr>;

/// Type of a database transaction
pub type DbTransaction<'c> = Transaction<'c, Postgres>;

/// Name of the root registry database. Contains the groups and
/// tenants tables and nothing else.
pub const ROOT_DATABASE_NAME: &str = "schemafleet";
