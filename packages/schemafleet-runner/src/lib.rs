//! # Migration runner
//!
//! Applies and reverts a fixed, ordered set of named migrations against
//! whichever tenant database pool it is handed. Which migrations ran is
//! persisted as an append-only log inside each tenant's own database;
//! the orchestrator never maintains this log itself.

use schemafleet_database::{DbErr, DbPool};
use std::future::Future;
use thiserror::Error;

pub mod loader;
pub mod log;
pub mod sql;

pub use loader::load_migrations;
pub use sql::SqlMigrationRunner;

/// A named schema change with an apply and a revert form. Migrations
/// are strictly ordered by their position in the runner's list.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique name of the migration
    pub name: String,
    /// SQL applied when migrating
    pub up: String,
    /// SQL applied when rolling back
    pub down: String,
}

/// Outcome of applying migrations to a tenant
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    /// Migrations applied by this invocation, in order
    pub applied_now: Vec<String>,
    /// Migrations that had already been applied before this invocation
    pub already_applied: Vec<String>,
}

/// Outcome of reverting migrations on a tenant
#[derive(Debug, Clone, Default)]
pub struct RevertOutcome {
    /// Migrations reverted by this invocation, newest first
    pub reverted_now: Vec<String>,
}

#[derive(Debug, Error)]
pub enum MigrationApplyError {
    /// A migration's statements failed. Application stops at the first
    /// failing migration; earlier migrations in this run stay applied.
    #[error("failed to apply migration {name}: {cause}")]
    Apply {
        name: String,
        #[source]
        cause: DbErr,
    },

    #[error(transparent)]
    Db(DbErr),
}

#[derive(Debug, Error)]
pub enum MigrationRevertError {
    #[error("failed to revert migration {name}: {cause}")]
    Revert {
        name: String,
        #[source]
        cause: DbErr,
    },

    /// The applied-migration log names a migration this runner does not
    /// know. Reverting it would require guessing at its down SQL.
    #[error("migration {name} is applied but not registered with the runner")]
    UnknownMigration { name: String },

    #[error(transparent)]
    Db(DbErr),
}

/// The migration runner capability consumed by the orchestrator.
///
/// Implementations report per-migration success and failure and the
/// set of already-applied migration names. Apply must stop at the
/// first failing migration. Re-running apply on an already-migrated
/// tenant is a no-op; revert is not re-entrant.
pub trait MigrationRunner: Send + Sync + 'static {
    /// Apply all pending migrations to the connected database
    fn apply(
        &self,
        db: &DbPool,
    ) -> impl Future<Output = Result<ApplyOutcome, MigrationApplyError>> + Send;

    /// Revert migrations on the connected database. `steps` reverts
    /// that many of the most recently applied migrations; omitted it
    /// reverts exactly the most recent migration run.
    fn revert(
        &self,
        db: &DbPool,
        steps: Option<usize>,
    ) -> impl Future<Output = Result<RevertOutcome, MigrationRevertError>> + Send;

    /// Names of migrations recorded as applied on the connected database
    fn list_applied(&self, db: &DbPool) -> impl Future<Output = Result<Vec<String>, DbErr>> + Send;

    /// Names of every migration this runner knows, in order
    fn list_available(&self) -> Vec<String>;
}
