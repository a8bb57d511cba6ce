//! SQL migration runner backed by an ordered migration list

use crate::{
    ApplyOutcome, Migration, MigrationApplyError, MigrationRevertError, MigrationRunner,
    RevertOutcome, log::AppliedMigration,
};
use chrono::Utc;
use schemafleet_database::{DbErr, DbPool, DbResult, DbTransaction};
use std::ops::DerefMut;

/// Default runner: executes the up/down SQL of an ordered set of named
/// migrations, tracking what ran in the tenant's own
/// `schemafleet_migrations` table.
///
/// Each migration's statements commit in one transaction together with
/// its log row, so a failure part way through a run leaves the earlier
/// migrations of that run applied and the failing one absent.
pub struct SqlMigrationRunner {
    migrations: Vec<Migration>,
}

impl SqlMigrationRunner {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }
}

/// Run each `;` separated statement of `sql` within the transaction
async fn run_statements(t: &mut DbTransaction<'_>, name: &str, sql: &str) -> DbResult<()> {
    let queries = sql
        .split(';')
        .map(|query| query.trim())
        .filter(|query| !query.is_empty());

    for query in queries {
        let result = sqlx::query(query)
            .execute(t.deref_mut())
            .await
            .inspect_err(|error| {
                tracing::error!(?error, ?name, "failed to execute migration statement")
            })?;

        tracing::debug!(
            ?name,
            rows_affected = result.rows_affected(),
            "executed migration statement"
        );
    }

    Ok(())
}

impl MigrationRunner for SqlMigrationRunner {
    async fn apply(&self, db: &DbPool) -> Result<ApplyOutcome, MigrationApplyError> {
        AppliedMigration::ensure_table(db)
            .await
            .map_err(MigrationApplyError::Db)?;

        let applied = AppliedMigration::all(db)
            .await
            .map_err(MigrationApplyError::Db)?;

        let run = applied.iter().map(|row| row.run).max().unwrap_or(0) + 1;

        let mut outcome = ApplyOutcome::default();

        for migration in &self.migrations {
            // Skip already applied migrations
            if applied.iter().any(|row| row.name.eq(&migration.name)) {
                outcome.already_applied.push(migration.name.clone());
                continue;
            }

            let mut t = db.begin().await.map_err(MigrationApplyError::Db)?;

            run_statements(&mut t, &migration.name, &migration.up)
                .await
                .map_err(|cause| MigrationApplyError::Apply {
                    name: migration.name.clone(),
                    cause,
                })?;

            // Store the applied migration
            AppliedMigration::create(t.deref_mut(), &migration.name, run, Utc::now())
                .await
                .map_err(MigrationApplyError::Db)?;

            t.commit().await.map_err(MigrationApplyError::Db)?;

            tracing::info!(name = ?migration.name, run, "applied migration");
            outcome.applied_now.push(migration.name.clone());
        }

        Ok(outcome)
    }

    async fn revert(
        &self,
        db: &DbPool,
        steps: Option<usize>,
    ) -> Result<RevertOutcome, MigrationRevertError> {
        AppliedMigration::ensure_table(db)
            .await
            .map_err(MigrationRevertError::Db)?;

        let applied = AppliedMigration::all(db)
            .await
            .map_err(MigrationRevertError::Db)?;

        // Newest first
        let targets: Vec<&AppliedMigration> = match steps {
            Some(steps) => applied.iter().rev().take(steps).collect(),
            None => {
                let latest_run = applied.iter().map(|row| row.run).max();
                applied
                    .iter()
                    .rev()
                    .filter(|row| Some(row.run) == latest_run)
                    .collect()
            }
        };

        let mut outcome = RevertOutcome::default();

        for target in targets {
            let migration = self
                .migrations
                .iter()
                .find(|migration| migration.name.eq(&target.name))
                .ok_or_else(|| MigrationRevertError::UnknownMigration {
                    name: target.name.clone(),
                })?;

            let mut t = db.begin().await.map_err(MigrationRevertError::Db)?;

            run_statements(&mut t, &migration.name, &migration.down)
                .await
                .map_err(|cause| MigrationRevertError::Revert {
                    name: migration.name.clone(),
                    cause,
                })?;

            AppliedMigration::delete(t.deref_mut(), &migration.name)
                .await
                .map_err(MigrationRevertError::Db)?;

            t.commit().await.map_err(MigrationRevertError::Db)?;

            tracing::info!(name = ?migration.name, "reverted migration");
            outcome.reverted_now.push(migration.name.clone());
        }

        Ok(outcome)
    }

    async fn list_applied(&self, db: &DbPool) -> Result<Vec<String>, DbErr> {
        AppliedMigration::ensure_table(db).await?;

        let applied = AppliedMigration::all(db).await?;
        Ok(applied.into_iter().map(|row| row.name).collect())
    }

    fn list_available(&self) -> Vec<String> {
        self.migrations
            .iter()
            .map(|migration| migration.name.clone())
            .collect()
    }
}
