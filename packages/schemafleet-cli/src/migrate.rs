use crate::{
    config::{CliConfiguration, Services},
    confirm,
};
use schemafleet_core::{
    batch::BatchSnapshot, compensate::CompensationOutcome, fleet::migrate_fleet,
    selector::TenantSelector,
};

pub async fn migrate(
    config: &CliConfiguration,
    selector: TenantSelector,
    force: bool,
) -> eyre::Result<()> {
    if !force && !confirm("Apply pending migrations to the selected tenants?")? {
        println!("aborted");
        return Ok(());
    }

    let services = Services::from_config(config)?;

    let mut last_processed = usize::MAX;
    let on_progress = |snapshot: &BatchSnapshot| {
        if snapshot.processed != last_processed {
            last_processed = snapshot.processed;
            println!(
                "progress: {}/{} tenants processed, {} failed",
                snapshot.processed,
                snapshot.jobs.len(),
                snapshot.failed,
            );
        }
    };

    let outcome = migrate_fleet(
        services.connector.clone(),
        services.runner,
        &selector,
        &config.fleet_config(),
        on_progress,
    )
    .await;

    services.connector.close_all().await;
    let outcome = outcome?;

    for (target, migrations) in &outcome.applied {
        println!(
            "migrated {}: {} applied ({})",
            target.base,
            migrations.len(),
            if migrations.is_empty() {
                "nothing pending".to_string()
            } else {
                migrations.join(", ")
            },
        );
    }

    for (message, target) in &outcome.failed {
        println!("failed {}: {message}", target.base);
    }

    println!(
        "done: {} migrated, {} failed",
        outcome.applied.len(),
        outcome.failed.len(),
    );

    match &outcome.compensation {
        Some(CompensationOutcome::NotNeeded) => {
            println!("migration failed before any tenant completed, nothing rolled back");
        }
        Some(CompensationOutcome::Compensated { reverted, failed }) => {
            if failed.is_empty() {
                println!(
                    "migration failed, rollback succeeded: {} tenants reverted",
                    reverted.len(),
                );
            } else {
                println!(
                    "migration failed, rollback also failed for {} of {} tenants - manual intervention required:",
                    failed.len(),
                    reverted.len() + failed.len(),
                );
                for (message, target) in failed {
                    println!("  {}: {message}", target.base);
                }
            }
        }
        None => {}
    }

    if !outcome.failed.is_empty() {
        return Err(eyre::eyre!(
            "{} tenants failed to migrate",
            outcome.failed.len()
        ));
    }

    Ok(())
}
