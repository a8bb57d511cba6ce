use crate::{
    config::{CliConfiguration, Services},
    confirm,
};
use schemafleet_core::{batch::BatchSnapshot, fleet::rollback_fleet, selector::TenantSelector};

pub async fn rollback(
    config: &CliConfiguration,
    selector: TenantSelector,
    step: Option<usize>,
    force: bool,
) -> eyre::Result<()> {
    let prompt = match step {
        Some(step) => format!("Revert the last {step} migrations on the selected tenants?"),
        None => "Revert the last migration run on the selected tenants?".to_string(),
    };

    if !force && !confirm(&prompt)? {
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

    let outcome = rollback_fleet(
        services.connector.clone(),
        services.runner,
        &selector,
        step,
        &config.fleet_config(),
        on_progress,
    )
    .await;

    services.connector.close_all().await;
    let outcome = outcome?;

    for (target, migrations) in &outcome.reverted {
        println!(
            "rolled back {}: {} reverted ({})",
            target.base,
            migrations.len(),
            if migrations.is_empty() {
                "nothing applied".to_string()
            } else {
                migrations.join(", ")
            },
        );
    }

    for (message, target) in &outcome.failed {
        println!("failed {}: {message}", target.base);
    }

    println!(
        "done: {} rolled back, {} failed",
        outcome.reverted.len(),
        outcome.failed.len(),
    );

    if !outcome.failed.is_empty() {
        return Err(eyre::eyre!(
            "{} tenants failed to roll back",
            outcome.failed.len()
        ));
    }

    Ok(())
}
