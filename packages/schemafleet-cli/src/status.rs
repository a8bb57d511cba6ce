use crate::{
    StatusFilter,
    config::{CliConfiguration, Services},
};
use schemafleet_core::{
    connector::TenantConnector,
    selector::{TenantSelector, resolve_targets},
    status::fleet_status,
};

/// Read-only status sweep. Always exits successfully; unreachable
/// tenants are reported inline.
pub async fn status(
    config: &CliConfiguration,
    selector: TenantSelector,
    only: Option<StatusFilter>,
) -> eyre::Result<()> {
    let services = Services::from_config(config)?;

    let root_db = services
        .connector
        .root_pool()
        .await
        .map_err(|error| eyre::eyre!("failed to connect to root database: {error}"))?;

    let routes = match resolve_targets(&root_db, &selector).await {
        Ok(routes) => routes,
        Err(error) => {
            println!("{error}");
            return Ok(());
        }
    };
    let outcome = fleet_status(&*services.connector, &*services.runner, &routes).await;

    let statuses: Vec<_> = outcome
        .statuses
        .iter()
        .filter(|status| match only {
            Some(StatusFilter::Pending) => status.pending_count() > 0,
            None => true,
        })
        .collect();

    println!("{:<24} {:>8}  MIGRATIONS", "TENANT", "PENDING");
    for status in &statuses {
        println!(
            "{:<24} {:>8}  {}",
            status.target.base,
            status.pending_count(),
            if status.pending.is_empty() {
                "-".to_string()
            } else {
                status.pending.join(", ")
            },
        );
    }

    if statuses.is_empty() {
        println!("(no tenants to show)");
    }

    for (message, target) in &outcome.failed {
        println!("could not inspect {}: {message}", target.base);
    }

    services.connector.close_all().await;
    Ok(())
}
