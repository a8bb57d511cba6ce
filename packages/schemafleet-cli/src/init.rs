use crate::config::{CliConfiguration, Services};
use schemafleet_core::connector::TenantConnector;
use schemafleet_database::create::create_registry_tables;

pub async fn init(config: &CliConfiguration) -> eyre::Result<()> {
    let services = Services::from_config(config)?;

    let root_db = services
        .connector
        .root_pool()
        .await
        .map_err(|error| eyre::eyre!("failed to connect to root database: {error}"))?;

    create_registry_tables(&root_db).await?;
    services.connector.close_all().await;

    println!("registry tables ready");
    Ok(())
}
