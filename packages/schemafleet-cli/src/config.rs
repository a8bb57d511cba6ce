use eyre::Context;
use schemafleet_core::{batch::BatchConfig, fleet::FleetConfig};
use schemafleet_database::pool::{DatabasePoolCache, DatabasePoolCacheConfig};
use schemafleet_runner::{SqlMigrationRunner, load_migrations};
use schemafleet_secrets::{SecretManager, SecretsManagerConfig};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Top level CLI configuration file
#[derive(Clone, Deserialize)]
pub struct CliConfiguration {
    /// Registry database and pool cache configuration
    pub database: DatabasePoolCacheConfig,
    /// Secret manager configuration
    pub secrets: SecretsManagerConfig,
    /// Directory holding the `<name>.up.sql` / `<name>.down.sql` pairs
    pub migrations_dir: PathBuf,
    /// Batch and monitoring tuning
    #[serde(default)]
    pub fleet: FleetTuning,
}

/// Optional fleet tuning, everything falls back to the defaults
#[derive(Clone, Default, Deserialize)]
pub struct FleetTuning {
    /// Number of parallel batch workers
    pub workers: Option<usize>,
    /// Progress monitor poll interval in milliseconds
    pub poll_interval_ms: Option<u64>,
    /// Per tenant job wall clock ceiling in seconds
    pub job_timeout_secs: Option<u64>,
}

impl CliConfiguration {
    pub fn fleet_config(&self) -> FleetConfig {
        let defaults = BatchConfig::default();

        FleetConfig {
            batch: BatchConfig {
                workers: self.fleet.workers.unwrap_or(defaults.workers),
                allow_failures: false,
                job_timeout: self
                    .fleet
                    .job_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.job_timeout),
            },
            poll_interval: self
                .fleet
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| FleetConfig::default().poll_interval),
        }
    }
}

/// Shared services built from the configuration
pub struct Services {
    pub connector: Arc<DatabasePoolCache>,
    pub runner: Arc<SqlMigrationRunner>,
}

impl Services {
    pub fn from_config(config: &CliConfiguration) -> eyre::Result<Self> {
        let secrets = SecretManager::from_config(config.secrets.clone());
        let connector = Arc::new(DatabasePoolCache::from_config(
            config.database.clone(),
            secrets,
        ));

        let migrations = load_migrations(&config.migrations_dir)
            .context("failed to load migration definitions")?;
        let runner = Arc::new(SqlMigrationRunner::new(migrations));

        Ok(Self { connector, runner })
    }
}
