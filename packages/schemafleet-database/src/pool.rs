//! # Database Pool
//!
//! Pool-per-tenant connection management. Every tenant gets its own
//! connection pool, held in a cache keyed by tenant identity, so
//! addressing a different tenant is a cache lookup rather than a
//! mutation of any shared connection configuration.
//!
//! Pools are held in a cache with an expiry time to ensure they don't
//! hog too many database connections. Evicted pools are closed.
//!
//! ## Environment Variables
//!
//! * `SCHEMAFLEET_DB_HOST` - Registry database host
//! * `SCHEMAFLEET_DB_PORT` - Registry database port
//! * `SCHEMAFLEET_DB_CREDENTIAL_NAME` - Secret name for the root registry database
//! * `SCHEMAFLEET_DB_MAX_CONNECTIONS` - Max connections each tenant pool can contain
//! * `SCHEMAFLEET_DB_MAX_ROOT_CONNECTIONS` - Max connections the root registry pool can contain
//! * `SCHEMAFLEET_DB_ACQUIRE_TIMEOUT` - Timeout before acquiring a connection fails
//! * `SCHEMAFLEET_DB_IDLE_TIMEOUT` - Timeout before an idle connection is closed
//! * `SCHEMAFLEET_DB_CACHE_DURATION` - Duration idle pools are maintained for before closing
//! * `SCHEMAFLEET_DB_CACHE_CAPACITY` - Maximum database pools to hold at once
//! * `SCHEMAFLEET_DB_CREDENTIALS_CACHE_DURATION` - Duration credentials are cached for
//! * `SCHEMAFLEET_DB_CREDENTIALS_CACHE_CAPACITY` - Maximum credentials to cache

use crate::{
    DbErr, DbPool, ROOT_DATABASE_NAME,
    connect::{DbSecrets, resolve_connect_options, tenant_cache_key},
    models::TenantRoute,
};
use moka::{future::Cache, policy::EvictionPolicy};
use schemafleet_secrets::{SecretManager, SecretManagerError};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Config for the database pool cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabasePoolCacheConfig {
    /// Registry database host
    pub host: String,
    /// Registry database port
    pub port: u16,

    /// Name of the secret holding credentials for the root
    /// registry database
    pub root_secret_name: String,

    /// Max number of active connections per tenant database pool
    ///
    /// Migration work is mostly sequential DDL, so tenant pools stay
    /// small. Make sure `max_connections` * your number of tenants
    /// stays within the limits of your clusters.
    ///
    /// Default: 4
    pub max_connections: Option<u32>,

    /// Max number of active connections for the registry pool
    ///
    /// Registry queries are short lived lookups and don't need much.
    ///
    /// Default: 2
    pub max_connections_root: Option<u32>,

    /// Timeout in seconds before acquiring a database connection is
    /// considered a failure
    ///
    /// Default: 60s
    pub acquire_timeout: Option<u64>,

    /// If a connection has been idle for this duration in seconds it is
    /// closed and released back to the database
    ///
    /// Default: 10min
    pub idle_timeout: Option<u64>,

    /// Duration in seconds idle database pools are allowed to be cached
    /// before they are closed
    ///
    /// Default: 48h
    pub cache_duration: Option<u64>,

    /// Maximum database pools to maintain in the cache at once. Align
    /// this with your expected number of tenants.
    ///
    /// Default: 50
    pub cache_capacity: Option<u64>,

    /// Duration in seconds database credentials are allowed to be
    /// cached before they are refreshed from the secrets manager
    ///
    /// Default: 12h
    pub credentials_cache_duration: Option<u64>,

    /// Maximum database credentials to maintain in the cache at once
    ///
    /// Default: 50
    pub credentials_cache_capacity: Option<u64>,
}

impl Default for DatabasePoolCacheConfig {
    fn default() -> Self {
        Self {
            host: Default::default(),
            port: 5432,
            root_secret_name: Default::default(),
            max_connections: None,
            max_connections_root: None,
            acquire_timeout: None,
            idle_timeout: None,
            cache_duration: None,
            cache_capacity: None,
            credentials_cache_duration: None,
            credentials_cache_capacity: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DatabasePoolCacheConfigError {
    #[error("missing SCHEMAFLEET_DB_HOST environment variable")]
    MissingDatabaseHost,
    #[error("missing SCHEMAFLEET_DB_PORT environment variable")]
    MissingDatabasePort,
    #[error("missing SCHEMAFLEET_DB_CREDENTIAL_NAME environment variable")]
    MissingDatabaseSecretName,
    #[error("invalid {0} environment variable")]
    InvalidVariable(&'static str, #[source] ParseIntError),
}

/// Parse an optional numeric environment variable
fn env_parsed<T: FromStr<Err = ParseIntError>>(
    name: &'static str,
) -> Result<Option<T>, DatabasePoolCacheConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|error| DatabasePoolCacheConfigError::InvalidVariable(name, error)),
        Err(_) => Ok(None),
    }
}

impl DatabasePoolCacheConfig {
    pub fn from_env() -> Result<DatabasePoolCacheConfig, DatabasePoolCacheConfigError> {
        let host: String = std::env::var("SCHEMAFLEET_DB_HOST")
            .map_err(|_| DatabasePoolCacheConfigError::MissingDatabaseHost)?;
        let port: u16 = env_parsed("SCHEMAFLEET_DB_PORT")?
            .ok_or(DatabasePoolCacheConfigError::MissingDatabasePort)?;
        let root_secret_name = std::env::var("SCHEMAFLEET_DB_CREDENTIAL_NAME")
            .map_err(|_| DatabasePoolCacheConfigError::MissingDatabaseSecretName)?;

        Ok(DatabasePoolCacheConfig {
            host,
            port,
            root_secret_name,
            max_connections: env_parsed("SCHEMAFLEET_DB_MAX_CONNECTIONS")?,
            max_connections_root: env_parsed("SCHEMAFLEET_DB_MAX_ROOT_CONNECTIONS")?,
            acquire_timeout: env_parsed("SCHEMAFLEET_DB_ACQUIRE_TIMEOUT")?,
            idle_timeout: env_parsed("SCHEMAFLEET_DB_IDLE_TIMEOUT")?,
            cache_duration: env_parsed("SCHEMAFLEET_DB_CACHE_DURATION")?,
            cache_capacity: env_parsed("SCHEMAFLEET_DB_CACHE_CAPACITY")?,
            credentials_cache_duration: env_parsed("SCHEMAFLEET_DB_CREDENTIALS_CACHE_DURATION")?,
            credentials_cache_capacity: env_parsed("SCHEMAFLEET_DB_CREDENTIALS_CACHE_CAPACITY")?,
        })
    }
}

#[derive(Debug, Error)]
pub enum DbConnectErr {
    #[error("database credentials not found in secrets manager")]
    MissingCredentials,

    #[error("database credentials are missing a username")]
    MissingUsername,

    #[error(transparent)]
    SecretsManager(Box<SecretManagerError>),

    #[error(transparent)]
    Db(#[from] DbErr),

    #[error(transparent)]
    Shared(#[from] Arc<DbConnectErr>),
}

/// Cache for database pools
pub struct DatabasePoolCache {
    /// Registry database host
    host: String,

    /// Registry database port
    port: u16,

    /// Name of the secret that contains the credentials for the
    /// root registry database
    root_secret_name: String,

    /// Cache from the tenant cache key to the pool for that database
    cache: Cache<String, DbPool>,

    /// Cache for credentials, stores the last known credentials
    /// for each secret name
    credentials_cache: Cache<String, DbSecrets>,

    /// Secrets manager access to load credentials
    secrets_manager: SecretManager,

    /// Max connections per tenant database pool
    max_connections: u32,
    /// Max connections for the registry pool
    max_connections_root: u32,

    acquire_timeout: Duration,
    idle_timeout: Duration,
}

impl DatabasePoolCache {
    pub fn from_config(config: DatabasePoolCacheConfig, secrets_manager: SecretManager) -> Self {
        let cache_duration = Duration::from_secs(config.cache_duration.unwrap_or(60 * 60 * 48));
        let credentials_cache_duration =
            Duration::from_secs(config.credentials_cache_duration.unwrap_or(60 * 60 * 12));

        let cache_capacity = config.cache_capacity.unwrap_or(50);
        let credentials_cache_capacity = config.credentials_cache_capacity.unwrap_or(50);

        let cache = Cache::builder()
            .time_to_idle(cache_duration)
            .max_capacity(cache_capacity)
            .eviction_policy(EvictionPolicy::tiny_lfu())
            .async_eviction_listener(|cache_key: Arc<String>, pool: DbPool, _cause| {
                Box::pin(async move {
                    tracing::debug!(?cache_key, "database pool is no longer in use, closing");
                    pool.close().await
                })
            })
            .build();

        let credentials_cache = Cache::builder()
            .time_to_idle(credentials_cache_duration)
            .max_capacity(credentials_cache_capacity)
            .eviction_policy(EvictionPolicy::tiny_lfu())
            .build();

        Self {
            host: config.host,
            port: config.port,
            root_secret_name: config.root_secret_name,
            cache,
            credentials_cache,
            secrets_manager,
            max_connections: config.max_connections.unwrap_or(4),
            max_connections_root: config.max_connections_root.unwrap_or(2),
            idle_timeout: Duration::from_secs(config.idle_timeout.unwrap_or(60 * 10)),
            acquire_timeout: Duration::from_secs(config.acquire_timeout.unwrap_or(60)),
        }
    }

    /// Request a database pool for the root registry database
    pub async fn get_root_pool(&self) -> Result<DbPool, DbConnectErr> {
        let credentials = self.get_credentials(&self.root_secret_name).await?;
        let username = credentials
            .username
            .as_deref()
            .ok_or(DbConnectErr::MissingUsername)?;

        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(username)
            .password(&credentials.password)
            .database(ROOT_DATABASE_NAME);

        self.get_pool(
            "root".to_string(),
            &self.root_secret_name,
            options,
            self.max_connections_root,
        )
        .await
    }

    /// Request a database pool for a specific tenant
    pub async fn get_tenant_pool(&self, route: &TenantRoute) -> Result<DbPool, DbConnectErr> {
        let secret_name = route.secret_name().to_string();
        let credentials = self.get_credentials(&secret_name).await?;
        let options = resolve_connect_options(route, &credentials);

        self.get_pool(
            tenant_cache_key(route),
            &secret_name,
            options,
            self.max_connections,
        )
        .await
    }

    /// Closes the database pool for the specific tenant if one is
    /// available and removes the pool from the cache
    pub async fn close_tenant_pool(&self, route: &TenantRoute) {
        if let Some(pool) = self.cache.remove(&tenant_cache_key(route)).await {
            pool.close().await;
        }

        // Run cache async shutdown jobs
        self.cache.run_pending_tasks().await;
    }

    /// Empties all the caches
    pub async fn flush(&self) {
        self.cache.invalidate_all();
        self.credentials_cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Close all connections in the pool and invalidate the cache
    pub async fn close_all(&self) {
        for (_, value) in self.cache.iter() {
            value.close().await;
        }

        self.flush().await;
    }

    /// Obtains a database pool for `cache_key`, creating and caching a
    /// new one when absent
    async fn get_pool(
        &self,
        cache_key: String,
        secret_name: &str,
        options: PgConnectOptions,
        max_connections: u32,
    ) -> Result<DbPool, DbConnectErr> {
        let pool = self
            .cache
            .try_get_with(cache_key, async {
                let pool = self
                    .create_pool(secret_name, options, max_connections)
                    .await
                    .map_err(Arc::new)?;

                Ok(pool)
            })
            .await?;

        Ok(pool)
    }

    /// Obtains database credentials for `secret_name`
    async fn get_credentials(&self, secret_name: &str) -> Result<DbSecrets, DbConnectErr> {
        if let Some(credentials) = self.credentials_cache.get(secret_name).await {
            return Ok(credentials);
        }

        // Load new credentials
        let credentials = self
            .secrets_manager
            .parsed_secret::<DbSecrets>(secret_name)
            .await
            .map_err(|err| DbConnectErr::SecretsManager(Box::new(err)))?
            .ok_or(DbConnectErr::MissingCredentials)?;

        // Cache the credential
        self.credentials_cache
            .insert(secret_name.to_string(), credentials.clone())
            .await;

        Ok(credentials)
    }

    /// Creates a database pool connection.
    ///
    /// Connects eagerly so configuration errors surface here rather
    /// than on first query.
    async fn create_pool(
        &self,
        secret_name: &str,
        options: PgConnectOptions,
        max_connections: u32,
    ) -> Result<DbPool, DbConnectErr> {
        tracing::debug!(?secret_name, "creating db pool connection");

        match PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .connect_with(options)
            .await
        {
            // Success case
            Ok(value) => Ok(value),
            Err(err) => {
                // Drop the credentials cache in case the credentials were wrong
                self.credentials_cache.remove(secret_name).await;
                Err(DbConnectErr::Db(err))
            }
        }
    }
}
