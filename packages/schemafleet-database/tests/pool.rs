use schemafleet_database::{
    ROOT_DATABASE_NAME, create,
    models::TenantRoute,
    pool::{DatabasePoolCache, DatabasePoolCacheConfig, DbConnectErr},
};
use schemafleet_secrets::{SecretManager, SecretsManagerConfig, memory::MemorySecretManagerConfig};
use sqlx::postgres::PgConnectOptions;
use std::collections::HashMap;
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{ContainerAsync, runners::AsyncRunner},
};

use crate::common::{make_test_group, make_test_tenant};

mod common;

const CREDENTIALS: &str = r#"{"username":"postgres","password":"postgres"}"#;

/// Start a postgres container with the root registry database created,
/// returning a pool cache routed at it
async fn test_pool_cache() -> (DatabasePoolCache, u16, ContainerAsync<Postgres>) {
    let container = Postgres::default()
        .start()
        .await
        .expect("failed to start postgres container");

    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get postgres port");

    // The registry database has to exist before the cache can route to it
    let admin = schemafleet_database::DbPool::connect_with(
        PgConnectOptions::new()
            .host("127.0.0.1")
            .port(port)
            .username("postgres")
            .password("postgres")
            .database("postgres"),
    )
    .await
    .expect("failed to connect to postgres container");

    create::create_database(&admin, ROOT_DATABASE_NAME)
        .await
        .unwrap();
    admin.close().await;

    let secrets = SecretManager::from_config(SecretsManagerConfig::Memory(
        MemorySecretManagerConfig {
            secrets: HashMap::from([
                ("root-secret".to_string(), CREDENTIALS.to_string()),
                ("primary-secret".to_string(), CREDENTIALS.to_string()),
            ]),
            default: None,
        },
    ));

    let cache = DatabasePoolCache::from_config(
        DatabasePoolCacheConfig {
            host: "127.0.0.1".to_string(),
            port,
            root_secret_name: "root-secret".to_string(),
            ..Default::default()
        },
        secrets,
    );

    (cache, port, container)
}

/// Tests connecting to the root registry database through the cache
#[tokio::test]
async fn test_root_pool() {
    let (cache, _port, _db_container) = test_pool_cache().await;

    let root_db = cache.get_root_pool().await.unwrap();
    create::create_registry_tables(&root_db).await.unwrap();

    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&root_db).await.unwrap();
    assert_eq!(one, 1);
}

/// Tests routing to a tenant database with group default credentials,
/// and that repeated requests share the cached pool
#[tokio::test]
async fn test_tenant_pool_routing() {
    let (cache, port, _db_container) = test_pool_cache().await;

    let root_db = cache.get_root_pool().await.unwrap();
    create::create_registry_tables(&root_db).await.unwrap();

    let mut group = make_test_group(&root_db, "primary").await;
    group.port = port as i32;
    let tenant = make_test_tenant(&root_db, &group, "acme").await;

    create::create_database(&root_db, &tenant.db_name)
        .await
        .unwrap();

    let route = TenantRoute { tenant, group };

    let tenant_db = cache.get_tenant_pool(&route).await.unwrap();
    let db_name: String = sqlx::query_scalar("SELECT current_database()")
        .fetch_one(&tenant_db)
        .await
        .unwrap();
    assert_eq!(db_name, "db_acme");

    // Acquiring the tenant pool never rebinds the root pool
    let root_name: String = sqlx::query_scalar("SELECT current_database()")
        .fetch_one(&root_db)
        .await
        .unwrap();
    assert_eq!(root_name, ROOT_DATABASE_NAME);

    // Repeated requests share the cached pool: closing it through the
    // cache closes both handles
    let again = cache.get_tenant_pool(&route).await.unwrap();
    cache.close_tenant_pool(&route).await;
    assert!(tenant_db.is_closed());
    assert!(again.is_closed());
}

/// Tests that a missing credentials secret fails the connection without
/// touching the database
#[tokio::test]
async fn test_missing_credentials() {
    let (cache, port, _db_container) = test_pool_cache().await;

    let root_db = cache.get_root_pool().await.unwrap();
    create::create_registry_tables(&root_db).await.unwrap();

    let mut group = make_test_group(&root_db, "unknown").await;
    group.port = port as i32;
    let tenant = make_test_tenant(&root_db, &group, "acme").await;

    let route = TenantRoute { tenant, group };

    let error = cache.get_tenant_pool(&route).await.unwrap_err();
    assert!(matches!(
        error,
        DbConnectErr::MissingCredentials | DbConnectErr::Shared(_)
    ));
}
