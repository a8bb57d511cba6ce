use schemafleet_database::{
    DbPool, create,
    models::{
        group::{CreateGroup, Group},
        tenant::{CreateTenant, Tenant},
    },
};
use sqlx::postgres::PgConnectOptions;
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{ContainerAsync, runners::AsyncRunner},
};

/// Start a postgres container holding the registry tables. The
/// container must be kept alive for the duration of the test.
#[allow(unused)]
pub async fn test_registry_db() -> (DbPool, ContainerAsync<Postgres>) {
    let container = Postgres::default()
        .start()
        .await
        .expect("failed to start postgres container");

    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get postgres port");

    let options = PgConnectOptions::new()
        .host("127.0.0.1")
        .port(port)
        .username("postgres")
        .password("postgres")
        .database("postgres");

    let db = DbPool::connect_with(options)
        .await
        .expect("failed to connect to postgres container");

    create::create_registry_tables(&db)
        .await
        .expect("failed to create registry tables");

    (db, container)
}

/// Make a test group
#[allow(unused)]
pub async fn make_test_group(db: &DbPool, description: impl Into<String>) -> Group {
    let description = description.into();
    Group::create(
        db,
        CreateGroup {
            secret_name: format!("{description}-secret"),
            description,
            host: "127.0.0.1".to_string(),
            port: 5432,
            username: "fleet".to_string(),
        },
    )
    .await
    .unwrap()
}

/// Make a test tenant in the given group
#[allow(unused)]
pub async fn make_test_tenant(db: &DbPool, group: &Group, base: impl Into<String>) -> Tenant {
    let base = base.into();
    Tenant::create(
        db,
        CreateTenant {
            db_name: format!("db_{base}"),
            base,
            group_id: group.id,
            host: None,
            port: None,
            username: None,
            secret_name: None,
        },
    )
    .await
    .unwrap()
}
