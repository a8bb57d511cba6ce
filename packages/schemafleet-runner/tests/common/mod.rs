use schemafleet_database::DbPool;
use schemafleet_runner::Migration;
use sqlx::postgres::PgConnectOptions;
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{ContainerAsync, runners::AsyncRunner},
};

/// Start a postgres container and connect a pool to it. The container
/// must be kept alive for the duration of the test.
pub async fn test_db() -> (DbPool, ContainerAsync<Postgres>) {
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

    (db, container)
}

/// Three well formed test migrations
#[allow(unused)]
pub fn test_migrations() -> Vec<Migration> {
    vec![
        Migration {
            name: "m1_create_accounts".to_string(),
            up: "CREATE TABLE accounts (id BIGINT PRIMARY KEY, name TEXT NOT NULL);".to_string(),
            down: "DROP TABLE accounts;".to_string(),
        },
        Migration {
            name: "m2_create_invoices".to_string(),
            up: "CREATE TABLE invoices (id BIGINT PRIMARY KEY, account_id BIGINT NOT NULL);"
                .to_string(),
            down: "DROP TABLE invoices;".to_string(),
        },
        Migration {
            name: "m3_add_invoice_index".to_string(),
            up: "CREATE INDEX invoices_account_id_idx ON invoices (account_id);".to_string(),
            down: "DROP INDEX invoices_account_id_idx;".to_string(),
        },
    ]
}
