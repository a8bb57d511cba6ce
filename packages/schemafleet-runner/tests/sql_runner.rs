use schemafleet_database::create::check_database_table_exists;
use schemafleet_runner::{
    Migration, MigrationApplyError, MigrationRevertError, MigrationRunner, SqlMigrationRunner,
};

use crate::common::{test_db, test_migrations};

mod common;

/// Tests that a fresh database gets every migration applied in order
#[tokio::test]
async fn test_apply_fresh_database() {
    let (db, _db_container) = test_db().await;
    let runner = SqlMigrationRunner::new(test_migrations());

    let outcome = runner.apply(&db).await.unwrap();

    assert_eq!(
        outcome.applied_now,
        vec![
            "m1_create_accounts",
            "m2_create_invoices",
            "m3_add_invoice_index"
        ]
    );
    assert!(outcome.already_applied.is_empty());

    assert!(check_database_table_exists(&db, "accounts").await.unwrap());
    assert!(check_database_table_exists(&db, "invoices").await.unwrap());
}

/// Tests that applying twice in succession is a no-op the second time
#[tokio::test]
async fn test_apply_twice_is_noop() {
    let (db, _db_container) = test_db().await;
    let runner = SqlMigrationRunner::new(test_migrations());

    runner.apply(&db).await.unwrap();
    let second = runner.apply(&db).await.unwrap();

    assert!(second.applied_now.is_empty());
    assert_eq!(second.already_applied.len(), 3);
}

/// Tests that apply stops at the first failing migration and leaves the
/// earlier migrations of the run applied
#[tokio::test]
async fn test_apply_stops_at_first_failure() {
    let (db, _db_container) = test_db().await;

    let mut migrations = test_migrations();
    migrations[1].up = "CREATE TABLE invoices (id BROKEN_TYPE);".to_string();
    let runner = SqlMigrationRunner::new(migrations);

    let error = runner.apply(&db).await.unwrap_err();
    assert!(matches!(
        error,
        MigrationApplyError::Apply { ref name, .. } if name == "m2_create_invoices"
    ));

    // First migration of the run persists, the failing one is absent
    let applied = runner.list_applied(&db).await.unwrap();
    assert_eq!(applied, vec!["m1_create_accounts"]);
    assert!(check_database_table_exists(&db, "accounts").await.unwrap());
    assert!(!check_database_table_exists(&db, "invoices").await.unwrap());
}

/// Tests that revert without steps reverts exactly the most recent run
#[tokio::test]
async fn test_revert_defaults_to_last_run() {
    let (db, _db_container) = test_db().await;

    let migrations = test_migrations();

    // First run applies m1 only
    let runner = SqlMigrationRunner::new(migrations[..1].to_vec());
    runner.apply(&db).await.unwrap();

    // Second run applies m2 and m3
    let runner = SqlMigrationRunner::new(migrations);
    runner.apply(&db).await.unwrap();

    let outcome = runner.revert(&db, None).await.unwrap();

    assert_eq!(
        outcome.reverted_now,
        vec!["m3_add_invoice_index", "m2_create_invoices"]
    );

    let applied = runner.list_applied(&db).await.unwrap();
    assert_eq!(applied, vec!["m1_create_accounts"]);
}

/// Tests that revert with steps reverts exactly that many of the most
/// recently applied migrations and no others
#[tokio::test]
async fn test_revert_steps() {
    let (db, _db_container) = test_db().await;
    let runner = SqlMigrationRunner::new(test_migrations());

    runner.apply(&db).await.unwrap();

    let outcome = runner.revert(&db, Some(2)).await.unwrap();

    assert_eq!(
        outcome.reverted_now,
        vec!["m3_add_invoice_index", "m2_create_invoices"]
    );

    let applied = runner.list_applied(&db).await.unwrap();
    assert_eq!(applied, vec!["m1_create_accounts"]);
    assert!(check_database_table_exists(&db, "accounts").await.unwrap());
    assert!(!check_database_table_exists(&db, "invoices").await.unwrap());
}

/// Tests that reverting on an empty database reverts nothing
#[tokio::test]
async fn test_revert_empty_database() {
    let (db, _db_container) = test_db().await;
    let runner = SqlMigrationRunner::new(test_migrations());

    let outcome = runner.revert(&db, None).await.unwrap();
    assert!(outcome.reverted_now.is_empty());
}

/// Tests that an applied migration unknown to the runner refuses to
/// revert rather than guessing
#[tokio::test]
async fn test_revert_unknown_migration() {
    let (db, _db_container) = test_db().await;

    let runner = SqlMigrationRunner::new(test_migrations()[..1].to_vec());
    runner.apply(&db).await.unwrap();

    // A runner that no longer knows the applied migration
    let runner = SqlMigrationRunner::new(vec![Migration {
        name: "m9_other".to_string(),
        up: "CREATE TABLE other (id BIGINT);".to_string(),
        down: "DROP TABLE other;".to_string(),
    }]);

    let error = runner.revert(&db, Some(1)).await.unwrap_err();
    assert!(matches!(
        error,
        MigrationRevertError::UnknownMigration { ref name } if name == "m1_create_accounts"
    ));
}

/// Tests that list_applied reports names in application order
#[tokio::test]
async fn test_list_applied_order() {
    let (db, _db_container) = test_db().await;
    let runner = SqlMigrationRunner::new(test_migrations());

    assert!(runner.list_applied(&db).await.unwrap().is_empty());

    runner.apply(&db).await.unwrap();

    assert_eq!(
        runner.list_applied(&db).await.unwrap(),
        vec![
            "m1_create_accounts",
            "m2_create_invoices",
            "m3_add_invoice_index"
        ]
    );
}
