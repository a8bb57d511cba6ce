use schemafleet_core::connector::TenantConnector;
use schemafleet_database::{
    DbErr, DbPool, create,
    models::{TenantRoute, group::Group, tenant::Tenant},
    pool::DbConnectErr,
};
use schemafleet_runner::{
    ApplyOutcome, MigrationApplyError, MigrationRevertError, MigrationRunner, RevertOutcome,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{ContainerAsync, runners::AsyncRunner},
};
use tokio::sync::Mutex;

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

/// Build routes for the given tenant base names, all in one group.
/// Tenant ids are assigned in order starting at 1, databases are named
/// `db_<base>`.
#[allow(unused)]
pub fn make_routes(bases: &[&str]) -> Vec<TenantRoute> {
    let group = Group {
        id: 1,
        description: "test cluster".to_string(),
        host: "127.0.0.1".to_string(),
        port: 1,
        username: "test".to_string(),
        secret_name: "test".to_string(),
    };

    bases
        .iter()
        .enumerate()
        .map(|(index, base)| TenantRoute {
            tenant: Tenant {
                id: index as i64 + 1,
                base: base.to_string(),
                group_id: group.id,
                db_name: format!("db_{base}"),
                host: None,
                port: None,
                username: None,
                secret_name: None,
                active: true,
                last_connected_at: None,
            },
            group: group.clone(),
        })
        .collect()
}

/// A pool that is never actually connected. The scripted runner keys
/// its behavior off the database name carried in the pool options, so
/// no real database is needed.
fn lazy_pool(db_name: &str) -> DbPool {
    let options = PgConnectOptions::new()
        .host("127.0.0.1")
        .port(1)
        .username("test")
        .database(db_name);

    PgPoolOptions::new().connect_lazy_with(options)
}

/// Connector double that hands out lazy pools and counts how often
/// each tenant was connected to
#[derive(Default)]
pub struct MockConnector {
    tenant_connects: Mutex<HashMap<String, usize>>,
    fail_connect: HashSet<String>,
}

impl MockConnector {
    #[allow(unused)]
    pub fn failing_connect(bases: &[&str]) -> Self {
        Self {
            fail_connect: bases.iter().map(|base| base.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Number of times `base` was connected to
    #[allow(unused)]
    pub async fn connect_count(&self, base: &str) -> usize {
        self.tenant_connects
            .lock()
            .await
            .get(base)
            .copied()
            .unwrap_or_default()
    }
}

impl TenantConnector for MockConnector {
    async fn root_pool(&self) -> Result<DbPool, DbConnectErr> {
        // Registry bookkeeping is best effort and not under test here
        Err(DbConnectErr::MissingCredentials)
    }

    async fn tenant_pool(&self, route: &TenantRoute) -> Result<DbPool, DbConnectErr> {
        let base = route.tenant.base.clone();

        *self
            .tenant_connects
            .lock()
            .await
            .entry(base.clone())
            .or_default() += 1;

        if self.fail_connect.contains(&base) {
            return Err(DbConnectErr::MissingCredentials);
        }

        Ok(lazy_pool(&route.tenant.db_name))
    }
}

/// Runner double with per-database scripted state
#[derive(Default)]
pub struct ScriptedRunner {
    available: Vec<String>,
    /// Database name -> applied migration names
    applied: Mutex<HashMap<String, Vec<String>>>,
    /// Database names whose apply fails
    fail_apply: HashSet<String>,
    /// Database names whose revert fails
    fail_revert: HashSet<String>,
    /// Delay before every apply, to exercise in-flight behavior
    apply_delay: Duration,
    /// Recorded revert invocations as (database, steps)
    pub reverts: Mutex<Vec<(String, Option<usize>)>>,
}

impl ScriptedRunner {
    #[allow(unused)]
    pub fn new(available: &[&str]) -> Self {
        Self {
            available: available.iter().map(|name| name.to_string()).collect(),
            ..Default::default()
        }
    }

    #[allow(unused)]
    pub fn failing_apply(mut self, db_names: &[&str]) -> Self {
        self.fail_apply = db_names.iter().map(|name| name.to_string()).collect();
        self
    }

    #[allow(unused)]
    pub fn failing_revert(mut self, db_names: &[&str]) -> Self {
        self.fail_revert = db_names.iter().map(|name| name.to_string()).collect();
        self
    }

    #[allow(unused)]
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }

    /// Mark migrations as already applied on a database
    #[allow(unused)]
    pub async fn preload_applied(&self, db_name: &str, names: &[&str]) {
        self.applied.lock().await.insert(
            db_name.to_string(),
            names.iter().map(|name| name.to_string()).collect(),
        );
    }

    #[allow(unused)]
    pub async fn applied_on(&self, db_name: &str) -> Vec<String> {
        self.applied
            .lock()
            .await
            .get(db_name)
            .cloned()
            .unwrap_or_default()
    }
}

fn pool_db_name(db: &DbPool) -> String {
    db.connect_options()
        .get_database()
        .unwrap_or_default()
        .to_string()
}

impl MigrationRunner for ScriptedRunner {
    async fn apply(&self, db: &DbPool) -> Result<ApplyOutcome, MigrationApplyError> {
        let db_name = pool_db_name(db);

        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }

        if self.fail_apply.contains(&db_name) {
            return Err(MigrationApplyError::Apply {
                name: self
                    .available
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "m1".to_string()),
                cause: DbErr::PoolClosed,
            });
        }

        let mut applied = self.applied.lock().await;
        let entry = applied.entry(db_name).or_default();

        let mut outcome = ApplyOutcome::default();
        for name in &self.available {
            if entry.contains(name) {
                outcome.already_applied.push(name.clone());
            } else {
                entry.push(name.clone());
                outcome.applied_now.push(name.clone());
            }
        }

        Ok(outcome)
    }

    async fn revert(
        &self,
        db: &DbPool,
        steps: Option<usize>,
    ) -> Result<RevertOutcome, MigrationRevertError> {
        let db_name = pool_db_name(db);

        self.reverts.lock().await.push((db_name.clone(), steps));

        if self.fail_revert.contains(&db_name) {
            return Err(MigrationRevertError::Revert {
                name: "m1".to_string(),
                cause: DbErr::PoolClosed,
            });
        }

        let mut applied = self.applied.lock().await;
        let entry = applied.entry(db_name).or_default();

        let count = steps.unwrap_or(1).min(entry.len());
        let reverted_now = entry.split_off(entry.len() - count);

        Ok(RevertOutcome {
            reverted_now: reverted_now.into_iter().rev().collect(),
        })
    }

    async fn list_applied(&self, db: &DbPool) -> Result<Vec<String>, DbErr> {
        let db_name = pool_db_name(db);
        Ok(self
            .applied
            .lock()
            .await
            .get(&db_name)
            .cloned()
            .unwrap_or_default())
    }

    fn list_available(&self) -> Vec<String> {
        self.available.clone()
    }
}
