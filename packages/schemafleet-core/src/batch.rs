//! Batch fan-out of per-tenant migration jobs
//!
//! One job per tenant, executed by a bounded pool of workers inside a
//! spawned driver task. Workers share nothing except the batch state:
//! atomic counters, the cancellation flag, and the per-job status list.
//! Each job owns its tenant's pool for the duration of the job, so
//! rebinding across jobs never races.

use crate::{
    connector::TenantConnector,
    executor::{TenantJobError, migrate_tenant, rollback_tenant},
    selector::TenantTarget,
};
use futures::StreamExt;
use schemafleet_database::models::{TenantRoute, tenant::TenantId};
use schemafleet_runner::MigrationRunner;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

pub type BatchId = Uuid;

/// The operation a batch runs against every tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    /// Apply all pending migrations
    Apply,
    /// Revert migrations; `steps` omitted reverts the most recent run
    Revert { steps: Option<usize> },
}

/// State of one tenant's job within a batch
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum JobStatus {
    /// Not started. Jobs skipped by cancellation stay pending and
    /// never connect to their tenant.
    Pending,
    Running,
    Succeeded {
        /// Names of the migrations applied or reverted
        migrations: Vec<String>,
    },
    Failed {
        message: String,
    },
}

/// Tuning for a batch dispatch
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of parallel workers
    pub workers: usize,
    /// When false (the default) the first job failure prevents any job
    /// that has not yet started from starting
    pub allow_failures: bool,
    /// Wall clock ceiling per job, after which the job counts as failed
    pub job_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            allow_failures: false,
            job_timeout: Duration::from_secs(60 * 15),
        }
    }
}

/// Shared mutable state of a running batch. The counters and flags use
/// atomics; the status and succeeded lists sit behind a mutex.
struct BatchState {
    processed: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicBool,
    finished: AtomicBool,
    jobs: Mutex<Vec<JobStatus>>,
    /// Identities of the tenants whose job succeeded, in completion
    /// order. Compensation reverts exactly this set.
    succeeded: Mutex<Vec<TenantId>>,
}

impl BatchState {
    fn new(total: usize) -> Self {
        Self {
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            jobs: Mutex::new(vec![JobStatus::Pending; total]),
            succeeded: Mutex::new(Vec::new()),
        }
    }

    async fn set_job(&self, index: usize, status: JobStatus) {
        self.jobs.lock().await[index] = status;
    }
}

/// Point in time view of a batch
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub processed: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub finished: bool,
    pub jobs: Vec<(TenantTarget, JobStatus)>,
}

/// Handle to a dispatched batch of per-tenant jobs
pub struct MigrationBatch {
    id: BatchId,
    name: String,
    op: BatchOp,
    routes: Vec<TenantRoute>,
    state: Arc<BatchState>,
    finished_rx: watch::Receiver<bool>,
}

impl MigrationBatch {
    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> BatchOp {
        self.op
    }

    /// Total number of jobs in the batch
    pub fn total(&self) -> usize {
        self.routes.len()
    }

    /// Request cooperative cancellation: jobs that have not yet started
    /// will not start, jobs already connected run to completion
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Current view of the batch state
    pub async fn snapshot(&self) -> BatchSnapshot {
        let jobs = self.state.jobs.lock().await;

        BatchSnapshot {
            processed: self.state.processed.load(Ordering::Acquire),
            failed: self.state.failed.load(Ordering::Acquire),
            cancelled: self.state.cancelled.load(Ordering::Acquire),
            finished: self.state.finished.load(Ordering::Acquire),
            jobs: self
                .routes
                .iter()
                .map(TenantTarget::from)
                .zip(jobs.iter().cloned())
                .collect(),
        }
    }

    /// Routes of the tenants whose job succeeded, in input order
    pub async fn succeeded_routes(&self) -> Vec<TenantRoute> {
        let succeeded = self.state.succeeded.lock().await;

        self.routes
            .iter()
            .filter(|route| succeeded.contains(&route.tenant.id))
            .cloned()
            .collect()
    }

    /// Wait until every dispatched job has either finished or been
    /// skipped by cancellation
    pub async fn wait(&self) {
        let mut rx = self.finished_rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Dispatch one job per tenant, driven by `config.workers` parallel
/// workers, and return a handle to the running batch
pub fn dispatch_batch<C: TenantConnector, R: MigrationRunner>(
    connector: Arc<C>,
    runner: Arc<R>,
    name: impl Into<String>,
    op: BatchOp,
    routes: Vec<TenantRoute>,
    config: BatchConfig,
) -> MigrationBatch {
    let id = Uuid::new_v4();
    let name = name.into();
    let state = Arc::new(BatchState::new(routes.len()));
    let (finished_tx, finished_rx) = watch::channel(false);

    tracing::info!(
        batch = %name,
        %id,
        tenants = routes.len(),
        workers = config.workers,
        "dispatching batch",
    );

    let driver_state = state.clone();
    let driver_routes = routes.clone();
    tokio::spawn(async move {
        futures::stream::iter(driver_routes.into_iter().enumerate())
            .map(|(index, route)| {
                let connector = connector.clone();
                let runner = runner.clone();
                let state = driver_state.clone();
                let config = config.clone();

                run_job(state, connector, runner, op, index, route, config)
            })
            .buffer_unordered(config.workers.max(1))
            .collect::<Vec<()>>()
            .await;

        driver_state.finished.store(true, Ordering::Release);
        _ = finished_tx.send(true);
    });

    MigrationBatch {
        id,
        name,
        op,
        routes,
        state,
        finished_rx,
    }
}

/// Execute one tenant's job, recording the result in the batch state
async fn run_job<C: TenantConnector, R: MigrationRunner>(
    state: Arc<BatchState>,
    connector: Arc<C>,
    runner: Arc<R>,
    op: BatchOp,
    index: usize,
    route: TenantRoute,
    config: BatchConfig,
) {
    // Cancelled batches start no further work. The job exits before
    // any connection to the tenant is made.
    if state.cancelled.load(Ordering::Acquire) {
        tracing::debug!(tenant = %route.tenant.base, "batch cancelled, skipping job");
        return;
    }

    state.set_job(index, JobStatus::Running).await;

    let result = match tokio::time::timeout(
        config.job_timeout,
        execute_op(&*connector, &*runner, op, &route),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(TenantJobError::TimedOut(config.job_timeout)),
    };

    match result {
        Ok(migrations) => {
            state.succeeded.lock().await.push(route.tenant.id);
            state
                .set_job(index, JobStatus::Succeeded { migrations })
                .await;
            state.processed.fetch_add(1, Ordering::AcqRel);
        }
        Err(error) => {
            tracing::error!(tenant = %route.tenant.base, ?error, "tenant job failed");

            state
                .set_job(
                    index,
                    JobStatus::Failed {
                        message: error.to_string(),
                    },
                )
                .await;
            state.failed.fetch_add(1, Ordering::AcqRel);
            state.processed.fetch_add(1, Ordering::AcqRel);

            if !config.allow_failures {
                state.cancelled.store(true, Ordering::Release);
            }
        }
    }
}

async fn execute_op<C: TenantConnector, R: MigrationRunner>(
    connector: &C,
    runner: &R,
    op: BatchOp,
    route: &TenantRoute,
) -> Result<Vec<String>, TenantJobError> {
    match op {
        BatchOp::Apply => migrate_tenant(connector, runner, route)
            .await
            .map(|outcome| outcome.applied_now),
        BatchOp::Revert { steps } => rollback_tenant(connector, runner, route, steps)
            .await
            .map(|outcome| outcome.reverted_now),
    }
}
