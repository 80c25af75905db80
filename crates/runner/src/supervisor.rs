use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use perfbench_domain::{TaskId, Transition};
use perfbench_task_store::TaskStore;

use crate::config::RunnerConfig;
use crate::monitor::Monitor;
use crate::spawn::{WorkerJob, WorkerSpawner};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("launch queue is full")]
    Full(WorkerJob),

    #[error("supervisor is shut down")]
    Closed(WorkerJob),

    #[error("launch claim belongs to another task")]
    Unclaimed(WorkerJob),
}

/// Task ids with a launch queued or being watched.
#[derive(Default)]
struct Claims(Mutex<HashSet<TaskId>>);

impl Claims {
    fn insert(&self, task_id: TaskId) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id)
    }

    fn remove(&self, task_id: TaskId) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&task_id);
    }
}

/// Exclusive right to launch one task. Released on drop, once the job is
/// rejected, dropped, or fully reconciled.
pub struct LaunchClaim {
    task_id: TaskId,
    claims: Arc<Claims>,
}

impl Drop for LaunchClaim {
    fn drop(&mut self) {
        self.claims.remove(self.task_id);
    }
}

impl std::fmt::Debug for LaunchClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LaunchClaim").field(&self.task_id).finish()
    }
}

/// A job waiting for a slot, holding its task's claim.
struct Queued {
    job: WorkerJob,
    claim: LaunchClaim,
}

/// Count of jobs queued or running, with a wakeup when it reaches zero.
#[derive(Default)]
struct Inflight {
    count: AtomicUsize,
    idle: Notify,
}

impl Inflight {
    fn enter(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn leave(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Bounded queue of launches served by a fixed number of watcher slots.
///
/// Each slot spawns one worker and runs its monitor to completion. Jobs
/// wait in the queue (their tasks still `pending`) until a slot frees up.
pub struct Supervisor {
    tx: mpsc::Sender<Queued>,
    slots: Arc<Semaphore>,
    inflight: Arc<Inflight>,
    claims: Arc<Claims>,
    shutdown: CancellationToken,
    dispatcher: JoinHandle<()>,
}

impl Supervisor {
    pub fn start(
        store: Arc<dyn TaskStore>,
        spawner: Arc<dyn WorkerSpawner>,
        config: &RunnerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let slots = Arc::new(Semaphore::new(config.max_concurrent_watchers.max(1)));
        let inflight = Arc::new(Inflight::default());
        let shutdown = CancellationToken::new();
        let monitor = Arc::new(Monitor::new(Arc::clone(&store), config));

        let dispatcher = tokio::spawn(dispatch(
            rx,
            Slots {
                slots: Arc::clone(&slots),
                inflight: Arc::clone(&inflight),
                store,
                spawner,
                monitor,
            },
            shutdown.clone(),
        ));

        Self {
            tx,
            slots,
            inflight,
            claims: Arc::new(Claims::default()),
            shutdown,
            dispatcher,
        }
    }

    /// Claim `task_id` for launching. `None` while another launch of the
    /// same task is queued or running.
    pub fn claim(&self, task_id: TaskId) -> Option<LaunchClaim> {
        self.claims.insert(task_id).then(|| LaunchClaim {
            task_id,
            claims: Arc::clone(&self.claims),
        })
    }

    /// Queue a launch without waiting. Fails fast when the queue is full.
    ///
    /// The claim is held until the job's monitor finishes; on error it is
    /// released with the returned job.
    pub fn submit(&self, job: WorkerJob, claim: LaunchClaim) -> Result<(), SubmitError> {
        if claim.task_id != job.task_id {
            return Err(SubmitError::Unclaimed(job));
        }
        self.inflight.enter();
        self.tx.try_send(Queued { job, claim }).map_err(|e| {
            self.inflight.leave();
            match e {
                mpsc::error::TrySendError::Full(q) => SubmitError::Full(q.job),
                mpsc::error::TrySendError::Closed(q) => SubmitError::Closed(q.job),
            }
        })
    }

    /// Watcher slots currently free.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Jobs queued or being watched.
    pub fn inflight(&self) -> usize {
        self.inflight.count.load(Ordering::Acquire)
    }

    /// Resolves once every queued and running job has reconciled.
    pub async fn drain(&self) {
        self.inflight.wait_idle().await;
    }

    /// Stop taking jobs and wait for running monitors to finish.
    ///
    /// Jobs still queued are dropped; their tasks stay `pending`.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.dispatcher.await {
            tracing::warn!(error = %e, "supervisor dispatcher ended abnormally");
        }
        self.inflight.wait_idle().await;
    }
}

/// Shared state every slot needs.
struct Slots {
    slots: Arc<Semaphore>,
    inflight: Arc<Inflight>,
    store: Arc<dyn TaskStore>,
    spawner: Arc<dyn WorkerSpawner>,
    monitor: Arc<Monitor>,
}

async fn dispatch(mut rx: mpsc::Receiver<Queued>, ctx: Slots, shutdown: CancellationToken) {
    loop {
        let queued = tokio::select! {
            () = shutdown.cancelled() => break,
            queued = rx.recv() => match queued {
                Some(queued) => queued,
                None => break,
            },
        };
        let permit = tokio::select! {
            () = shutdown.cancelled() => {
                drop_job(&ctx, queued);
                break;
            }
            permit = Arc::clone(&ctx.slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    drop_job(&ctx, queued);
                    break;
                }
            },
        };

        let store = Arc::clone(&ctx.store);
        let spawner = Arc::clone(&ctx.spawner);
        let monitor = Arc::clone(&ctx.monitor);
        let inflight = Arc::clone(&ctx.inflight);
        tokio::spawn(async move {
            let Queued { job, claim } = queued;
            run_slot(job, store, spawner, monitor).await;
            drop(claim);
            drop(permit);
            inflight.leave();
        });
    }

    rx.close();
    while let Ok(queued) = rx.try_recv() {
        drop_job(&ctx, queued);
    }
    tracing::debug!("supervisor dispatcher stopped");
}

fn drop_job(ctx: &Slots, queued: Queued) {
    tracing::warn!(task_id = %queued.job.task_id, "supervisor stopping; queued launch dropped");
    drop(queued);
    ctx.inflight.leave();
}

async fn run_slot(
    job: WorkerJob,
    store: Arc<dyn TaskStore>,
    spawner: Arc<dyn WorkerSpawner>,
    monitor: Arc<Monitor>,
) {
    let task_id = job.task_id;
    match spawner.spawn(&job).await {
        Ok(worker) => {
            monitor.watch(task_id, &job.outcome_path, worker).await;
        }
        Err(e) => {
            // Never reached running: this is a launch failure.
            let error = format!("failed to launch worker: {e}");
            tracing::error!(%task_id, %error, "launch failed");
            if let Err(e) = store.update_state(task_id, Transition::fail(error)).await {
                tracing::warn!(%task_id, error = %e, "failed to record launch failure");
            }
            if let Err(e) = std::fs::remove_file(&job.outcome_path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(%task_id, error = %e, "failed to remove outcome file");
            }
        }
    }
}
