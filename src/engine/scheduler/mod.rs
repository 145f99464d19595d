//! Task scheduler for dependency-chained computations
//!
//! The `ChainScheduler` multiplexes many pending computation tasks over a
//! bounded pool of worker threads. A task that is not ready does not pin a
//! worker: the scheduler arms a settle callback on the dependency blocking
//! it and moves on, re-enqueueing the task the moment that dependency
//! settles. Externally suspended tasks are re-checked on a tunable backoff
//! interval instead.

mod parked;

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::engine::task::{ComputationTask, FireOutcome, Runnable};

use parked::ParkedTasks;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads.
    pub num_workers: usize,
    /// Re-check interval for suspended tasks.
    ///
    /// Inherited from the original design's fixed 500 ms sleep, but kept
    /// only as a tunable: dependency readiness no longer polls at all.
    pub backoff_interval: Duration,
    /// How long an idle worker waits for work before re-checking parked
    /// tasks.
    pub idle_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let num_cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            num_workers: num_cpus,
            backoff_interval: Duration::from_millis(500),
            idle_timeout: Duration::from_millis(1),
        }
    }
}

/// Scheduler statistics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Total tasks submitted.
    pub tasks_scheduled: AtomicUsize,
    /// Total tasks whose body ran to settlement.
    pub tasks_fired: AtomicUsize,
    /// Subset of fired tasks that settled exceptionally.
    pub tasks_failed: AtomicUsize,
    /// Wakeups delivered by dependency settle callbacks.
    pub settle_wakes: AtomicUsize,
    /// Timed re-checks of suspended or contended tasks.
    pub backoff_requeues: AtomicUsize,
}

impl SchedulerStats {
    /// Record a submitted task.
    #[inline]
    pub fn record_scheduled(&self) {
        self.tasks_scheduled.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a fired task.
    #[inline]
    pub fn record_fired(&self, failed: bool) {
        self.tasks_fired.fetch_add(1, Ordering::SeqCst);
        if failed {
            self.tasks_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Record a settle-callback wakeup.
    #[inline]
    pub fn record_settle_wake(&self) {
        self.settle_wakes.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a timed re-check.
    #[inline]
    pub fn record_backoff_requeue(&self) {
        self.backoff_requeues.fetch_add(1, Ordering::SeqCst);
    }
}

struct SchedulerCore {
    tx: Sender<Arc<dyn Runnable>>,
    rx: Receiver<Arc<dyn Runnable>>,
    parked: ParkedTasks,
    running: AtomicBool,
    stats: SchedulerStats,
    backoff_interval: Duration,
}

impl SchedulerCore {
    /// First submission of a task.
    fn submit(&self, task: Arc<dyn Runnable>) {
        self.stats.record_scheduled();
        debug!(task = %task.task_id(), name = task.task_name(), "task spawned");
        self.enqueue(task);
    }

    /// Place a task into the run queue unless it is settled or already
    /// queued.
    fn enqueue(&self, task: Arc<dyn Runnable>) {
        if !self.running.load(Ordering::Acquire) || task.is_settled() {
            return;
        }
        if !task.mark_queued() {
            return;
        }
        let _ = self.tx.send(task);
    }

    /// Drive one task through a single fire attempt.
    fn drive(core: &Arc<Self>, task: Arc<dyn Runnable>) {
        task.clear_queued();
        match task.try_fire() {
            FireOutcome::Fired => {
                let failed = task.settled_exceptionally();
                core.stats.record_fired(failed);
                trace!(task = %task.task_id(), failed, "task fired");
            }
            FireOutcome::AlreadySettled => {}
            FireOutcome::Suspended | FireOutcome::Contended => {
                core.stats.record_backoff_requeue();
                core.parked
                    .park(task, Instant::now() + core.backoff_interval);
            }
            FireOutcome::NotReady(dep) => {
                let waker = Arc::clone(core);
                let waiting = Arc::clone(&task);
                let armed = dep.on_settle(Box::new(move || {
                    waker.stats.record_settle_wake();
                    waker.enqueue(waiting);
                }));
                if !armed {
                    // The dependency settled in the race window; the task
                    // is runnable right now.
                    core.enqueue(task);
                }
            }
        }
    }

    fn worker_loop(self: Arc<Self>, worker_id: usize, idle_timeout: Duration) {
        debug!(worker_id, "scheduler worker started");
        while self.running.load(Ordering::Acquire) {
            for task in self.parked.take_due(Instant::now()) {
                self.enqueue(task);
            }
            match self.rx.recv_timeout(idle_timeout) {
                Ok(task) => Self::drive(&self, task),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(worker_id, "scheduler worker stopped");
    }
}

/// Cooperative many-to-few scheduler for computation tasks.
///
/// N pending tasks are multiplexed over `num_workers` threads. A body that
/// never returns blocks its worker; there is no preemption.
pub struct ChainScheduler {
    config: SchedulerConfig,
    core: Arc<SchedulerCore>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for ChainScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainScheduler")
            .field("num_workers", &self.config.num_workers)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ChainScheduler {
    /// Create a scheduler with default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let (tx, rx) = unbounded();
        let core = Arc::new(SchedulerCore {
            tx,
            rx,
            parked: ParkedTasks::new(),
            running: AtomicBool::new(true),
            stats: SchedulerStats::default(),
            backoff_interval: config.backoff_interval,
        });

        let workers = (0..config.num_workers)
            .map(|worker_id| {
                let core = Arc::clone(&core);
                let idle_timeout = config.idle_timeout;
                thread::Builder::new()
                    .name(format!("chain-worker-{}", worker_id))
                    .spawn(move || core.worker_loop(worker_id, idle_timeout))
                    .expect("Failed to spawn worker thread")
            })
            .collect();

        Self {
            config,
            core,
            workers,
        }
    }

    /// Submit a task for execution.
    ///
    /// The task runs once its dependency stack drains top-down and it is
    /// not suspended; its outcome settles the task's handle.
    pub fn spawn<T: Send + 'static>(&self, task: Arc<ComputationTask<T>>) {
        self.core.submit(task);
    }

    /// A lightweight clonable spawner for use inside bodies and
    /// combinators.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            core: Arc::clone(&self.core),
        }
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &SchedulerStats {
        &self.core.stats
    }

    /// Get the number of workers.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Number of tasks currently parked for a timed re-check.
    #[inline]
    pub fn parked_tasks(&self) -> usize {
        self.core.parked.len()
    }

    /// Check if the scheduler is running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// Stop the workers and wait for them to finish.
    ///
    /// Pending tasks are dropped; their handles stay unsettled.
    pub fn shutdown(&mut self) {
        debug!("scheduler shutting down");
        self.core.running.store(false, Ordering::Release);
        for worker in self.workers.drain(..) {
            worker.join().expect("Worker thread panicked");
        }
    }
}

impl Default for ChainScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChainScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}

/// Clonable spawner detached from the scheduler's lifetime.
///
/// Holds the scheduler core alive; spawns are ignored after shutdown.
#[derive(Clone)]
pub struct SchedulerHandle {
    core: Arc<SchedulerCore>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("running", &self.core.running.load(Ordering::Acquire))
            .finish()
    }
}

impl SchedulerHandle {
    /// Submit a task for execution.
    pub fn spawn<T: Send + 'static>(&self, task: Arc<ComputationTask<T>>) {
        self.core.submit(task);
    }
}
