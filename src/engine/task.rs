//! Computation tasks
//!
//! A task composes one dependency stack, one body closure, and one output
//! handle, and drives them through the readiness/suspend/run state machine.
//! `try_fire` is a single non-blocking attempt; the scheduler supplies the
//! re-check discipline, so there is no sleeping inside the driver.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::error::ComputeError;
use super::handle::{ComputationHandle, Dependency};
use super::result::ComputeResult;
use super::stack::DependencyStack;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Thread-safe generator of task identifiers.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: AtomicUsize,
}

impl TaskIdGenerator {
    /// Create a generator starting at zero.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next task ID.
    #[inline]
    pub fn generate(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

static TASK_IDS: Lazy<TaskIdGenerator> = Lazy::new(TaskIdGenerator::new);

/// Task lifecycle state.
///
/// The suspended flag is orthogonal to this and may toggle any number of
/// times before the task settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, body not yet invoked.
    Created,
    /// Body currently executing.
    Running,
    /// Terminal: output handle settled with a value or an error.
    Settled,
}

impl TaskState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            1 => TaskState::Running,
            2 => TaskState::Settled,
            _ => TaskState::Created,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskState::Created => 0,
            TaskState::Running => 1,
            TaskState::Settled => 2,
        }
    }
}

/// Outcome of a single `try_fire` attempt.
pub enum FireOutcome {
    /// The body ran and the task settled.
    Fired,
    /// The task had already settled; nothing to do.
    AlreadySettled,
    /// The task is externally suspended and must not advance.
    Suspended,
    /// The top of the dependency stack has not settled yet; the carried
    /// probe is the dependency currently blocking progress.
    NotReady(Arc<dyn Dependency>),
    /// Another thread is mid-fire on this task.
    Contended,
}

impl std::fmt::Debug for FireOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FireOutcome::Fired => write!(f, "Fired"),
            FireOutcome::AlreadySettled => write!(f, "AlreadySettled"),
            FireOutcome::Suspended => write!(f, "Suspended"),
            FireOutcome::NotReady(dep) => f
                .debug_struct("NotReady")
                .field("dependency_done", &dep.is_done())
                .finish(),
            FireOutcome::Contended => write!(f, "Contended"),
        }
    }
}

/// Execution context handed to a body closure.
#[derive(Debug, Clone)]
pub struct TaskContext {
    id: TaskId,
    name: String,
}

impl TaskContext {
    /// Identifier of the task running this body.
    #[inline]
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Name of the task running this body.
    #[inline]
    pub fn task_name(&self) -> &str {
        &self.name
    }
}

type TaskBody<T> = Box<dyn FnOnce(&TaskContext) -> Result<T, ComputeError> + Send>;

/// The unit combining a dependency stack, a body, and an output handle.
pub struct ComputationTask<T> {
    id: TaskId,
    name: String,
    state: AtomicU8,
    /// Externally toggled pause, independent of dependency readiness.
    suspended: AtomicBool,
    /// Guards the single-consumer side of the stack and the body take.
    firing: AtomicBool,
    /// Scheduler bookkeeping: task currently sitting in the run queue.
    queued: AtomicBool,
    deps: DependencyStack,
    body: Mutex<Option<TaskBody<T>>>,
    handle: ComputationHandle<T>,
}

impl<T: Send + 'static> std::fmt::Debug for ComputationTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputationTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

impl<T: Send + 'static> ComputationTask<T> {
    /// Create a task with no initial dependencies.
    pub fn new<F>(body: F) -> Arc<Self>
    where
        F: FnOnce(&TaskContext) -> Result<T, ComputeError> + Send + 'static,
    {
        TaskBuilder::new().body(body)
    }

    /// Create a task gated on an optional initial dependency.
    ///
    /// `None` is the no-dependency sentinel and is ignored.
    pub fn with_dependency<F>(dep: Option<Arc<dyn Dependency>>, body: F) -> Arc<Self>
    where
        F: FnOnce(&TaskContext) -> Result<T, ComputeError> + Send + 'static,
    {
        let mut builder = TaskBuilder::new();
        if let Some(dep) = dep {
            builder = builder.dependency(dep);
        }
        builder.body(body)
    }

    /// Create a task already settled with a value. It has no body to run.
    pub fn completed(value: T) -> Arc<Self> {
        let task = Self::bare(TaskBuilder::new());
        task.handle.complete(value);
        task.state.store(TaskState::Settled.as_u8(), Ordering::SeqCst);
        task
    }

    /// Create a task already settled with an error.
    pub fn failed(err: ComputeError) -> Arc<Self> {
        let task = Self::bare(TaskBuilder::new());
        task.handle.complete_exceptionally(err);
        task.state.store(TaskState::Settled.as_u8(), Ordering::SeqCst);
        task
    }

    fn bare(builder: TaskBuilder) -> Arc<Self> {
        let id = TASK_IDS.generate();
        let name = builder.name.unwrap_or_else(|| format!("Task({})", id.inner()));
        let deps = DependencyStack::new();
        for dep in builder.deps {
            deps.push(dep);
        }
        Arc::new(Self {
            id,
            name,
            state: AtomicU8::new(TaskState::Created.as_u8()),
            suspended: AtomicBool::new(false),
            firing: AtomicBool::new(false),
            queued: AtomicBool::new(false),
            deps,
            body: Mutex::new(None),
            handle: ComputationHandle::new(),
        })
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current lifecycle state.
    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The task's output handle.
    #[inline]
    pub fn handle(&self) -> ComputationHandle<T> {
        self.handle.clone()
    }

    /// Push a dependency the task must wait on before running its body.
    ///
    /// Safe to call from any producer thread, including while the task is
    /// already pending on other dependencies.
    pub fn push_dependency(&self, dep: Arc<dyn Dependency>) {
        self.deps.push(dep);
    }

    /// Push an optional dependency; `None` is ignored.
    pub fn push_optional_dependency(&self, dep: Option<Arc<dyn Dependency>>) {
        self.deps.push_optional(dep);
    }

    /// Pause the task irrespective of dependency readiness.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    /// Allow a suspended task to advance again.
    pub fn resume(&self) {
        self.suspended.store(false, Ordering::SeqCst);
    }

    /// Whether the task is externally suspended.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Whether the output handle has settled.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// Whether the output handle settled exceptionally.
    pub fn is_completed_exceptionally(&self) -> bool {
        self.handle.is_completed_exceptionally()
    }

    /// One non-blocking attempt to advance the state machine.
    ///
    /// Ready and not suspended: the body runs exactly once and its outcome
    /// settles the handle. Suspended wins over not-ready, matching the
    /// driver's check order. `NotReady` carries the pending dependency left
    /// at the top of the stack after settled tops drain, so the scheduler
    /// can arm a settle wakeup on it.
    pub fn try_fire(&self) -> FireOutcome {
        if self.handle.is_done() {
            self.state.store(TaskState::Settled.as_u8(), Ordering::SeqCst);
            return FireOutcome::AlreadySettled;
        }
        // Enforce the single-consumer contract of the dependency stack:
        // only one thread at a time may drain or peek it.
        if self.firing.swap(true, Ordering::Acquire) {
            return FireOutcome::Contended;
        }
        let outcome = self.fire_locked();
        self.firing.store(false, Ordering::Release);
        outcome
    }

    fn fire_locked(&self) -> FireOutcome {
        if self.is_suspended() {
            return FireOutcome::Suspended;
        }
        match self.deps.blocking() {
            Some(dep) => FireOutcome::NotReady(dep),
            None => {
                self.run_body();
                FireOutcome::Fired
            }
        }
    }

    fn run_body(&self) {
        let body = self.body.lock().take();
        match body {
            None => {
                self.handle
                    .complete_exceptionally(ComputeError::MissingBody);
            }
            Some(body) => {
                self.state.store(TaskState::Running.as_u8(), Ordering::SeqCst);
                let cx = TaskContext {
                    id: self.id,
                    name: self.name.clone(),
                };
                match catch_unwind(AssertUnwindSafe(|| body(&cx))) {
                    Ok(Ok(value)) => {
                        self.handle.complete(value);
                    }
                    Ok(Err(err)) => {
                        self.handle.complete_exceptionally(err);
                    }
                    Err(payload) => {
                        self.handle
                            .complete_exceptionally(ComputeError::Panicked(panic_message(&*payload)));
                    }
                }
            }
        }
        self.state.store(TaskState::Settled.as_u8(), Ordering::SeqCst);
    }
}

impl<T: Clone + Send + 'static> ComputationTask<T> {
    /// Block until the task settles and return its result.
    pub fn wait(&self) -> ComputeResult<T> {
        self.handle.wait()
    }

    /// Block until the task settles or the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ComputeResult<T>> {
        self.handle.wait_timeout(timeout)
    }

    /// Non-blocking snapshot of the result, if settled.
    pub fn result(&self) -> Option<ComputeResult<T>> {
        self.handle.result()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Builder for computation tasks.
#[derive(Default)]
pub struct TaskBuilder {
    name: Option<String>,
    deps: Vec<Arc<dyn Dependency>>,
}

impl TaskBuilder {
    /// Create a new task builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task name.
    #[inline]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an initial dependency.
    #[inline]
    pub fn dependency(mut self, dep: Arc<dyn Dependency>) -> Self {
        self.deps.push(dep);
        self
    }

    /// Add an optional initial dependency; `None` is ignored.
    #[inline]
    pub fn optional_dependency(mut self, dep: Option<Arc<dyn Dependency>>) -> Self {
        if let Some(dep) = dep {
            self.deps.push(dep);
        }
        self
    }

    /// Install the body and build the task.
    pub fn body<T, F>(self, body: F) -> Arc<ComputationTask<T>>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T, ComputeError> + Send + 'static,
    {
        let task = ComputationTask::bare(self);
        *task.body.lock() = Some(Box::new(body));
        task
    }
}

/// Type-erased driver interface the scheduler multiplexes over.
pub(crate) trait Runnable: Send + Sync {
    fn try_fire(&self) -> FireOutcome;
    fn is_settled(&self) -> bool;
    fn settled_exceptionally(&self) -> bool;
    /// Claim the task's slot in the run queue. Returns `false` when the
    /// task is already queued.
    fn mark_queued(&self) -> bool;
    fn clear_queued(&self);
    fn task_id(&self) -> TaskId;
    fn task_name(&self) -> &str;
}

impl<T: Send + 'static> Runnable for ComputationTask<T> {
    fn try_fire(&self) -> FireOutcome {
        ComputationTask::try_fire(self)
    }

    fn is_settled(&self) -> bool {
        self.handle.is_done()
    }

    fn settled_exceptionally(&self) -> bool {
        self.handle.is_completed_exceptionally()
    }

    fn mark_queued(&self) -> bool {
        self.queued
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn clear_queued(&self) {
        self.queued.store(false, Ordering::Release);
    }

    fn task_id(&self) -> TaskId {
        self.id
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
