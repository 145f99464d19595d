//! Chain combinators
//!
//! Build new computation tasks whose bodies consume the results of earlier
//! ones, allowing arbitrarily deep pipelines (submit → wait → post-process
//! → notify) without growing thread count. Each combinator gates the new
//! stage on the parent's handle, so the stage body only runs once the
//! parent has settled.
//!
//! Error policy: the engine itself treats a failed dependency as "done" for
//! readiness, so stage bodies always run; the combinators then propagate
//! the parent's error without invoking the user closure (except
//! [`when_complete`](ComputationTask::when_complete) and
//! [`exceptionally`](ComputationTask::exceptionally), which exist to
//! observe or recover from it).

use std::sync::Arc;

use super::error::ComputeError;
use super::handle::ComputationHandle;
use super::result::ComputeResult;
use super::scheduler::{ChainScheduler, SchedulerHandle};
use super::task::{ComputationTask, TaskBuilder, TaskContext};

impl ChainScheduler {
    /// Create and spawn a task with no dependencies.
    pub fn supply<T, F>(&self, name: impl Into<String>, body: F) -> Arc<ComputationTask<T>>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T, ComputeError> + Send + 'static,
    {
        self.handle().supply(name, body)
    }
}

impl SchedulerHandle {
    /// Create and spawn a task with no dependencies.
    pub fn supply<T, F>(&self, name: impl Into<String>, body: F) -> Arc<ComputationTask<T>>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T, ComputeError> + Send + 'static,
    {
        let task = TaskBuilder::new().name(name).body(body);
        self.spawn(task.clone());
        task
    }
}

impl<T: Clone + Send + 'static> ComputationTask<T> {
    /// Spawn a stage that applies `f` to this task's value.
    ///
    /// A parent error is propagated to the new stage without calling `f`.
    pub fn then_apply<U, F>(
        &self,
        scheduler: &SchedulerHandle,
        f: F,
    ) -> Arc<ComputationTask<U>>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, ComputeError> + Send + 'static,
    {
        let parent = self.handle();
        let next = TaskBuilder::new()
            .name(format!("{}.then_apply", self.name()))
            .dependency(parent.as_dependency())
            .body(move |_cx| match parent.wait().into_result() {
                Ok(value) => f(value),
                Err(err) => Err(err),
            });
        scheduler.spawn(next.clone());
        next
    }

    /// Spawn a stage whose body produces a whole further computation.
    ///
    /// `f` builds the inner task from the parent's value; the inner task is
    /// spawned when the stage runs and its eventual result is relayed into
    /// the returned handle. This is how a body "discovers" a sub-dependency
    /// mid-pipeline without suspending mid-closure.
    pub fn then_compose<U, F>(
        &self,
        scheduler: &SchedulerHandle,
        f: F,
    ) -> ComputationHandle<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Arc<ComputationTask<U>> + Send + 'static,
    {
        let parent = self.handle();
        let out = ComputationHandle::new();
        let relay = out.clone();
        let inner_spawner = scheduler.clone();
        let stage = TaskBuilder::new()
            .name(format!("{}.then_compose", self.name()))
            .dependency(parent.as_dependency())
            .body(move |_cx| {
                match parent.wait().into_result() {
                    Ok(value) => {
                        let inner = f(value);
                        inner_spawner.spawn(inner.clone());
                        let source = inner.handle();
                        let target = relay.clone();
                        let callback_source = source.clone();
                        let armed = source.on_settle(Box::new(move || {
                            callback_source.forward_into(&target);
                        }));
                        if !armed {
                            source.forward_into(&relay);
                        }
                    }
                    Err(err) => {
                        relay.complete_exceptionally(err);
                    }
                }
                Ok(())
            });
        scheduler.spawn(stage);
        out
    }

    /// Spawn a stage combining this task's value with another's.
    pub fn then_combine<U, V, F>(
        &self,
        scheduler: &SchedulerHandle,
        other: &ComputationTask<U>,
        f: F,
    ) -> Arc<ComputationTask<V>>
    where
        U: Clone + Send + 'static,
        V: Send + 'static,
        F: FnOnce(T, U) -> Result<V, ComputeError> + Send + 'static,
    {
        let left = self.handle();
        let right = other.handle();
        let next = TaskBuilder::new()
            .name(format!("{}.then_combine", self.name()))
            .dependency(left.as_dependency())
            .dependency(right.as_dependency())
            .body(move |_cx| {
                let left = left.wait().into_result()?;
                let right = right.wait().into_result()?;
                f(left, right)
            });
        scheduler.spawn(next.clone());
        next
    }

    /// Spawn a stage that observes this task's result, value or error,
    /// and passes it through unchanged.
    pub fn when_complete<F>(
        &self,
        scheduler: &SchedulerHandle,
        f: F,
    ) -> Arc<ComputationTask<T>>
    where
        F: FnOnce(&ComputeResult<T>) + Send + 'static,
    {
        let parent = self.handle();
        let next = TaskBuilder::new()
            .name(format!("{}.when_complete", self.name()))
            .dependency(parent.as_dependency())
            .body(move |_cx| {
                let result = parent.wait();
                f(&result);
                result.into_result()
            });
        scheduler.spawn(next.clone());
        next
    }

    /// Spawn a stage that recovers from a parent error.
    ///
    /// A parent value passes through untouched; a parent error is handed to
    /// `f`, which may substitute a value or a different error.
    pub fn exceptionally<F>(
        &self,
        scheduler: &SchedulerHandle,
        f: F,
    ) -> Arc<ComputationTask<T>>
    where
        F: FnOnce(ComputeError) -> Result<T, ComputeError> + Send + 'static,
    {
        let parent = self.handle();
        let next = TaskBuilder::new()
            .name(format!("{}.exceptionally", self.name()))
            .dependency(parent.as_dependency())
            .body(move |_cx| match parent.wait().into_result() {
                Ok(value) => Ok(value),
                Err(err) => f(err),
            });
        scheduler.spawn(next.clone());
        next
    }
}
