//! Dependency-chained computation engine
//!
//! This module contains the in-process scheduling primitive: units of work
//! whose execution waits on the completion of other, possibly still-running
//! units, run in large numbers over a bounded worker pool.
//!
//! # Architecture
//!
//! The engine is organized as follows, leaves first:
//!
//! - [`ComputeResult`](result::ComputeResult) - Immutable value-or-error
//!   outcome, written exactly once
//! - [`ComputeError`](error::ComputeError) - Failure taxonomy carried by
//!   exceptional settlements
//! - [`ComputationHandle`](handle::ComputationHandle) - Single-settlement
//!   asynchronous result container
//! - [`DependencyStack`](stack::DependencyStack) - Lock-free, top-first
//!   prerequisite tracker
//! - [`ComputationTask`](task::ComputationTask) - The readiness/suspend/run
//!   state machine
//! - [`ChainScheduler`](scheduler::ChainScheduler) - Worker pool
//!   multiplexing many tasks with settle-notification wakeups
//! - Chain combinators ([`combinator`]) - Pipeline builders over tasks

pub mod combinator;
pub mod error;
pub mod handle;
pub mod result;
pub mod scheduler;
pub mod stack;
pub mod task;

pub use error::ComputeError;
pub use handle::{ComputationHandle, Dependency, SettleCallback};
pub use result::ComputeResult;
pub use scheduler::{ChainScheduler, SchedulerConfig, SchedulerHandle, SchedulerStats};
pub use stack::DependencyStack;
pub use task::{
    ComputationTask, FireOutcome, TaskBuilder, TaskContext, TaskId, TaskIdGenerator, TaskState,
};

#[cfg(test)]
mod tests;
