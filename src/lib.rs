//! Taskchain
//!
//! A dependency-chained asynchronous computation engine: express a unit of
//! work whose execution must wait on the completion of other, possibly
//! still-running, units of work, and run very large numbers of such chained
//! units over a bounded worker pool without dedicating one blocking thread
//! per pending chain.
//!
//! # Example
//!
//! ```no_run
//! use taskchain::engine::ChainScheduler;
//!
//! let scheduler = ChainScheduler::new();
//! let spawner = scheduler.handle();
//!
//! let fetch = scheduler.supply("fetch", |_cx| Ok(21));
//! let doubled = fetch.then_apply(&spawner, |n| Ok(n * 2));
//!
//! assert_eq!(doubled.wait().into_result(), Ok(42));
//! ```

#![doc(html_root_url = "https://docs.rs/taskchain")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod engine;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};

pub use engine::{
    ChainScheduler, ComputationHandle, ComputationTask, ComputeError, ComputeResult,
    DependencyStack, FireOutcome, SchedulerConfig, SchedulerHandle, TaskBuilder, TaskContext,
    TaskId,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "taskchain";
