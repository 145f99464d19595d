//! Computation handles
//!
//! A handle is a single-settlement container for a result that will
//! eventually exist. It transitions `pending → settled` exactly once;
//! `is_done` is monotonic and never reverts. Blocked waiters are woken
//! through a condvar, and dependents can register settle callbacks so the
//! scheduler never has to poll a pending handle.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::error::ComputeError;
use super::result::ComputeResult;

/// Callback invoked once when a handle settles.
pub type SettleCallback = Box<dyn FnOnce() + Send>;

/// Type-erased readiness probe over a computation handle.
///
/// Dependency stacks store these so that handles with different output
/// types can gate the same task.
pub trait Dependency: Send + Sync {
    /// Whether the underlying handle has settled (value or error).
    fn is_done(&self) -> bool;

    /// Whether the underlying handle settled exceptionally.
    ///
    /// Only meaningful once `is_done` returns true.
    fn is_failed(&self) -> bool;

    /// Register a callback fired when the handle settles.
    ///
    /// Returns `false` when the handle had already settled; the callback is
    /// dropped in that case and the caller must act immediately instead.
    fn on_settle(&self, callback: SettleCallback) -> bool;
}

struct HandleState<T> {
    result: Option<ComputeResult<T>>,
    watchers: Vec<SettleCallback>,
}

struct HandleInner<T> {
    state: Mutex<HandleState<T>>,
    settled: Condvar,
    /// Monotonic fast path for `is_done`.
    done: AtomicBool,
}

/// Single-settlement asynchronous result container.
///
/// Clones share the same underlying slot; any clone may settle it and every
/// clone observes the same result.
pub struct ComputationHandle<T> {
    inner: Arc<HandleInner<T>>,
}

impl<T> Clone for ComputationHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ComputationHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputationHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T> Default for ComputationHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComputationHandle<T> {
    /// Create a pending handle.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: Mutex::new(HandleState {
                    result: None,
                    watchers: Vec::new(),
                }),
                settled: Condvar::new(),
                done: AtomicBool::new(false),
            }),
        }
    }

    /// Create a handle already settled with a value.
    pub fn completed(value: T) -> Self {
        let handle = Self::new();
        handle.complete(value);
        handle
    }

    /// Create a handle already settled with an error.
    pub fn failed(err: ComputeError) -> Self {
        let handle = Self::new();
        handle.complete_exceptionally(err);
        handle
    }

    /// Settle with a value.
    ///
    /// Returns `true` if this call performed the settlement; a second
    /// settlement attempt is a no-op that returns `false`.
    pub fn complete(&self, value: T) -> bool {
        self.settle(ComputeResult::Value(value))
    }

    /// Settle exceptionally.
    ///
    /// Same idempotence contract as [`complete`](Self::complete).
    pub fn complete_exceptionally(&self, err: ComputeError) -> bool {
        self.settle(ComputeResult::Error(err))
    }

    /// Settle with an already-built result.
    pub fn settle(&self, result: ComputeResult<T>) -> bool {
        let watchers = {
            let mut state = self.inner.state.lock();
            if state.result.is_some() {
                return false;
            }
            state.result = Some(result);
            self.inner.done.store(true, Ordering::Release);
            self.inner.settled.notify_all();
            std::mem::take(&mut state.watchers)
        };
        for watcher in watchers {
            watcher();
        }
        true
    }

    /// Non-blocking, monotonic settlement query.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// Whether the handle settled exceptionally. Only meaningful once done.
    pub fn is_completed_exceptionally(&self) -> bool {
        self.inner
            .state
            .lock()
            .result
            .as_ref()
            .is_some_and(ComputeResult::is_error)
    }

    /// Register a callback fired exactly once when the handle settles.
    ///
    /// Returns `false` if the handle was already settled; the callback is
    /// dropped and the caller should act immediately.
    pub fn on_settle(&self, callback: SettleCallback) -> bool {
        let mut state = self.inner.state.lock();
        if state.result.is_some() {
            return false;
        }
        state.watchers.push(callback);
        true
    }
}

impl<T: Clone> ComputationHandle<T> {
    /// Block the calling thread until settlement, then return the result.
    pub fn wait(&self) -> ComputeResult<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(result) = state.result.clone() {
                return result;
            }
            self.inner.settled.wait(&mut state);
        }
    }

    /// Block until settlement and unwrap into a `Result`.
    pub fn wait_value(&self) -> Result<T, ComputeError> {
        self.wait().into_result()
    }

    /// Block until settlement or until the timeout elapses.
    ///
    /// Timing out surfaces only to this caller; it does not settle the
    /// handle.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ComputeResult<T>> {
        let mut state = self.inner.state.lock();
        while state.result.is_none() {
            if self.inner.settled.wait_for(&mut state, timeout).timed_out() {
                return state.result.clone();
            }
        }
        state.result.clone()
    }

    /// Non-blocking snapshot of the result, if settled.
    pub fn result(&self) -> Option<ComputeResult<T>> {
        self.inner.state.lock().result.clone()
    }

    /// Copy this handle's result into `target` once both exist.
    ///
    /// Used by chain combinators to relay an inner computation's outcome to
    /// an outer handle. A no-op when this handle is still pending or the
    /// target is already settled.
    pub fn forward_into(&self, target: &ComputationHandle<T>) {
        if let Some(result) = self.result() {
            target.settle(result);
        }
    }
}

impl<T: Send> Dependency for ComputationHandle<T> {
    fn is_done(&self) -> bool {
        ComputationHandle::is_done(self)
    }

    fn is_failed(&self) -> bool {
        self.is_completed_exceptionally()
    }

    fn on_settle(&self, callback: SettleCallback) -> bool {
        ComputationHandle::on_settle(self, callback)
    }
}

impl<T: Send + 'static> ComputationHandle<T> {
    /// Type-erased view of this handle for use in a dependency stack.
    pub fn as_dependency(&self) -> Arc<dyn Dependency> {
        Arc::new(self.clone())
    }
}
