//! Dependency stacks
//!
//! A lock-free multi-producer/single-consumer stack of dependency probes.
//! Any number of producer threads may push concurrently; pop and peek are
//! reserved for the single task that owns the stack. Insertion order is
//! significant: the last pushed dependency is the first required to
//! resolve, and readiness drains the stack strictly top-down.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use super::handle::Dependency;

struct Node {
    dep: Arc<dyn Dependency>,
    next: *mut Node,
}

/// Ordered, top-first prerequisite tracker for a task.
///
/// The head pointer is updated with compare-and-swap so pushes never block.
/// Only the producer side (`push`, `push_optional`) is public; the consumer
/// side stays crate-internal, where the owning task serializes it. Nodes
/// are freed only by that single consumer, which is what makes the
/// unguarded reads in `top` and `pop` sound.
pub struct DependencyStack {
    head: AtomicPtr<Node>,
}

// Producers only CAS the head pointer; dereferencing and freeing nodes is
// restricted to the single consumer.
unsafe impl Send for DependencyStack {}
unsafe impl Sync for DependencyStack {}

impl DependencyStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Push a dependency onto the head. Safe to call from any thread.
    pub fn push(&self, dep: Arc<dyn Dependency>) {
        let node = Box::into_raw(Box::new(Node {
            dep,
            next: ptr::null_mut(),
        }));
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe { (*node).next = head };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Push a dependency, treating `None` as the no-dependency sentinel.
    ///
    /// Chain combinators pass `None` when a stage has nothing to wait on;
    /// the stack ignores it.
    pub fn push_optional(&self, dep: Option<Arc<dyn Dependency>>) {
        if let Some(dep) = dep {
            self.push(dep);
        }
    }

    /// Peek the head dependency without removing it.
    ///
    /// Single-consumer only: must not race with `pop` from another thread.
    pub(crate) fn top(&self) -> Option<Arc<dyn Dependency>> {
        let head = self.head.load(Ordering::Acquire);
        if head.is_null() {
            None
        } else {
            Some(unsafe { (*head).dep.clone() })
        }
    }

    /// Pop the head dependency. Single-consumer only.
    ///
    /// The CAS loop is still required here because producers may move the
    /// head concurrently with the pop.
    pub(crate) fn pop(&self) -> Option<Arc<dyn Dependency>> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            if head.is_null() {
                return None;
            }
            let next = unsafe { (*head).next };
            match self
                .head
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let node = unsafe { Box::from_raw(head) };
                    return Some(node.dep);
                }
                Err(current) => head = current,
            }
        }
    }

    /// Drain settled dependencies top-down and return the one gating
    /// readiness, or `None` once the stack has drained empty.
    ///
    /// A settled head is popped and the new head checked, so repeated calls
    /// drain the whole stack from the top. Only `is_done` is tested: a
    /// failed dependency counts the same as a succeeded one.
    /// Single-consumer only.
    pub(crate) fn blocking(&self) -> Option<Arc<dyn Dependency>> {
        loop {
            let dep = self.top()?;
            if dep.is_done() {
                self.pop();
            } else {
                return Some(dep);
            }
        }
    }

    /// Whether the stack drains empty right now. Single-consumer only.
    pub(crate) fn is_ready(&self) -> bool {
        self.blocking().is_none()
    }

    /// Whether the stack currently holds no dependencies.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Remove every dependency. Single-consumer only.
    pub(crate) fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl Default for DependencyStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DependencyStack {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for DependencyStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyStack")
            .field("empty", &self.is_empty())
            .finish()
    }
}
