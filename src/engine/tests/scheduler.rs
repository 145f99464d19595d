//! ChainScheduler unit tests

use crate::engine::handle::ComputationHandle;
use crate::engine::scheduler::{ChainScheduler, SchedulerConfig};
use crate::engine::task::{ComputationTask, TaskBuilder};
use crate::engine::{ComputeError, ComputeResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        num_workers: 2,
        backoff_interval: Duration::from_millis(10),
        idle_timeout: Duration::from_millis(1),
    }
}

#[test]
fn test_scheduler_creation() {
    let scheduler = ChainScheduler::new();
    assert!(scheduler.is_running());
    assert!(scheduler.num_workers() > 0);
}

#[test]
fn test_spawn_runs_ready_task() {
    let scheduler = ChainScheduler::with_config(fast_config());
    let task = ComputationTask::new(|_cx| Ok(11));

    scheduler.spawn(task.clone());

    assert_eq!(
        task.wait_timeout(SETTLE_TIMEOUT),
        Some(ComputeResult::Value(11))
    );
    assert_eq!(scheduler.stats().tasks_scheduled.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dependency_settlement_wakes_task() {
    let scheduler = ChainScheduler::with_config(fast_config());
    let gate: ComputationHandle<i32> = ComputationHandle::new();

    let seen = gate.clone();
    let task = TaskBuilder::new()
        .dependency(gate.as_dependency())
        .body(move |_cx| seen.wait().into_result());
    scheduler.spawn(task.clone());

    // Not ready: the worker must not burn a thread on it.
    thread::sleep(Duration::from_millis(50));
    assert!(!task.is_done());

    gate.complete(5);

    assert_eq!(
        task.wait_timeout(SETTLE_TIMEOUT),
        Some(ComputeResult::Value(5))
    );
    assert!(scheduler.stats().settle_wakes.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_suspended_task_is_rechecked_on_backoff() {
    let scheduler = ChainScheduler::with_config(fast_config());
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    let task = ComputationTask::new(move |_cx| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    });

    task.suspend();
    scheduler.spawn(task.clone());

    thread::sleep(Duration::from_millis(100));
    assert!(!task.is_done());
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    // While held, the task spends its backoff windows in the parked set.
    let deadline = std::time::Instant::now() + SETTLE_TIMEOUT;
    while scheduler.parked_tasks() == 0 {
        assert!(std::time::Instant::now() < deadline, "task never parked");
        thread::sleep(Duration::from_millis(1));
    }

    task.resume();

    assert_eq!(
        task.wait_timeout(SETTLE_TIMEOUT),
        Some(ComputeResult::Value(1))
    );
    assert!(scheduler.stats().backoff_requeues.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_failed_body_is_counted() {
    let scheduler = ChainScheduler::with_config(fast_config());
    let task: Arc<ComputationTask<i32>> =
        ComputationTask::new(|_cx| Err(ComputeError::failed("nope")));

    scheduler.spawn(task.clone());
    let result = task.wait_timeout(SETTLE_TIMEOUT);
    assert!(matches!(result, Some(ComputeResult::Error(_))));

    // Stats are recorded just after settlement; give the worker a beat.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(scheduler.stats().tasks_failed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_many_independent_tasks() {
    let scheduler = ChainScheduler::with_config(fast_config());
    let counter = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let counter = counter.clone();
            let task = ComputationTask::new(move |_cx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            });
            scheduler.spawn(task.clone());
            task
        })
        .collect();

    for (i, task) in tasks.iter().enumerate() {
        assert_eq!(
            task.wait_timeout(SETTLE_TIMEOUT),
            Some(ComputeResult::Value(i))
        );
    }
    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[test]
fn test_concurrent_producers_feed_one_task() {
    let scheduler = ChainScheduler::with_config(fast_config());
    let task = ComputationTask::new(|_cx| Ok(0));

    let gates: Vec<ComputationHandle<i32>> =
        (0..8).map(|_| ComputationHandle::new()).collect();

    let pushers: Vec<_> = gates
        .iter()
        .map(|gate| {
            let task = task.clone();
            let gate = gate.clone();
            thread::spawn(move || task.push_dependency(gate.as_dependency()))
        })
        .collect();
    for pusher in pushers {
        pusher.join().unwrap();
    }

    scheduler.spawn(task.clone());
    thread::sleep(Duration::from_millis(50));
    assert!(!task.is_done());

    // The stack drains top-down as each producer-side handle settles.
    for gate in &gates {
        gate.complete(1);
    }

    assert_eq!(
        task.wait_timeout(SETTLE_TIMEOUT),
        Some(ComputeResult::Value(0))
    );
}

#[test]
fn test_scheduler_shutdown() {
    let mut scheduler = ChainScheduler::with_config(fast_config());
    assert!(scheduler.is_running());

    scheduler.shutdown();
    assert!(!scheduler.is_running());
}

#[test]
fn test_spawn_of_settled_task_is_skipped() {
    let scheduler = ChainScheduler::with_config(fast_config());
    let task = ComputationTask::completed(4);

    scheduler.spawn(task.clone());
    thread::sleep(Duration::from_millis(20));

    assert_eq!(scheduler.stats().tasks_fired.load(Ordering::SeqCst), 0);
    assert_eq!(task.wait(), ComputeResult::Value(4));
}
