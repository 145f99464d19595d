//! Suspend/resume flow control
//!
//! An external throttle pauses tasks irrespective of dependency readiness,
//! the way a submission-rate limiter would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskchain::engine::{ChainScheduler, ComputationTask, ComputeResult, SchedulerConfig};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

fn fast_scheduler() -> ChainScheduler {
    ChainScheduler::with_config(SchedulerConfig {
        num_workers: 2,
        backoff_interval: Duration::from_millis(10),
        idle_timeout: Duration::from_millis(1),
    })
}

#[test]
fn suspended_batch_runs_only_after_resume() {
    let scheduler = fast_scheduler();
    let started = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let counter = started.clone();
            let task = ComputationTask::new(move |_cx| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            });
            task.suspend();
            scheduler.spawn(task.clone());
            task
        })
        .collect();

    // Dependencies are all trivially ready; only the throttle holds them.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(started.load(Ordering::SeqCst), 0);

    for task in &tasks {
        task.resume();
    }

    for (i, task) in tasks.iter().enumerate() {
        assert_eq!(
            task.wait_timeout(SETTLE_TIMEOUT),
            Some(ComputeResult::Value(i))
        );
    }
    assert_eq!(started.load(Ordering::SeqCst), 16);
}

#[test]
fn suspend_toggles_any_number_of_times() {
    let scheduler = fast_scheduler();
    let task = ComputationTask::new(|_cx| Ok("done"));

    task.suspend();
    task.resume();
    task.suspend();
    scheduler.spawn(task.clone());

    thread::sleep(Duration::from_millis(50));
    assert!(!task.is_done());

    task.resume();
    assert_eq!(
        task.wait_timeout(SETTLE_TIMEOUT),
        Some(ComputeResult::Value("done"))
    );
}
