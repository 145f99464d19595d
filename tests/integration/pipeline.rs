//! End-to-end pipeline scenarios
//!
//! External producers settle dependencies while a chain of dependent stages
//! runs on the scheduler, mirroring a submit → wait → post-process → notify
//! pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskchain::engine::{
    ChainScheduler, ComputationHandle, ComputationTask, ComputeError, ComputeResult,
    SchedulerConfig, TaskBuilder,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

fn fast_scheduler() -> ChainScheduler {
    ChainScheduler::with_config(SchedulerConfig {
        num_workers: 4,
        backoff_interval: Duration::from_millis(10),
        idle_timeout: Duration::from_millis(1),
    })
}

#[test]
fn external_producer_drives_a_chain() {
    let scheduler = fast_scheduler();
    let spawner = scheduler.handle();

    // The "job submission" result arrives from outside the engine.
    let job_done: ComputationHandle<u64> = ComputationHandle::new();

    let job = job_done.clone();
    let submit = TaskBuilder::new()
        .name("submit")
        .dependency(job_done.as_dependency())
        .body(move |_cx| job.wait().into_result());
    scheduler.spawn(submit.clone());

    let post_process = submit.then_apply(&spawner, |exit_code| {
        if exit_code == 0 {
            Ok("processed".to_string())
        } else {
            Err(ComputeError::failed(format!("exit code {exit_code}")))
        }
    });
    let notify = post_process.then_apply(&spawner, |msg| Ok(format!("notified: {msg}")));

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        job_done.complete(0);
    });

    assert_eq!(
        notify.wait_timeout(SETTLE_TIMEOUT),
        Some(ComputeResult::Value("notified: processed".to_string()))
    );
    producer.join().unwrap();
}

#[test]
fn result_is_visible_to_all_waiters() {
    let scheduler = fast_scheduler();
    let task = ComputationTask::new(|_cx| Ok(1234));
    scheduler.spawn(task.clone());

    let waiters: Vec<_> = (0..6)
        .map(|_| {
            let handle = task.handle();
            thread::spawn(move || handle.wait())
        })
        .collect();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), ComputeResult::Value(1234));
    }
}

#[test]
fn wide_fanout_settles_every_branch() {
    let scheduler = fast_scheduler();
    let spawner = scheduler.handle();
    let completed = Arc::new(AtomicUsize::new(0));

    let root = scheduler.supply("root", |_cx| Ok(10usize));
    let branches: Vec<_> = (0..32)
        .map(|i| {
            let counter = completed.clone();
            root.then_apply(&spawner, move |n| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(n + i)
            })
        })
        .collect();

    for (i, branch) in branches.iter().enumerate() {
        assert_eq!(
            branch.wait_timeout(SETTLE_TIMEOUT),
            Some(ComputeResult::Value(10 + i))
        );
    }
    assert_eq!(completed.load(Ordering::SeqCst), 32);
}

#[test]
fn deadline_composed_as_dependency() {
    // Timeouts are not an engine primitive: a deadline is just one more
    // dependency that a timer thread settles.
    let scheduler = fast_scheduler();

    let deadline: ComputationHandle<()> = ComputationHandle::new();
    let work = deadline.clone();
    let task = TaskBuilder::new()
        .name("deadline-gated")
        .dependency(deadline.as_dependency())
        .body(move |_cx| {
            work.wait().into_result()?;
            Ok("ran after deadline".to_string())
        });
    scheduler.spawn(task.clone());

    let timer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        deadline.complete(());
    });

    assert_eq!(
        task.wait_timeout(SETTLE_TIMEOUT),
        Some(ComputeResult::Value("ran after deadline".to_string()))
    );
    timer.join().unwrap();
}
