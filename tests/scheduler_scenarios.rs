//! Scheduler scenario tests
//!
//! Drives the public scheduler API end to end with cooperative tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskgate::{ClosureTask, Outcome, Priority, Scheduler, SchedulerEvent, Task, TaskState};
use tokio::sync::broadcast::error::TryRecvError;

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for: {}", what);
}

async fn next_event(events: &mut tokio::sync::broadcast::Receiver<SchedulerEvent>) -> SchedulerEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn blocker(priority: Priority) -> Arc<ClosureTask> {
    Arc::new(ClosureTask::until_aborted(priority))
}

/// A single short task fires exactly one Started and one Completed
#[tokio::test]
async fn test_single_task_lifecycle_events() {
    let scheduler = Scheduler::new(1).unwrap();
    let mut events = scheduler.subscribe();

    let handle = scheduler
        .submit(Arc::new(ClosureTask::sleeping(Priority::Medium, Duration::from_millis(10))))
        .unwrap();

    assert_eq!(next_event(&mut events).await, SchedulerEvent::Started);
    assert_eq!(next_event(&mut events).await, SchedulerEvent::Completed);
    assert_eq!(
        handle.wait().await,
        TaskState::Finished {
            outcome: Outcome::Succeeded
        }
    );
    assert!(scheduler.is_empty());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

/// Aborting a running task frees its slot for the best waiting task
#[tokio::test]
async fn test_abort_running_admits_next() {
    let scheduler = Scheduler::new(2).unwrap();
    let mut events = scheduler.subscribe();

    let r1 = blocker(Priority::High);
    let r2 = blocker(Priority::Low);
    let r3 = blocker(Priority::Medium);
    let h1 = scheduler.submit(r1.clone()).unwrap();
    let h2 = scheduler.submit(r2.clone()).unwrap();
    let h3 = scheduler.submit(r3.clone()).unwrap();

    eventually("r1 and r2 executing", || r1.is_executing() && r2.is_executing()).await;
    assert!(!r3.is_executing());
    assert_eq!(h3.state(), TaskState::Waiting);
    assert_eq!(scheduler.count(), 3);
    assert_eq!(scheduler.running_count(), 2);
    assert_eq!(scheduler.waiting_count(), 1);

    assert!(scheduler.abort(h1.id()).await);
    assert!(r1.is_aborted());
    assert!(!r1.is_executing());
    eventually("r3 executing", || r3.is_executing()).await;
    assert_eq!(scheduler.count(), 2);

    assert!(scheduler.abort(h2.id()).await);
    assert!(scheduler.abort(h3.id()).await);
    assert_eq!(scheduler.count(), 0);
    assert!(r2.is_aborted());
    assert!(r3.is_aborted());

    assert_eq!(next_event(&mut events).await, SchedulerEvent::Started);
    assert_eq!(next_event(&mut events).await, SchedulerEvent::Completed);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

/// Aborting a waiting task returns promptly and leaves the runner alone
#[tokio::test]
async fn test_abort_waiting_leaves_running_untouched() {
    let scheduler = Scheduler::new(1).unwrap();

    let r1 = blocker(Priority::High);
    let r2 = blocker(Priority::Low);
    let h1 = scheduler.submit(r1.clone()).unwrap();
    let h2 = scheduler.submit(r2.clone()).unwrap();
    eventually("r1 executing", || r1.is_executing()).await;

    let aborted = tokio::time::timeout(Duration::from_millis(200), scheduler.abort(h2.id()))
        .await
        .expect("aborting a waiting task must not block");
    assert!(aborted);

    assert_eq!(h2.state(), TaskState::Cancelled);
    assert!(r2.is_aborted());
    assert!(!r2.is_executing());
    assert!(r1.is_executing());
    assert!(!r1.is_aborted());
    assert_eq!(h1.state(), TaskState::Running);
    assert_eq!(scheduler.count(), 1);

    assert!(scheduler.abort(h1.id()).await);
    assert!(scheduler.is_empty());
}

/// Aborting an unknown or finished task is a no-op
#[tokio::test]
async fn test_abort_finished_task_returns_false() {
    let scheduler = Scheduler::new(1).unwrap();
    let handle = scheduler
        .submit(Arc::new(ClosureTask::sleeping(Priority::Low, Duration::from_millis(1))))
        .unwrap();
    handle.wait().await;

    assert!(!scheduler.abort(handle.id()).await);
    assert!(scheduler.is_empty());
}

/// AbortAll terminates every waiting and running task
#[tokio::test]
async fn test_abort_all() {
    let scheduler = Scheduler::new(2).unwrap();
    let mut events = scheduler.subscribe();

    let tasks: Vec<Arc<ClosureTask>> = [Priority::Low, Priority::High, Priority::Medium, Priority::Low, Priority::High]
        .into_iter()
        .map(blocker)
        .collect();
    let handles: Vec<_> = tasks.iter().map(|task| scheduler.submit(task.clone()).unwrap()).collect();
    eventually("two tasks executing", || scheduler.running_count() == 2).await;

    assert_eq!(scheduler.abort_all().await, 5);
    assert_eq!(scheduler.count(), 0);
    assert!(tasks.iter().all(|task| task.is_aborted()));
    assert!(tasks.iter().all(|task| !task.is_executing()));
    assert!(handles.iter().all(|handle| handle.is_terminal()));

    assert_eq!(next_event(&mut events).await, SchedulerEvent::Started);
    assert_eq!(next_event(&mut events).await, SchedulerEvent::Completed);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    // Nothing left, so a second call has nothing to do
    assert_eq!(scheduler.abort_all().await, 0);
}

/// Tasks start in priority order, FIFO among equal priorities
#[tokio::test]
async fn test_start_order_follows_priority() {
    let scheduler = Scheduler::new(1).unwrap();
    let started = Arc::new(Mutex::new(Vec::new()));

    let gate = blocker(Priority::High);
    let gate_handle = scheduler.submit(gate.clone()).unwrap();
    eventually("gate executing", || gate.is_executing()).await;

    for (name, priority) in [
        ("low", Priority::Low),
        ("medium-1", Priority::Medium),
        ("high", Priority::High),
        ("medium-2", Priority::Medium),
    ] {
        let started = started.clone();
        let task = ClosureTask::new(priority, move |_signal| {
            let started = started.clone();
            async move {
                started.lock().unwrap().push(name);
                Outcome::Succeeded
            }
        });
        scheduler.submit(Arc::new(task)).unwrap();
    }
    assert_eq!(scheduler.waiting_count(), 4);

    scheduler.abort(gate_handle.id()).await;
    scheduler.idle().await;

    assert_eq!(*started.lock().unwrap(), vec!["high", "medium-1", "medium-2", "low"]);
}

/// The number of executing tasks never exceeds the limit
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_running_never_exceeds_limit() {
    let scheduler = Scheduler::new(3).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let active = active.clone();
            let peak = peak.clone();
            let priority = Priority::all()[i % 3];
            let task = ClosureTask::new(priority, move |_signal| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Outcome::Succeeded
                }
            });
            scheduler.submit(Arc::new(task)).unwrap()
        })
        .collect();

    tokio::time::timeout(Duration::from_secs(5), scheduler.idle())
        .await
        .expect("scheduler never drained");

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 1);
    for handle in &handles {
        assert_eq!(
            handle.wait().await,
            TaskState::Finished {
                outcome: Outcome::Succeeded
            }
        );
    }
}

/// Each busy period gets its own Started/Completed pair
#[tokio::test]
async fn test_events_repeat_per_busy_period() {
    let scheduler = Scheduler::new(2).unwrap();
    let mut events = scheduler.subscribe();

    for _ in 0..2 {
        let handle = scheduler
            .submit(Arc::new(ClosureTask::sleeping(Priority::High, Duration::from_millis(2))))
            .unwrap();
        handle.wait().await;
        assert_eq!(next_event(&mut events).await, SchedulerEvent::Started);
        assert_eq!(next_event(&mut events).await, SchedulerEvent::Completed);
    }
}

/// AbortAll racing tasks that finish on their own retires each task once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abort_all_races_natural_completion() {
    for delay_ms in [0u64, 1, 2, 3, 5, 8] {
        let scheduler = Scheduler::new(2).unwrap();
        let mut events = scheduler.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let task = ClosureTask::sleeping(Priority::Medium, Duration::from_millis(delay_ms));
                scheduler.submit(Arc::new(task)).unwrap()
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        scheduler.abort_all().await;

        assert_eq!(scheduler.count(), 0, "delay {}ms", delay_ms);
        for handle in &handles {
            match handle.state() {
                TaskState::Finished { outcome } => {
                    assert!(matches!(outcome, Outcome::Succeeded | Outcome::Aborted))
                }
                TaskState::Cancelled => {}
                other => panic!("delay {}ms: task left in state {:?}", delay_ms, other),
            }
        }

        assert_eq!(next_event(&mut events).await, SchedulerEvent::Started);
        assert_eq!(next_event(&mut events).await, SchedulerEvent::Completed);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        // Both permits are back and none was released twice
        let first = blocker(Priority::High);
        let second = blocker(Priority::High);
        let third = blocker(Priority::High);
        scheduler.submit(first.clone()).unwrap();
        scheduler.submit(second.clone()).unwrap();
        let last = scheduler.submit(third.clone()).unwrap();
        eventually("both slots in use", || first.is_executing() && second.is_executing()).await;
        assert_eq!(scheduler.running_count(), 2);
        assert_eq!(last.state(), TaskState::Waiting);
        assert!(!third.is_executing());

        assert_eq!(scheduler.abort_all().await, 3);
        assert_eq!(next_event(&mut events).await, SchedulerEvent::Started);
        assert_eq!(next_event(&mut events).await, SchedulerEvent::Completed);
    }
}
