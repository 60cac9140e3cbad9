//! Behavioral tests for the promise keeper

use promise_keeper::prelude::*;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(10);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_sleep(max_ms: u64) {
    let ms = rand::thread_rng().gen_range(0..=max_ms);
    thread::sleep(Duration::from_millis(ms));
}

fn slow_add((x, y): (i64, i64)) -> TaskResult<i64> {
    random_sleep(100);
    Ok(x + y)
}

fn slow_div((x, y): (i64, i64)) -> TaskResult<i64> {
    random_sleep(100);
    Ok(x / y)
}

#[derive(Debug, thiserror::Error)]
#[error("both items are empty")]
struct NothingToCompare;

/// Named arguments take the place of keyword arguments
struct Longest {
    item_1: String,
    item_2: String,
}

fn get_longest(args: Longest) -> TaskResult<String> {
    if args.item_1.is_empty() && args.item_2.is_empty() {
        return Err(Box::new(NothingToCompare));
    }
    if args.item_1.len() > args.item_2.len() {
        Ok(args.item_1)
    } else {
        Ok(args.item_2)
    }
}

fn keeper(num_threads: usize) -> PromiseKeeper {
    PromiseKeeper::with_threads(num_threads).expect("Failed to create promise keeper")
}

fn wait_until_stopped(keeper: &PromiseKeeper) {
    let deadline = Instant::now() + WAIT;
    while keeper.is_running() {
        assert!(Instant::now() < deadline, "pool did not auto-stop");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_should_complete_a_single_task_by_promise() {
    init_logging();
    let pk = keeper(3);

    let p = Promise::with_args(slow_add, (7, 3));
    pk.submit_promise(&p).expect("Failed to submit");

    assert!(p.wait_timeout(WAIT));
    assert_eq!(p.result(), Some(10));
    assert!(p.failure().is_none());
}

#[test]
fn test_should_complete_a_single_task_with_named_args() {
    init_logging();
    let pk = keeper(3);

    let p = Promise::with_args(
        get_longest,
        Longest {
            item_1: "Rust".to_string(),
            item_2: "Rocks!".to_string(),
        },
    );
    pk.submit_promise(&p).expect("Failed to submit");

    assert!(p.wait_timeout(WAIT));
    assert_eq!(p.result().as_deref(), Some("Rocks!"));
    assert!(p.failure().is_none());
}

#[test]
fn test_should_complete_a_single_task_by_args() {
    init_logging();
    let pk = keeper(3);

    let p = pk.submit(|| slow_add((5, 2))).expect("Failed to submit");

    assert!(p.wait_timeout(WAIT));
    assert_eq!(p.result(), Some(7));
    assert!(p.failure().is_none());
}

#[test]
fn test_should_complete_multiple_tasks() {
    init_logging();
    let pk = keeper(3);

    let ps: Vec<_> = (0..5)
        .map(|i| pk.submit(move || slow_add((i, 1000))).expect("Failed to submit"))
        .collect();

    wait_until_stopped(&pk);

    for (i, p) in ps.iter().enumerate() {
        assert!(p.is_ready());
        assert_eq!(p.result(), Some(i as i64 + 1000));
        assert!(p.failure().is_none());
    }
}

#[test]
fn test_should_complete_many_tasks_on_few_workers() {
    init_logging();
    let pk = keeper(4);
    let side_effects = Arc::new(AtomicUsize::new(0));

    let ps: Vec<_> = (0..200)
        .map(|i| {
            let side_effects = Arc::clone(&side_effects);
            pk.submit(move || {
                side_effects.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            })
            .expect("Failed to submit")
        })
        .collect();

    for (i, p) in ps.iter().enumerate() {
        assert!(p.wait_timeout(WAIT));
        assert_eq!(p.result(), Some(i));
    }
    assert_eq!(side_effects.load(Ordering::SeqCst), 200);
}

#[test]
fn test_should_call_notify_delegate_when_done() {
    init_logging();
    let pk = keeper(3);
    let called = Arc::new(AtomicUsize::new(0));

    let tracker = Arc::clone(&called);
    let p = pk
        .submit_with_notify(
            || slow_add((5, 2)),
            move |promise: &Promise<i64>| {
                assert!(promise.is_ready());
                assert_eq!(promise.result(), Some(7));
                assert!(promise.failure().is_none());
                tracker.fetch_add(1, Ordering::SeqCst);
            },
        )
        .expect("Failed to submit");

    wait_until_stopped(&pk);

    assert_eq!(p.result(), Some(7));
    assert!(p.failure().is_none());
    assert_eq!(called.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_notify_does_not_prevent_completion() {
    init_logging();
    let pk = keeper(1);

    let p = pk
        .submit_with_notify(|| Ok(1), |_: &Promise<i32>| panic!("bad callback"))
        .expect("Failed to submit");
    let after = pk.submit(|| Ok(2)).expect("Failed to submit");

    assert!(after.wait_timeout(WAIT));
    assert!(p.completed_on().is_some());
    assert_eq!(p.result(), Some(1));
    assert_eq!(after.result(), Some(2));
}

#[test]
fn test_should_populate_failure_when_bad_things_happen() {
    init_logging();
    let pk = keeper(3);

    let p = pk.submit(|| slow_div((10, 0))).expect("Failed to submit");

    assert!(p.wait_timeout(WAIT));
    assert!(p.result().is_none());
    match p.failure() {
        Some(TaskFailure::Panic(msg)) => assert!(msg.contains("divide by zero"), "{}", msg),
        other => panic!("expected a division by zero panic, got {:?}", other),
    }
}

#[test]
fn test_should_populate_returned_errors() {
    init_logging();
    let pk = keeper(1);

    let p = pk
        .submit(|| {
            get_longest(Longest {
                item_1: String::new(),
                item_2: String::new(),
            })
        })
        .expect("Failed to submit");

    assert!(p.wait_timeout(WAIT));
    assert!(p.result().is_none());
    let failure = p.failure().expect("failure missing");
    assert!(failure.downcast_ref::<NothingToCompare>().is_some());
}

#[test]
fn test_should_not_stop_if_auto_stop_false() {
    init_logging();
    let pk = PromiseKeeper::with_config(KeeperConfig::default().with_auto_stop(false))
        .expect("Failed to create promise keeper");

    let p = pk.submit(|| slow_add((1, 2))).expect("Failed to submit");
    assert!(p.wait_timeout(WAIT));
    thread::sleep(Duration::from_millis(250));

    assert!(pk.is_running());
    pk.stop(true).expect("Failed to stop");
}

#[test]
fn test_should_not_auto_start_if_auto_start_set_to_false() {
    init_logging();
    let pk = PromiseKeeper::with_config(KeeperConfig::default().with_auto_start(false))
        .expect("Failed to create promise keeper");

    let p = pk.submit(|| slow_add((1, 2))).expect("Failed to submit");
    thread::sleep(Duration::from_millis(50));

    assert!(!pk.is_running());
    assert!(!p.has_started());
}

#[test]
fn test_should_run_results_of_iterator() {
    init_logging();
    let promises: Vec<Promise<u64>> = (0..5u64)
        .map(|i| {
            Promise::new(move || {
                random_sleep(10);
                Ok(i * i)
            })
        })
        .collect();

    let pk = PromiseKeeper::with_stream(KeeperConfig::default(), promises.clone())
        .expect("Failed to create promise keeper");

    assert_eq!(promises.len(), 5);
    for (i, p) in promises.iter().enumerate() {
        assert!(p.wait_timeout(WAIT));
        assert_eq!(p.result(), Some((i * i) as u64));
    }

    wait_until_stopped(&pk);
    assert!(pk.feeder_error().is_none());
    assert_eq!(pk.total_submitted(), 5);
    assert_eq!(pk.outstanding(), 0);
}

#[test]
fn test_then_do() {
    init_logging();
    let pk = PromiseKeeper::with_config(
        KeeperConfig::default()
            .with_auto_start(false)
            .with_auto_stop(false),
    )
    .expect("Failed to create promise keeper");

    let negate = Promise::with_args(|x: i64| Ok(-x), 5);
    pk.submit_promise(&negate).expect("Failed to submit");
    let p = negate
        .then_do(|x| Ok(x.result().unwrap_or_default() * 5))
        .and_then(|p| p.then_do(|x| Ok(x.result().unwrap_or_default() - 5)))
        .expect("Failed to chain");

    pk.start().expect("Failed to start");
    assert!(p.wait_timeout(WAIT));
    pk.stop(true).expect("Failed to stop");

    assert_eq!(p.result(), Some(-30));
}

#[test]
fn test_then_do_on_started_promise_fails() {
    init_logging();
    let pk = keeper(1);

    let p = pk.submit(|| Ok(1)).expect("Failed to submit");
    assert!(p.wait_timeout(WAIT));

    let err = p.then_do(|x| Ok(x.result())).unwrap_err();
    assert!(matches!(err, KeeperError::AlreadyStarted { .. }));
    assert!(err.is_state_error());
}

#[test]
fn test_continuation_sees_parent_failure() {
    init_logging();
    let first: Promise<i32> = Promise::new(|| Err("first step failed".into()));
    let second = first
        .then_do(|parent| Ok(parent.failure().map(|f| f.to_string())))
        .expect("then_do failed");

    let pk = keeper(2);
    pk.submit_promise(&first).expect("Failed to submit");

    assert!(second.wait_timeout(WAIT));
    assert_eq!(
        second.result(),
        Some(Some("task failed: first step failed".to_string()))
    );
}

#[test]
fn test_start_and_stop_twice_fail() {
    init_logging();
    let pk = PromiseKeeper::with_config(KeeperConfig::new(2).with_auto_stop(false))
        .expect("Failed to create promise keeper");

    pk.start().expect("Failed to start");
    assert!(matches!(pk.start(), Err(KeeperError::AlreadyRunning { .. })));

    pk.stop(true).expect("Failed to stop");
    assert!(matches!(pk.stop(true), Err(KeeperError::NotRunning { .. })));
}

#[test]
fn test_execution_time_is_recorded() {
    init_logging();
    let pk = keeper(1);

    let p = pk
        .submit(|| {
            thread::sleep(Duration::from_millis(30));
            Ok(())
        })
        .expect("Failed to submit");

    assert_eq!(p.execution_time(), None);
    assert!(p.wait_timeout(WAIT));

    let elapsed = p.execution_time().expect("execution time missing");
    assert!(elapsed >= chrono::Duration::milliseconds(30));
    assert_eq!(p.status(), PromiseStatus::Completed);
}

#[test]
fn test_concurrent_submitters() {
    init_logging();
    let pk = Arc::new(keeper(4));
    let counter = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let pk = Arc::clone(&pk);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                (0..50)
                    .map(|_| {
                        let counter = Arc::clone(&counter);
                        pk.submit(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .expect("Failed to submit")
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for submitter in submitters {
        for p in submitter.join().expect("submitter panicked") {
            assert!(p.wait_timeout(WAIT));
        }
    }

    assert_eq!(counter.load(Ordering::SeqCst), 400);
    assert_eq!(pk.total_submitted(), 400);
}
