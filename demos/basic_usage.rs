//! Basic promise keeper usage example
//!
//! Demonstrates submitting closures, waiting on promises, failures and
//! statistics tracking.
//!
//! Run with: cargo run --example basic_usage

use promise_keeper::prelude::*;
use std::thread;
use std::time::Duration;

fn slow_add((x, y): (i64, i64)) -> TaskResult<i64> {
    thread::sleep(Duration::from_millis(50));
    Ok(x + y)
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Promise Keeper - Basic Usage Example ===\n");

    // Starts with the first submission, stops once everything is kept
    let keeper = PromiseKeeper::with_threads(4)?;
    println!("1. Created promise keeper with {} threads", keeper.num_threads());

    println!("\n2. Submitting promises:");
    let promises: Vec<_> = (0..10)
        .map(|i| {
            keeper.submit(move || {
                println!("  Task {} executing on thread {:?}", i, thread::current().id());
                slow_add((i, 1000))
            })
        })
        .collect::<Result<_>>()?;
    println!("   Submitted {} promises (running: {})", promises.len(), keeper.is_running());

    println!("\n3. Results:");
    for promise in &promises {
        promise.wait();
        println!(
            "   {:?} took {}μs",
            promise.result(),
            promise
                .execution_time()
                .and_then(|d| d.num_microseconds())
                .unwrap_or_default()
        );
    }

    println!("\n4. A promise built up front with arguments:");
    let sum = Promise::with_args(slow_add, (7, 3));
    keeper.submit_promise(&sum)?;
    sum.wait();
    println!("   7 + 3 = {:?}", sum.result());

    println!("\n5. Failures are kept too:");
    let divisor = std::hint::black_box(0);
    let quotient = keeper.submit(move || Ok(10 / divisor))?;
    let rejected: Promise<()> = keeper.submit(|| Err("input rejected".into()))?;
    quotient.wait();
    rejected.wait();
    println!("   10 / 0   -> {:?}", quotient.failure());
    println!("   rejected -> {:?}", rejected.failure());

    println!("\n6. Notification on completion:");
    let notified = keeper.submit_with_notify(
        || slow_add((5, 2)),
        |promise: &Promise<i64>| println!("   notified: {:?}", promise.result()),
    )?;
    notified.wait();

    // Give the auto-stop monitor a moment
    thread::sleep(Duration::from_millis(300));

    println!("\n7. Statistics:");
    println!("   Total promises submitted: {}", keeper.total_submitted());
    println!("   Total promises kept: {}", keeper.total_kept());
    println!("   Total promises broken: {}", keeper.total_broken());
    println!("   Total promises panicked: {}", keeper.total_panicked());
    for (i, stat) in keeper.stats().iter().enumerate() {
        println!(
            "   Worker {}: {} completed, avg time: {:.2}μs",
            i,
            stat.get_promises_completed(),
            stat.get_average_processing_time_us()
        );
    }
    println!("   Still running: {}", keeper.is_running());

    println!("\n=== Example completed successfully ===");
    Ok(())
}
