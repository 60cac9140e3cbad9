//! Continuation chaining example
//!
//! Demonstrates `then_do` chains on a manually started keeper and a chain
//! that reacts to a failed parent.
//!
//! Run with: cargo run --example chaining

use promise_keeper::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Promise Keeper - Chaining Example ===\n");

    let config = KeeperConfig::new(2)
        .with_auto_start(false)
        .with_auto_stop(false)
        .with_thread_name_prefix("chain-worker");
    let keeper = PromiseKeeper::with_config(config)?;

    println!("1. Building a chain while the keeper is stopped:");
    let first = keeper.submit(|| Ok(-5))?;
    let last = first
        .then_do(|parent| {
            let value = parent.result().unwrap_or_default();
            println!("   {} * 5", value);
            Ok(value * 5)
        })?
        .then_do(|parent| {
            let value = parent.result().unwrap_or_default();
            println!("   {} - 5", value);
            Ok(value - 5)
        })?;
    println!("   queued: {}, running: {}", keeper.pending(), keeper.is_running());

    println!("\n2. Starting the keeper:");
    keeper.start()?;
    last.wait();
    println!("   result: {:?}", last.result());

    println!("\n3. A second continuation is refused:");
    match first.then_do(|parent| Ok(parent.result())) {
        Ok(_) => println!("   unexpectedly accepted"),
        Err(e) => println!("   {}", e),
    }

    println!("\n4. Continuations see their parent's failure:");
    let parse: Promise<i32> = Promise::new(|| Ok("forty-two".parse::<i32>()?));
    let report = parse.then_do(|parent| {
        Ok(match parent.outcome() {
            Some(Ok(value)) => format!("parsed {}", value),
            Some(Err(failure)) => format!("recovered from '{}'", failure),
            None => "parent never ran".to_string(),
        })
    })?;
    keeper.submit_promise(&parse)?;
    report.wait();
    println!("   {:?}", report.result());

    keeper.stop(true)?;
    println!("\n5. Submitted {} promises in total", keeper.total_submitted());

    println!("\n=== Example completed successfully ===");
    Ok(())
}
