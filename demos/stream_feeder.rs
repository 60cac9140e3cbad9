//! Stream feeding example
//!
//! Demonstrates driving a keeper from an iterator of promises, including
//! promises of different result types.
//!
//! Run with: cargo run --example stream_feeder

use promise_keeper::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Promise Keeper - Stream Feeder Example ===\n");

    println!("1. Feeding squares from a vector:");
    let squares: Vec<Promise<u64>> = (0..8u64)
        .map(|i| {
            Promise::new(move || {
                thread::sleep(Duration::from_millis(20));
                Ok(i * i)
            })
        })
        .collect();
    let keeper = PromiseKeeper::with_stream(KeeperConfig::new(3), squares.clone())?;
    for (i, promise) in squares.iter().enumerate() {
        promise.wait();
        println!("   {}^2 = {:?}", i, promise.result());
    }

    println!("\n2. Feeding a lazily generated stream of mixed types:");
    let stream = (0..6).map(|i| -> PromiseHandle {
        if i % 2 == 0 {
            Promise::new(move || Ok(i)).into()
        } else {
            Promise::new(move || Ok(format!("item {}", i))).into()
        }
    });
    let mixed = PromiseKeeper::with_stream(
        KeeperConfig::new(2).with_thread_name_prefix("mixed-worker"),
        stream,
    )?;
    while mixed.is_feeding() || mixed.is_running() {
        thread::sleep(Duration::from_millis(20));
    }
    println!("   fed {} promises", mixed.total_submitted());

    println!("\n3. A stream that fails part way:");
    let items = vec![Some(Promise::new(|| Ok(1))), None, Some(Promise::new(|| Ok(3)))];
    let failing = PromiseKeeper::with_stream(
        KeeperConfig::new(1),
        items
            .into_iter()
            .map(|item| item.unwrap_or_else(|| panic!("generator ran dry"))),
    )?;
    while failing.is_feeding() {
        thread::sleep(Duration::from_millis(10));
    }
    println!("   feeder error: {:?}", failing.feeder_error());
    println!("   fed {} promises before failing", failing.total_submitted());

    drop(keeper);
    println!("\n=== Example completed successfully ===");
    Ok(())
}
