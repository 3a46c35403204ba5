//! Simplified example demonstrating key `usage_tracker` types working together.
//!
//! This example shows how to use the main types in the `usage_tracker` package:
//! - `Session`: Manages usage tracking state and collects measurements
//! - `ProfiledCall`: Wraps one callable so invocations through it are measured
//! - `Options`: Configures verbosity, child discovery, and isolation
//!
//! Run with: `cargo run --example usage_tracker_basic`.

use std::hint::black_box;
use std::thread;
use std::time::Duration;

use usage_tracker::{CallArgs, Options, Session};

fn main() {
    println!("=== Resource Usage Tracking Example ===");
    println!();

    // Create a tracking session - this enables resource usage monitoring.
    let session = Session::new();
    println!("✓ Created tracking session");
    println!();

    // Track an allocation-heavy call. Holding the buffer briefly gives the
    // sampler time to observe the resident set growth.
    {
        let allocate = session.profile("allocate_buffers", Options::new());
        allocate.measure(|| {
            let mut buffers = Vec::new();
            for _ in 0..20 {
                let mut buffer = vec![0_u8; 1024 * 1024];
                for index in (0..buffer.len()).step_by(4096) {
                    buffer[index] = 1;
                }
                buffers.push(buffer);
            }
            thread::sleep(Duration::from_millis(500));
            black_box(buffers.len())
        });
    }

    // Track a computation-heavy call with verbose, itemized output, and
    // record the arguments it was invoked with.
    {
        let compute = session.profile("sum_of_products", Options::new().with_verbose(true));
        let args = CallArgs::new().positional(50_000).named("rounds", 10);
        compute.measure_with_args(args, || {
            let mut sum = 0_u64;
            for round in 0..10_u64 {
                for value in 0..50_000_u64 {
                    sum = sum.wrapping_add(value.wrapping_mul(round) % 1000);
                }
            }
            black_box(sum)
        });
    }

    // Track a call in an isolated execution context so the measurement is
    // not diluted by anything else this thread is doing.
    {
        let isolated = session.profile("isolated_allocation", Options::new().with_isolate(true));
        isolated.measure_isolated(|| {
            let buffer = vec![7_u8; 8 * 1024 * 1024];
            thread::sleep(Duration::from_millis(300));
            black_box(buffer.len())
        });
    }

    println!();
    println!("=== All recorded measurements ===");
    session.print_to_stdout();
    println!();
    println!("Session automatically cleaned up when dropped.");
}
