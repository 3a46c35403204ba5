//! Integration tests for `usage_tracker` against the real platform.
//!
//! These tests run whole measurements around real work: allocations large
//! enough to show up in resident set sampling, recursion, panics, and
//! isolated execution.

use std::hint::black_box;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::Duration;

use usage_tracker::{CallArgs, Options, ProfiledCall, Session};

/// Routes diagnostics into the test output. Safe to call from every test;
/// only the first call installs the subscriber.
fn init_diagnostics() {
    _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Large enough that resident set sampling cannot miss it, small enough to
/// allocate instantly.
const LARGE_ALLOCATION_BYTES: usize = 100 * 1024 * 1024;

/// Allocates and touches a large buffer, then holds it long enough for the
/// sampler to observe it several times.
fn hold_large_allocation() -> usize {
    let mut buffer = vec![0_u8; LARGE_ALLOCATION_BYTES];

    // Touch every page so the memory is actually resident.
    for index in (0..buffer.len()).step_by(4096) {
        buffer[index] = 1;
    }

    thread::sleep(Duration::from_secs(1));

    black_box(buffer.len())
}

fn fib(call: &ProfiledCall, n: u64) -> u64 {
    call.measure(|| if n < 2 { n } else { fib(call, n - 1) + fib(call, n - 2) })
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn measured_call_returns_its_result_and_records_once() {
    init_diagnostics();
    let session = Session::new();
    let add = session.profile("add", Options::new());

    let args = CallArgs::new().positional(3).named("b", 6);
    let result = add.measure_with_args(args, || 3 + 6);

    assert_eq!(result, 9);

    let report = session.to_report();
    assert_eq!(report.measurements().len(), 1);
    assert_eq!(report.measurements()[0].name(), "add");
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn large_allocation_shows_up_in_resident_set_peak() {
    init_diagnostics();
    let session = Session::new();
    let allocate = session.profile("hold_large_allocation", Options::new());

    let allocated = allocate.measure(hold_large_allocation);

    assert_eq!(allocated, LARGE_ALLOCATION_BYTES);

    let report = session.to_report();
    let stats = report.measurements()[0].stats();

    // The buffer stays resident for a full second of sampling; even after
    // baseline subtraction the peak must reflect a large share of it.
    let expected_minimum: u64 = 30 * 1024 * 1024;
    assert!(
        stats.rss_max() >= expected_minimum,
        "expected a resident set peak of at least {expected_minimum} bytes, got {}",
        stats.rss_max()
    );
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn panic_propagates_unchanged_and_leaves_no_record() {
    init_diagnostics();
    let session = Session::new();
    let explode = session.profile("explode", Options::new());

    let result = catch_unwind(AssertUnwindSafe(|| {
        explode.measure(|| -> u32 { panic!("boom") })
    }));

    let payload = result.expect_err("the panic must reach the caller");
    assert_eq!(payload.downcast_ref::<&str>().copied(), Some("boom"));
    assert!(session.is_empty());

    // The wrapper stays usable after a panic.
    assert_eq!(explode.measure(|| 1), 1);
    assert_eq!(session.to_report().measurements().len(), 1);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn recursion_records_only_the_outermost_invocation() {
    init_diagnostics();
    let session = Session::new();
    let recurse = session.profile("fib", Options::new());

    let result = fib(&recurse, 10);

    assert_eq!(result, 55);
    assert_eq!(session.to_report().measurements().len(), 1);

    // A later invocation is outermost again and records normally.
    assert_eq!(fib(&recurse, 3), 2);
    assert_eq!(session.to_report().measurements().len(), 2);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn isolated_invocation_returns_the_same_result_as_a_plain_call() {
    init_diagnostics();
    let session = Session::new();
    let compute = session.profile("compute", Options::new().with_isolate(true));

    let result = compute.measure_isolated(|| (0..1000_u64).sum::<u64>());

    assert_eq!(result, (0..1000_u64).sum::<u64>());
    assert_eq!(session.to_report().measurements().len(), 1);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn inactive_session_passes_calls_through() {
    init_diagnostics();
    let session = Session::new();
    session.set_active(false);
    let work = session.profile("work", Options::new());

    assert_eq!(work.measure(|| 7), 7);
    assert!(session.is_empty());
}
