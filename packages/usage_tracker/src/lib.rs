//! Resource usage tracking utilities for benchmarks and performance analysis.
//!
//! This package provides utilities to measure the processor, memory, and I/O
//! footprint of individual function calls, attributing to each call the usage
//! it adds on top of what the process was already consuming.
//!
//! The core functionality includes:
//! - [`Session`] - Configures usage tracking and provides access to recorded data
//! - [`ProfiledCall`] - Wraps one callable so invocations through it are measured
//! - [`Options`] - Configures verbosity, child process discovery, and isolation
//! - [`Report`] - The recorded measurements of a session
//!
//! This package is not meant for use in production, serving only as a development tool.
//!
//! # Simple Usage
//!
//! You can track the footprint of a call like this:
//!
//! ```
//! use usage_tracker::{Options, Session};
//!
//! # fn main() {
//! let session = Session::new();
//!
//! // Wrap the work to be measured
//! let work = session.profile("sum_to_ten_thousand", Options::new());
//! let sum = work.measure(|| {
//!     let mut sum = 0_u64;
//!     for i in 0..10000 {
//!         sum += i;
//!     }
//!     sum
//! });
//! assert_eq!(sum, 49_995_000);
//!
//! // Print results
//! session.print_to_stdout();
//! # }
//! ```
//!
//! # Isolated Measurement
//!
//! The caller's own activity can drown out a small callable's footprint. With
//! isolation enabled, the callable runs in a dedicated execution context and
//! only that context is measured. When isolation cannot be set up, the call
//! transparently falls back to measurement in the current context:
//!
//! ```
//! use usage_tracker::{Options, Session};
//!
//! # fn main() {
//! let session = Session::new();
//!
//! let work = session.profile("allocate", Options::new().with_isolate(true));
//! let buffer = work.measure_isolated(|| vec![0_u8; 1024 * 1024]);
//! assert_eq!(buffer.len(), 1024 * 1024);
//! # }
//! ```
//!
//! # Recursion
//!
//! A tracked callable may invoke itself; only the outermost invocation is
//! measured and recorded. Inner invocations run plainly, so measurements are
//! never double counted.
//!
//! # Threading
//!
//! Sessions and wrappers are thread-safe, but each measurement observes the
//! whole process, so concurrent measured calls see each other's usage.
//! Single-threaded measurement is recommended to ensure meaningful data.

mod executor;
mod pal;
mod profiled;
mod recursion;
mod report;
mod sampler;
mod session;
mod snapshot;
mod stats;

pub use profiled::{CallArgs, CallKind, Options, ProfiledCall};
pub use report::{Measurement, Report, format_size};
pub use session::Session;
pub use stats::{ProcessId, Stats};

pub(crate) const ERR_POISONED_LOCK: &str =
    "encountered poisoned lock - program validity cannot be guaranteed";
