//! Platform abstraction trait definitions.

use std::fmt::Debug;

use crate::stats::{IoReading, ProcessId, StatSample};

/// Provides process introspection functionality.
///
/// This trait abstracts the underlying operating system facilities for
/// inspecting processes, allowing for both real implementations (using
/// system calls) and fake implementations (for testing).
///
/// Every reading is non-blocking and degrades to `None` when the target
/// process cannot be inspected; inspection failures are never errors.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// The process identifier of the calling process.
    fn current_pid(&self) -> ProcessId;

    /// Whether a process with the given identifier is currently running.
    fn exists(&self, pid: ProcessId) -> bool;

    /// Takes one point-in-time CPU/memory reading for the given process.
    ///
    /// Returns `None` if the process has exited or cannot be inspected.
    fn stat(&self, pid: ProcessId) -> Option<StatSample>;

    /// Reads the cumulative I/O counters for the given process.
    ///
    /// Returns `None` if the process cannot be inspected or the platform
    /// does not account for process I/O.
    fn io_counters(&self, pid: ProcessId) -> Option<IoReading>;

    /// The live children of the given process, discovered recursively.
    fn children(&self, pid: ProcessId) -> Vec<ProcessId>;

    /// Whether this platform accounts for process I/O at all.
    ///
    /// When false, I/O fields stay zero and reports omit them.
    fn supports_io_counters(&self) -> bool;
}
