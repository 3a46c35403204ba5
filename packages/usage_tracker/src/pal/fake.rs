//! Fake platform implementation for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ERR_POISONED_LOCK;
use crate::pal::Platform;
use crate::stats::{IoReading, ProcessId, StatSample};

/// Internal state for the fake platform that can be shared between clones.
#[derive(Debug)]
struct FakePlatformState {
    current_pid: ProcessId,
    stats: HashMap<ProcessId, StatSample>,
    io: HashMap<ProcessId, IoReading>,
    children: HashMap<ProcessId, Vec<ProcessId>>,
    live: Vec<ProcessId>,
    supports_io: bool,
    isolation_available: bool,
    panic_next_current_pid: bool,
}

/// Fake implementation of the platform abstraction for testing.
///
/// Tests script the readings each process identifier reports instead of
/// relying on actual system calls. Multiple clones of the same
/// `FakePlatform` share the same underlying state, allowing tests to modify
/// readings while a sampler observes them from another thread.
#[derive(Clone, Debug)]
pub(crate) struct FakePlatform {
    state: Arc<Mutex<FakePlatformState>>,
}

/// The process identifier the fake platform reports for the calling process.
pub(crate) const FAKE_SELF_PID: ProcessId = 1000;

impl FakePlatform {
    /// Creates a new fake platform where only the calling process is live,
    /// with all-zero readings and I/O accounting enabled.
    pub(crate) fn new() -> Self {
        let mut stats = HashMap::new();
        stats.insert(FAKE_SELF_PID, StatSample::default());

        Self {
            state: Arc::new(Mutex::new(FakePlatformState {
                current_pid: FAKE_SELF_PID,
                stats,
                io: HashMap::new(),
                children: HashMap::new(),
                live: vec![FAKE_SELF_PID],
                supports_io: true,
                isolation_available: true,
                panic_next_current_pid: false,
            })),
        }
    }

    /// Sets the reading a live process reports from now on.
    ///
    /// This affects all clones of this platform, allowing tests to change
    /// readings mid-measurement.
    pub(crate) fn set_stat(&self, pid: ProcessId, sample: StatSample) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if !state.live.contains(&pid) {
            state.live.push(pid);
        }
        state.stats.insert(pid, sample);
    }

    /// Sets the cumulative I/O counters a live process reports from now on.
    pub(crate) fn set_io(&self, pid: ProcessId, reading: IoReading) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if !state.live.contains(&pid) {
            state.live.push(pid);
        }
        state.io.insert(pid, reading);
    }

    /// Registers `child` as a direct child of `parent` and marks it live.
    pub(crate) fn add_child(&self, parent: ProcessId, child: ProcessId) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        state.children.entry(parent).or_default().push(child);
        if !state.live.contains(&child) {
            state.live.push(child);
        }
        state.stats.entry(child).or_default();
    }

    /// Marks a process as exited. Its scripted readings stop being served
    /// but it stays listed among its parent's children, like a pid that
    /// vanished between discovery and inspection.
    pub(crate) fn remove_process(&self, pid: ProcessId) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        state.live.retain(|live| *live != pid);
    }

    /// Changes whether the platform claims to account for process I/O.
    pub(crate) fn set_supports_io(&self, supported: bool) {
        self.state.lock().expect(ERR_POISONED_LOCK).supports_io = supported;
    }

    /// Changes whether isolated execution contexts can be set up, forcing
    /// callers onto their fallback path when unavailable.
    pub(crate) fn set_isolation_available(&self, available: bool) {
        self.state.lock().expect(ERR_POISONED_LOCK).isolation_available = available;
    }

    pub(crate) fn isolation_available(&self) -> bool {
        self.state.lock().expect(ERR_POISONED_LOCK).isolation_available
    }

    /// Makes the next `current_pid` call panic, simulating a failure inside
    /// the measurement machinery rather than the measured callable.
    pub(crate) fn panic_on_next_current_pid(&self) {
        self.state.lock().expect(ERR_POISONED_LOCK).panic_next_current_pid = true;
    }
}

impl Platform for FakePlatform {
    fn current_pid(&self) -> ProcessId {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if state.panic_next_current_pid {
            state.panic_next_current_pid = false;

            // Release the lock first so later calls see unpoisoned state.
            drop(state);
            panic!("scripted introspection failure");
        }

        state.current_pid
    }

    fn exists(&self, pid: ProcessId) -> bool {
        self.state
            .lock()
            .expect(ERR_POISONED_LOCK)
            .live
            .contains(&pid)
    }

    fn stat(&self, pid: ProcessId) -> Option<StatSample> {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        if !state.live.contains(&pid) {
            return None;
        }
        state.stats.get(&pid).copied()
    }

    fn io_counters(&self, pid: ProcessId) -> Option<IoReading> {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        if !state.supports_io || !state.live.contains(&pid) {
            return None;
        }
        state.io.get(&pid).copied()
    }

    fn children(&self, pid: ProcessId) -> Vec<ProcessId> {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        let mut found = Vec::new();
        let mut frontier = vec![pid];

        while let Some(parent) = frontier.pop() {
            if let Some(direct) = state.children.get(&parent) {
                for child in direct {
                    found.push(*child);
                    frontier.push(*child);
                }
            }
        }

        found
    }

    fn supports_io_counters(&self) -> bool {
        self.state.lock().expect(ERR_POISONED_LOCK).supports_io
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_with_live_self() {
        let platform = FakePlatform::new();

        assert_eq!(platform.current_pid(), FAKE_SELF_PID);
        assert!(platform.exists(FAKE_SELF_PID));
        assert_eq!(platform.stat(FAKE_SELF_PID), Some(StatSample::default()));
    }

    #[test]
    fn scripted_stat_is_served() {
        let platform = FakePlatform::new();
        let sample = StatSample {
            cpu_percent: 50.0,
            memory_percent: 10.0,
            rss_bytes: 1024,
            vms_bytes: 4096,
        };

        platform.set_stat(FAKE_SELF_PID, sample);

        assert_eq!(platform.stat(FAKE_SELF_PID), Some(sample));
    }

    #[test]
    fn removed_process_stops_reporting() {
        let platform = FakePlatform::new();
        platform.add_child(FAKE_SELF_PID, 2000);

        platform.remove_process(2000);

        assert!(!platform.exists(2000));
        assert!(platform.stat(2000).is_none());
        // Still discoverable among the children, like a freshly exited pid.
        assert_eq!(platform.children(FAKE_SELF_PID), vec![2000]);
    }

    #[test]
    fn children_are_discovered_recursively() {
        let platform = FakePlatform::new();
        platform.add_child(FAKE_SELF_PID, 2000);
        platform.add_child(2000, 3000);

        let mut children = platform.children(FAKE_SELF_PID);
        children.sort_unstable();

        assert_eq!(children, vec![2000, 3000]);
    }

    #[test]
    fn io_counters_respect_support_flag() {
        let platform = FakePlatform::new();
        platform.set_io(FAKE_SELF_PID, IoReading::default());

        assert!(platform.io_counters(FAKE_SELF_PID).is_some());

        platform.set_supports_io(false);

        assert!(platform.io_counters(FAKE_SELF_PID).is_none());
    }

    #[test]
    fn scripted_current_pid_failure_fires_once() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        let platform = FakePlatform::new();
        platform.panic_on_next_current_pid();

        assert!(catch_unwind(AssertUnwindSafe(|| platform.current_pid())).is_err());

        // The failure is one-shot; the platform stays usable afterwards.
        assert_eq!(platform.current_pid(), FAKE_SELF_PID);
    }

    #[test]
    fn isolation_availability_is_scriptable() {
        let platform = FakePlatform::new();

        assert!(platform.isolation_available());

        platform.set_isolation_available(false);

        assert!(!platform.isolation_available());
    }

    #[test]
    fn shared_state_between_clones() {
        let platform1 = FakePlatform::new();
        let platform2 = platform1.clone();

        platform1.set_stat(
            FAKE_SELF_PID,
            StatSample {
                cpu_percent: 25.0,
                ..StatSample::default()
            },
        );

        assert_eq!(
            platform2
                .stat(FAKE_SELF_PID)
                .expect("self is live")
                .cpu_percent,
            25.0
        );
    }
}
