//! Real platform implementation backed by the `sysinfo` package.

use std::process;
use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::ERR_POISONED_LOCK;
use crate::pal::Platform;
use crate::stats::{IoReading, ProcessId, StatSample};

/// Process introspection via operating system facilities.
///
/// The `System` handle is kept alive between calls because CPU usage is
/// computed as a delta between two consecutive refreshes of the same
/// process table; a fresh handle would always report zero.
///
/// The operating system reports transferred byte counts but not read/write
/// operation counts, so the count fields of [`IoReading`] stay zero here.
#[derive(Debug)]
pub(crate) struct RealPlatform {
    state: Mutex<System>,
}

impl RealPlatform {
    /// Creates a new real platform with an empty process table.
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(System::new()),
        }
    }
}

impl Platform for RealPlatform {
    fn current_pid(&self) -> ProcessId {
        process::id()
    }

    fn exists(&self, pid: ProcessId) -> bool {
        let mut system = self.state.lock().expect(ERR_POISONED_LOCK);
        let target = Pid::from_u32(pid);

        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        system.process(target).is_some()
    }

    fn stat(&self, pid: ProcessId) -> Option<StatSample> {
        let mut system = self.state.lock().expect(ERR_POISONED_LOCK);
        let target = Pid::from_u32(pid);

        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        system.refresh_memory();

        let total_memory = system.total_memory();
        let process = system.process(target)?;

        let rss_bytes = process.memory();
        let memory_percent = if total_memory == 0 {
            0.0
        } else {
            rss_bytes as f64 / total_memory as f64 * 100.0
        };

        Some(StatSample {
            cpu_percent: f64::from(process.cpu_usage()),
            memory_percent,
            rss_bytes,
            vms_bytes: process.virtual_memory(),
        })
    }

    fn io_counters(&self, pid: ProcessId) -> Option<IoReading> {
        if !self.supports_io_counters() {
            return None;
        }

        let mut system = self.state.lock().expect(ERR_POISONED_LOCK);
        let target = Pid::from_u32(pid);

        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        let disk_usage = system.process(target)?.disk_usage();

        Some(IoReading {
            read_count: 0,
            write_count: 0,
            read_bytes: disk_usage.total_read_bytes,
            write_bytes: disk_usage.total_written_bytes,
        })
    }

    fn children(&self, pid: ProcessId) -> Vec<ProcessId> {
        let mut system = self.state.lock().expect(ERR_POISONED_LOCK);

        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut found = Vec::new();
        let mut frontier = vec![Pid::from_u32(pid)];

        while let Some(parent) = frontier.pop() {
            for (child_pid, process) in system.processes() {
                if process.parent() == Some(parent) {
                    found.push(child_pid.as_u32());
                    frontier.push(*child_pid);
                }
            }
        }

        found
    }

    fn supports_io_counters(&self) -> bool {
        // Process I/O accounting is not available on the Apple platforms.
        cfg!(not(any(target_os = "macos", target_os = "ios")))
    }
}
