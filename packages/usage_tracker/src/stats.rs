//! Data types and aggregation for resource usage readings.

use std::collections::HashMap;

/// Identifier of an operating system process being observed.
pub type ProcessId = u32;

/// One point-in-time reading of processor and memory usage for one process.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct StatSample {
    /// Processor usage as a percentage of one processor. May exceed 100 for
    /// processes that keep several processors busy.
    pub(crate) cpu_percent: f64,

    /// Share of total physical memory held by the process, as a percentage.
    pub(crate) memory_percent: f64,

    /// Resident set size in bytes.
    pub(crate) rss_bytes: u64,

    /// Virtual memory size in bytes.
    pub(crate) vms_bytes: u64,
}

/// Cumulative I/O counters for one process, as accounted since process start.
///
/// These are running totals, not a time series; the difference between two
/// readings is the activity in between.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct IoReading {
    pub(crate) read_count: u64,
    pub(crate) write_count: u64,
    pub(crate) read_bytes: u64,
    pub(crate) write_bytes: u64,
}

/// Readings accumulated for one process while the sampler is running.
///
/// The sequences grow by one entry per poll. The I/O reading is cumulative,
/// so it is resolved once when sampling stops instead of being averaged.
#[derive(Clone, Debug, Default)]
pub(crate) struct RawSample {
    pub(crate) cpu_percent: Vec<f64>,
    pub(crate) memory_percent: Vec<f64>,
    pub(crate) rss_bytes: Vec<u64>,
    pub(crate) vms_bytes: Vec<u64>,
    pub(crate) io: IoReading,
}

impl RawSample {
    /// Appends one point-in-time reading to the accumulated sequences.
    pub(crate) fn push(&mut self, sample: StatSample) {
        self.cpu_percent.push(sample.cpu_percent);
        self.memory_percent.push(sample.memory_percent);
        self.rss_bytes.push(sample.rss_bytes);
        self.vms_bytes.push(sample.vms_bytes);
    }
}

/// Summary of the resource usage observed for one process or one process tree.
///
/// Created all-zero by default, populated once from a [`RawSample`], and
/// immutable afterwards; delta computation produces a new instance.
///
/// All fields are non-negative. After baseline subtraction an average may
/// exceed its corresponding maximum for a shrunk window; fields are clamped
/// to zero individually and deliberately not reconciled with each other.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    cpu_max: f64,
    cpu_avg: f64,
    mem_avg: f64,
    rss_avg: u64,
    rss_max: u64,
    vms_avg: u64,
    vms_max: u64,
    read_count: u64,
    write_count: u64,
    read_bytes: u64,
    write_bytes: u64,
}

impl Stats {
    /// Summarizes accumulated readings into per-process statistics.
    ///
    /// Maxima and arithmetic means are zero for empty sequences. I/O fields
    /// pass through unchanged because they are already cumulative totals.
    pub(crate) fn from_raw(raw: &RawSample) -> Self {
        Self {
            cpu_max: max_f64(&raw.cpu_percent),
            cpu_avg: mean_f64(&raw.cpu_percent),
            mem_avg: mean_f64(&raw.memory_percent),
            rss_avg: mean_u64(&raw.rss_bytes),
            rss_max: raw.rss_bytes.iter().copied().max().unwrap_or(0),
            vms_avg: mean_u64(&raw.vms_bytes),
            vms_max: raw.vms_bytes.iter().copied().max().unwrap_or(0),
            read_count: raw.io.read_count,
            write_count: raw.io.write_count,
            read_bytes: raw.io.read_bytes,
            write_bytes: raw.io.write_bytes,
        }
    }

    /// Sums per-process statistics across a process tree into one total.
    ///
    /// Every field is summed, including the CPU maxima: the result represents
    /// the combined load of the tree, not the peak of any single member.
    #[must_use]
    pub(crate) fn merge_tree(per_process: &HashMap<ProcessId, Stats>) -> Self {
        let mut total = Self::default();

        for stats in per_process.values() {
            total.cpu_max += stats.cpu_max;
            total.cpu_avg += stats.cpu_avg;
            total.mem_avg += stats.mem_avg;
            total.rss_avg = total.rss_avg.saturating_add(stats.rss_avg);
            total.rss_max = total.rss_max.saturating_add(stats.rss_max);
            total.vms_avg = total.vms_avg.saturating_add(stats.vms_avg);
            total.vms_max = total.vms_max.saturating_add(stats.vms_max);
            total.read_count = total.read_count.saturating_add(stats.read_count);
            total.write_count = total.write_count.saturating_add(stats.write_count);
            total.read_bytes = total.read_bytes.saturating_add(stats.read_bytes);
            total.write_bytes = total.write_bytes.saturating_add(stats.write_bytes);
        }

        total
    }

    /// Subtracts a baseline from this summary, clamping every field to zero.
    ///
    /// CPU fields are the exception: a CPU percentage is a rate, not a
    /// monotonic counter, so baseline subtraction is not meaningful for it
    /// and the measured values pass through unchanged.
    #[must_use]
    pub(crate) fn saturating_delta(&self, baseline: &Stats) -> Self {
        Self {
            cpu_max: self.cpu_max,
            cpu_avg: self.cpu_avg,
            mem_avg: (self.mem_avg - baseline.mem_avg).max(0.0),
            rss_avg: self.rss_avg.saturating_sub(baseline.rss_avg),
            rss_max: self.rss_max.saturating_sub(baseline.rss_max),
            vms_avg: self.vms_avg.saturating_sub(baseline.vms_avg),
            vms_max: self.vms_max.saturating_sub(baseline.vms_max),
            read_count: self.read_count.saturating_sub(baseline.read_count),
            write_count: self.write_count.saturating_sub(baseline.write_count),
            read_bytes: self.read_bytes.saturating_sub(baseline.read_bytes),
            write_bytes: self.write_bytes.saturating_sub(baseline.write_bytes),
        }
    }

    /// Maximum observed CPU usage, in percent.
    #[must_use]
    pub fn cpu_max(&self) -> f64 {
        self.cpu_max
    }

    /// Average observed CPU usage, in percent.
    #[must_use]
    pub fn cpu_avg(&self) -> f64 {
        self.cpu_avg
    }

    /// Average share of total physical memory, in percent.
    #[must_use]
    pub fn mem_avg(&self) -> f64 {
        self.mem_avg
    }

    /// Average resident set size, in bytes.
    #[must_use]
    pub fn rss_avg(&self) -> u64 {
        self.rss_avg
    }

    /// Maximum resident set size, in bytes.
    #[must_use]
    pub fn rss_max(&self) -> u64 {
        self.rss_max
    }

    /// Average virtual memory size, in bytes.
    #[must_use]
    pub fn vms_avg(&self) -> u64 {
        self.vms_avg
    }

    /// Maximum virtual memory size, in bytes.
    #[must_use]
    pub fn vms_max(&self) -> u64 {
        self.vms_max
    }

    /// Number of read operations, where the platform accounts for them.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// Number of write operations, where the platform accounts for them.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// Bytes read.
    #[must_use]
    pub fn read_bytes(&self) -> u64 {
        self.read_bytes
    }

    /// Bytes written.
    #[must_use]
    pub fn write_bytes(&self) -> u64 {
        self.write_bytes
    }
}

/// Computes the per-process delta between a measured run and its baseline.
///
/// Processes present in the measured mapping but absent from the baseline
/// pass through unchanged; the child set may legitimately drift between the
/// baseline snapshot and the sampled run.
pub(crate) fn subtract_per_process(
    measured: HashMap<ProcessId, Stats>,
    baseline: &HashMap<ProcessId, Stats>,
) -> HashMap<ProcessId, Stats> {
    measured
        .into_iter()
        .map(|(pid, stats)| match baseline.get(&pid) {
            Some(pre) => (pid, stats.saturating_delta(pre)),
            None => (pid, stats),
        })
        .collect()
}

fn max_f64(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_u64(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }

    let sum = values.iter().copied().map(u128::from).sum::<u128>();

    (sum / values.len() as u128)
        .try_into()
        .expect("mean of u64 values always fits in u64")
}
