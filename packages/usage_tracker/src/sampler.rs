//! Background sampling of a process tree while a measured call runs.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::pal::{Platform, PlatformFacade};
use crate::stats::{ProcessId, RawSample, Stats};

/// Polling interval when sampling begins.
const INITIAL_REFRESH: Duration = Duration::from_millis(100);

/// Ceiling for the adaptive polling interval.
const MAX_REFRESH: Duration = Duration::from_secs(5);

/// Continuous sampling time after which the polling interval doubles.
///
/// Short calls get fine-grained sampling; long calls amortize the sampler's
/// own cost by polling ever more coarsely, up to [`MAX_REFRESH`].
const DOUBLE_AFTER: Duration = Duration::from_secs(10);

/// How long the loop waits for the target process to become inspectable
/// before giving up and reporting zero usage.
const INSPECTABLE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long [`Sampler::stop()`] waits for the final result.
///
/// Covers a full [`MAX_REFRESH`] poll interval plus the final counter
/// resolution with room to spare. If the loop misses even this deadline,
/// the measurement degrades to zero usage rather than hanging the caller.
const RESULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the sampling loop currently is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    /// The target process is not inspectable yet.
    Waiting,

    /// Readings are being accumulated every refresh interval.
    Sampling,

    /// A stop signal or process death arrived; cumulative counters are
    /// resolved one final time.
    Draining,

    /// The final result is ready to be delivered.
    Done,
}

/// A continuous sampler for one process tree, running on its own thread.
///
/// Created via [`Sampler::start()`]; polls the target (and optionally its
/// live children) at an adaptive interval until [`Sampler::stop()`] is
/// called or the target dies, then resolves final I/O counters and delivers
/// per-process statistics.
#[derive(Debug)]
pub(crate) struct Sampler {
    stop_tx: Sender<()>,
    result_rx: Receiver<HashMap<ProcessId, Stats>>,
}

impl Sampler {
    /// Starts sampling the given process on a dedicated thread.
    pub(crate) fn start(
        platform: PlatformFacade,
        pid: ProcessId,
        include_children: bool,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel();

        let spawn_result = thread::Builder::new()
            .name("usage-sampler".to_string())
            .spawn(move || {
                let result = run_loop(&platform, pid, include_children, &stop_rx);

                // The receiver may have timed out and moved on already.
                _ = result_tx.send(result);
            });

        if let Err(error) = spawn_result {
            // The disconnected result channel makes stop() report zero usage.
            tracing::warn!(%error, "failed to spawn the sampler thread; reporting zero usage");
        }

        Self { stop_tx, result_rx }
    }

    /// Signals the loop to stop and waits for the final per-process
    /// statistics.
    ///
    /// Returns an empty mapping (zero usage once merged) if the loop does
    /// not deliver within [`RESULT_TIMEOUT`], so a wedged target can never
    /// hang the caller.
    pub(crate) fn stop(self) -> HashMap<ProcessId, Stats> {
        // The loop may have ended on its own if the target died.
        _ = self.stop_tx.send(());

        match self.result_rx.recv_timeout(RESULT_TIMEOUT) {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "sampler did not deliver a result in time; reporting zero usage"
                );
                HashMap::new()
            }
        }
    }
}

/// The sampling loop itself; returns the final per-process statistics.
fn run_loop(
    platform: &PlatformFacade,
    pid: ProcessId,
    include_children: bool,
    stop_rx: &Receiver<()>,
) -> HashMap<ProcessId, Stats> {
    let mut raw: HashMap<ProcessId, RawSample> = HashMap::new();
    let mut phase = Phase::Waiting;
    let mut refresh = INITIAL_REFRESH;
    let mut since_doubling = Duration::ZERO;
    let mut waited = Duration::ZERO;

    while phase != Phase::Done {
        match phase {
            Phase::Waiting => {
                if platform.exists(pid) {
                    phase = Phase::Sampling;
                } else if waited >= INSPECTABLE_TIMEOUT {
                    tracing::warn!(
                        pid,
                        "target process never became inspectable; reporting zero usage"
                    );
                    phase = Phase::Done;
                } else {
                    match stop_rx.recv_timeout(INITIAL_REFRESH) {
                        // Stopped before the target ever appeared.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => phase = Phase::Done,
                        Err(RecvTimeoutError::Timeout) => {
                            waited = waited.saturating_add(INITIAL_REFRESH);
                        }
                    }
                }
            }
            Phase::Sampling => {
                poll_tree(platform, pid, include_children, &mut raw);

                if !platform.exists(pid) {
                    phase = Phase::Draining;
                    continue;
                }

                // The sleep doubles as the cooperative stop poll.
                match stop_rx.recv_timeout(refresh) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => phase = Phase::Draining,
                    Err(RecvTimeoutError::Timeout) => {
                        since_doubling = since_doubling.saturating_add(refresh);
                        if since_doubling > DOUBLE_AFTER {
                            refresh = refresh.saturating_mul(2).min(MAX_REFRESH);
                            since_doubling = Duration::ZERO;
                        }
                    }
                }
            }
            Phase::Draining => {
                // Sequenced after the stop signal so the final counters
                // cover all I/O the measured call performed.
                resolve_io(platform, pid, include_children, &mut raw);
                phase = Phase::Done;
            }
            Phase::Done => {}
        }
    }

    raw.iter()
        .map(|(process, accumulated)| (*process, Stats::from_raw(accumulated)))
        .collect()
}

/// Takes one reading of the target process, and of its live children when
/// requested, appending to the per-process accumulators.
///
/// Children that cannot be inspected are skipped for this poll only; their
/// previously accumulated readings stay in the mapping.
pub(crate) fn poll_tree(
    platform: &PlatformFacade,
    pid: ProcessId,
    include_children: bool,
    into: &mut HashMap<ProcessId, RawSample>,
) {
    match platform.stat(pid) {
        Some(sample) => into.entry(pid).or_default().push(sample),
        None => tracing::debug!(pid, "target process could not be read this poll"),
    }

    if include_children {
        let own_pid = platform.current_pid();

        for child in platform.children(pid) {
            if child == own_pid {
                continue;
            }
            if let Some(sample) = platform.stat(child) {
                into.entry(child).or_default().push(sample);
            }
        }
    }
}

/// Resolves the cumulative I/O counters for the target process, and for its
/// live children when requested.
pub(crate) fn resolve_io(
    platform: &PlatformFacade,
    pid: ProcessId,
    include_children: bool,
    into: &mut HashMap<ProcessId, RawSample>,
) {
    if let Some(reading) = platform.io_counters(pid) {
        into.entry(pid).or_default().io = reading;
    }

    if include_children {
        let own_pid = platform.current_pid();

        for child in platform.children(pid) {
            if child == own_pid {
                continue;
            }
            if let Some(reading) = platform.io_counters(child) {
                into.entry(child).or_default().io = reading;
            }
        }
    }
}
