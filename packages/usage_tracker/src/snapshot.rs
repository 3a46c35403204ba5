//! Baseline capture before a measured call begins.

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::pal::PlatformFacade;
use crate::sampler::{poll_tree, resolve_io};
use crate::stats::{ProcessId, RawSample, Stats};

/// How long the caller waits for the baseline before substituting zero.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Captures one baseline reading of the target process tree.
///
/// The reading happens on a helper thread so its cost is not attributed to
/// the caller's own execution; the caller blocks until it completes or
/// [`SNAPSHOT_TIMEOUT`] elapses. Any failure yields an empty mapping, which
/// subtracts as a zero baseline: a failed snapshot must never abort the
/// measured call.
pub(crate) fn take_snapshot(
    platform: &PlatformFacade,
    pid: ProcessId,
    include_children: bool,
) -> HashMap<ProcessId, Stats> {
    let (result_tx, result_rx) = mpsc::channel();
    let platform = platform.clone();

    let spawn_result = thread::Builder::new()
        .name("usage-snapshot".to_string())
        .spawn(move || {
            let baseline = collect_once(&platform, pid, include_children);

            // The caller may have timed out and substituted zero already.
            _ = result_tx.send(baseline);
        });

    if let Err(error) = spawn_result {
        tracing::debug!(%error, "failed to spawn the snapshot thread; using a zero baseline");
        return HashMap::new();
    }

    match result_rx.recv_timeout(SNAPSHOT_TIMEOUT) {
        Ok(baseline) => baseline,
        Err(_) => {
            tracing::debug!("baseline snapshot timed out; using a zero baseline");
            HashMap::new()
        }
    }
}

/// One non-blocking reading plus cumulative I/O counters, per process.
fn collect_once(
    platform: &PlatformFacade,
    pid: ProcessId,
    include_children: bool,
) -> HashMap<ProcessId, Stats> {
    let mut raw: HashMap<ProcessId, RawSample> = HashMap::new();

    poll_tree(platform, pid, include_children, &mut raw);
    resolve_io(platform, pid, include_children, &mut raw);

    raw.iter()
        .map(|(process, accumulated)| (*process, Stats::from_raw(accumulated)))
        .collect()
}
