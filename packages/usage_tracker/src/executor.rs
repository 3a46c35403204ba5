//! Orchestrates the measurement machinery around one callable invocation.

use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::ERR_POISONED_LOCK;
use crate::pal::{Platform, PlatformFacade};
use crate::sampler::Sampler;
use crate::snapshot::take_snapshot;
use crate::stats::{Stats, subtract_per_process};

/// How one invocation of the wrapped callable ended.
///
/// A panic is carried by value so measurement teardown can complete before
/// the panic is resumed for the original caller; the measurement machinery
/// never replaces the callable's own outcome with one of its own errors.
pub(crate) enum Outcome<T> {
    /// The callable returned normally.
    Returned(T),

    /// The callable panicked; the payload is resumed after teardown.
    Panicked(Box<dyn Any + Send + 'static>),
}

// The panic payload is opaque, so this cannot be derived.
impl<T> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returned(_) => f.write_str("Returned"),
            Self::Panicked(_) => f.write_str("Panicked"),
        }
    }
}

impl<T> Outcome<T> {
    /// Unwraps the callable's own outcome, resuming its panic if it had one.
    pub(crate) fn into_value(self) -> T {
        match self {
            Self::Returned(value) => value,
            Self::Panicked(payload) => resume_unwind(payload),
        }
    }
}

/// Why an isolation attempt did not produce a measurement.
#[derive(Debug, thiserror::Error)]
pub(crate) enum IsolateError {
    /// The isolated execution thread could not be spawned.
    #[error("failed to spawn the isolated execution thread: {0}")]
    Spawn(#[from] io::Error),

    /// The isolated context went away before delivering over its channel.
    #[error("the isolated execution context disappeared before delivering a result")]
    ChannelClosed,
}

/// Result of attempting to run a callable in an isolated context.
#[derive(Debug)]
pub(crate) enum IsolatedAttempt<T, F> {
    /// The isolated context ran the callable and delivered its outcome
    /// and statistics.
    Delivered((Outcome<T>, Stats)),

    /// Isolation could not be attempted and the callable has not run;
    /// it is handed back so the caller can fall back to the current
    /// context.
    NotRun(F, IsolateError),
}

/// Runs a callable in the current context with full measurement around it.
///
/// Ordering contract: the baseline snapshot completes before the sampler
/// starts, and the sampler starts before the callable; the sampler is
/// stopped after the callable finishes, whether it returned or panicked,
/// so the measurement window always covers the whole invocation.
pub(crate) fn execute<T>(
    platform: &PlatformFacade,
    include_children: bool,
    f: impl FnOnce() -> T,
) -> (Outcome<T>, Stats) {
    let pid = platform.current_pid();

    let baseline = take_snapshot(platform, pid, include_children);
    let sampler = Sampler::start(platform.clone(), pid, include_children);

    let outcome = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Outcome::Returned(value),
        Err(payload) => Outcome::Panicked(payload),
    };

    // Must run even when the callable panicked; a leaked sampler would
    // keep polling forever.
    let sampled = sampler.stop();

    let delta = subtract_per_process(sampled, &baseline);

    (outcome, Stats::merge_tree(&delta))
}

/// Runs a callable, its baseline, and its sampler inside a freshly spawned
/// execution context, delivering the outcome and statistics back over a
/// dedicated channel.
///
/// The callable is parked in a shared slot and taken by the child context
/// just before it runs. If the child never takes it, the attempt reports
/// [`IsolatedAttempt::NotRun`] and hands the callable back, guaranteeing
/// the fallback path cannot execute it a second time.
pub(crate) fn execute_isolated<T, F>(
    platform: &PlatformFacade,
    include_children: bool,
    f: F,
) -> IsolatedAttempt<T, F>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    #[cfg(test)]
    if let PlatformFacade::Fake(fake) = platform {
        if !fake.isolation_available() {
            return IsolatedAttempt::NotRun(f, IsolateError::ChannelClosed);
        }
    }

    let (result_tx, result_rx) = mpsc::channel();

    let callable = Arc::new(Mutex::new(Some(f)));
    let callable_in_child = Arc::clone(&callable);
    let platform_in_child = platform.clone();

    let spawn_result = thread::Builder::new()
        .name("usage-isolated".to_string())
        .spawn(move || {
            let Some(f) = callable_in_child.lock().expect(ERR_POISONED_LOCK).take() else {
                return;
            };

            let measured = execute(&platform_in_child, include_children, f);

            // The parent waits unboundedly, so this only fails if the
            // parent itself went away.
            _ = result_tx.send(measured);
        });

    if let Err(error) = spawn_result {
        let f = callable
            .lock()
            .expect(ERR_POISONED_LOCK)
            .take()
            .expect("callable cannot have been taken when no thread was spawned");

        return IsolatedAttempt::NotRun(f, IsolateError::Spawn(error));
    }

    match result_rx.recv() {
        Ok(measured) => IsolatedAttempt::Delivered(measured),
        Err(_) => match callable.lock().expect(ERR_POISONED_LOCK).take() {
            Some(f) => IsolatedAttempt::NotRun(f, IsolateError::ChannelClosed),
            // The child took the callable but never delivered. Nothing can
            // recover the outcome, and re-running is not an option.
            None => panic!(
                "the isolated execution context vanished after taking the callable; \
                 its outcome is unrecoverable"
            ),
        },
    }
}
