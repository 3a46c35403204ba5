//! The entry point that owns all tracking state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::ERR_POISONED_LOCK;
use crate::pal::PlatformFacade;
use crate::profiled::{Options, ProfiledCall};
use crate::recursion::InFlightIsolated;
use crate::report::{Measurement, Report};

/// Tracks the resource usage of callables invoked through it.
///
/// A session hands out [`ProfiledCall`] wrappers and accumulates one
/// measurement per completed outermost invocation. All wrappers of one
/// session share its activation switch, so a whole suite of tracked
/// callables can be switched off at once.
///
/// Sessions are cheap; there is no problem with creating many of them.
///
/// # Example
///
/// ```
/// use usage_tracker::{Options, Session};
///
/// let session = Session::new();
/// let add = session.profile("add", Options::new());
///
/// let sum = add.measure(|| 2 + 3);
/// assert_eq!(sum, 5);
///
/// let report = session.to_report();
/// assert_eq!(report.measurements().len(), 1);
/// ```
#[derive(Debug)]
pub struct Session {
    platform: PlatformFacade,
    measurements: Arc<Mutex<Vec<Measurement>>>,
    in_flight_isolated: InFlightIsolated,
    active: Arc<AtomicBool>,
    next_callable_id: AtomicU64,
}

impl Session {
    /// Creates a new session for tracking resource usage.
    #[expect(
        clippy::new_without_default,
        reason = "creating a session is a meaningful action, not a default state"
    )]
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(PlatformFacade::real())
    }

    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self {
            platform,
            measurements: Arc::new(Mutex::new(Vec::new())),
            in_flight_isolated: InFlightIsolated::new(),
            active: Arc::new(AtomicBool::new(true)),
            next_callable_id: AtomicU64::new(0),
        }
    }

    /// Wraps a callable under the given name, to be invoked through the
    /// returned wrapper.
    #[must_use]
    pub fn profile(&self, name: impl Into<String>, options: Options) -> ProfiledCall {
        let id = self.next_callable_id.fetch_add(1, Ordering::SeqCst);

        ProfiledCall::new(
            name.into(),
            options,
            self.platform.clone(),
            id,
            self.in_flight_isolated.clone(),
            Arc::clone(&self.measurements),
            Arc::clone(&self.active),
        )
    }

    /// Switches measurement on or off for every wrapper of this session.
    ///
    /// While inactive, invocations pass straight through to the callable
    /// with no measurement machinery around them.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Whether invocations through this session's wrappers are measured.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether any measurement has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.lock().expect(ERR_POISONED_LOCK).is_empty()
    }

    /// Takes a copy of everything recorded so far as a report.
    #[must_use]
    pub fn to_report(&self) -> Report {
        Report::new(self.measurements.lock().expect(ERR_POISONED_LOCK).clone())
    }

    /// Prints everything recorded so far to standard output.
    #[cfg_attr(test, mutants::skip)] // Too annoying to test stdout output.
    pub fn print_to_stdout(&self) {
        self.to_report().print_to_stdout();
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_report().fmt(f)
    }
}
