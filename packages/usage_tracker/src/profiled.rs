//! The per-callable wrapper that carries measurement around invocations.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::ERR_POISONED_LOCK;
use crate::executor::{IsolatedAttempt, Outcome, execute, execute_isolated};
use crate::pal::{Platform, PlatformFacade};
use crate::recursion::{CallableId, InFlightIsolated, RecursionGuard};
use crate::report::Measurement;
use crate::stats::Stats;

/// What kind of callable is being tracked.
///
/// The kind shapes presentation and isolation: method kinds hide their
/// receiver argument from display, and a bound method cannot move into an
/// isolated execution context because its receiver stays borrowed in the
/// current one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CallKind {
    /// A free function. The default.
    #[default]
    PlainFunction,

    /// A method invoked on a specific instance.
    BoundMethod,

    /// A method invoked on a type rather than an instance.
    ClassMethod,

    /// An associated function that takes no receiver.
    StaticMethod,
}

impl CallKind {
    /// Whether this kind of callable must not move into an isolated context.
    pub(crate) fn excludes_isolation(self) -> bool {
        matches!(self, Self::BoundMethod)
    }

    /// Whether the first display argument is a receiver to hide.
    pub(crate) fn hides_first_argument(self) -> bool {
        matches!(self, Self::BoundMethod | Self::ClassMethod)
    }
}

/// Configures how a tracked callable is measured and presented.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    verbose: bool,
    find_children: bool,
    isolate: bool,
    call_kind: CallKind,
}

impl Options {
    /// Creates the default options: compact output, no child discovery, no
    /// isolation, a plain function.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Itemized multi-line output instead of the compact line.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Also observe child processes spawned while the callable runs.
    #[must_use]
    pub fn with_find_children(mut self, find_children: bool) -> Self {
        self.find_children = find_children;
        self
    }

    /// Run the callable in a dedicated execution context so its footprint
    /// stands apart from the caller's.
    #[must_use]
    pub fn with_isolate(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    /// Declare what kind of callable is being tracked.
    #[must_use]
    pub fn with_call_kind(mut self, call_kind: CallKind) -> Self {
        self.call_kind = call_kind;
        self
    }

    pub(crate) fn verbose(self) -> bool {
        self.verbose
    }

    pub(crate) fn find_children(self) -> bool {
        self.find_children
    }

    pub(crate) fn isolate(self) -> bool {
        self.isolate
    }

    pub(crate) fn call_kind(self) -> CallKind {
        self.call_kind
    }
}

/// Rendered arguments of one invocation, recorded for presentation only.
///
/// Values are captured as display strings at the call site; the measurement
/// machinery never inspects them.
#[derive(Clone, Debug, Default)]
pub struct CallArgs {
    positional: Vec<String>,
    named: Vec<(String, String)>,
}

impl CallArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one positional argument.
    #[must_use]
    pub fn positional(mut self, value: impl fmt::Display) -> Self {
        self.positional.push(value.to_string());
        self
    }

    /// Appends one named argument.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.named.push((name.into(), value.to_string()));
        self
    }

    /// Whether no arguments have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Renders the arguments for display, hiding the receiver for method
    /// kinds.
    pub(crate) fn for_display(&self, kind: CallKind) -> String {
        let skip = usize::from(kind.hides_first_argument());

        let mut parts: Vec<String> = self.positional.iter().skip(skip).cloned().collect();
        parts.extend(
            self.named
                .iter()
                .map(|(name, value)| format!("{name}={value}")),
        );

        parts.join(", ")
    }
}

/// Wraps one callable so that invocations through it are measured.
///
/// You can obtain an instance via `Session::profile()`. Invoke the callable
/// through [`measure()`][Self::measure] or
/// [`measure_isolated()`][Self::measure_isolated]; the callable's return
/// value and panics pass through unchanged either way.
///
/// Clones represent the same tracked callable: they share recursion state,
/// so an invocation through one clone nested inside an invocation through
/// another still counts as re-entrant.
#[derive(Clone, Debug)]
pub struct ProfiledCall {
    name: String,
    options: Options,
    platform: PlatformFacade,
    guard: Arc<RecursionGuard>,
    in_flight_isolated: InFlightIsolated,
    measurements: Arc<Mutex<Vec<Measurement>>>,
    active: Arc<AtomicBool>,
}

impl ProfiledCall {
    pub(crate) fn new(
        name: String,
        options: Options,
        platform: PlatformFacade,
        id: CallableId,
        in_flight_isolated: InFlightIsolated,
        measurements: Arc<Mutex<Vec<Measurement>>>,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name,
            options,
            platform,
            guard: Arc::new(RecursionGuard::new(id)),
            in_flight_isolated,
            measurements,
            active,
        }
    }

    /// Name of the tracked callable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the callable with measurement around it.
    pub fn measure<T>(&self, f: impl FnOnce() -> T) -> T {
        self.measure_with_args(CallArgs::default(), f)
    }

    /// Invokes the callable with measurement around it, recording the given
    /// arguments for presentation.
    ///
    /// Re-entrant invocations run plainly; only the outermost invocation of
    /// this callable carries the measurement machinery and records a
    /// measurement. When the owning session is inactive the callable runs
    /// plainly as well.
    pub fn measure_with_args<T>(&self, args: CallArgs, f: impl FnOnce() -> T) -> T {
        if !self.active.load(Ordering::SeqCst) {
            return f();
        }

        if self.guard.enter(&self.in_flight_isolated, &self.name) {
            let _exit = scopeguard::guard(Arc::clone(&self.guard), |guard| guard.exit());
            return f();
        }

        // Runs even if the measurement machinery itself panics; a stuck
        // depth would demote every later invocation to the re-entrant path.
        let exit = scopeguard::guard(Arc::clone(&self.guard), |guard| guard.exit());
        let (outcome, stats) = execute(&self.platform, self.options.find_children(), f);
        drop(exit);

        self.finish(args, outcome, stats)
    }

    /// Invokes the callable in a dedicated execution context when the
    /// options ask for isolation, measuring only that context.
    ///
    /// Falls back to measuring in the current context when isolation is not
    /// requested, not applicable to the call kind, or could not be set up.
    /// The fallback only ever runs a callable that provably has not run.
    pub fn measure_isolated<T, F>(&self, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.measure_isolated_with_args(CallArgs::default(), f)
    }

    /// Like [`measure_isolated()`][Self::measure_isolated], recording the
    /// given arguments for presentation.
    pub fn measure_isolated_with_args<T, F>(&self, args: CallArgs, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if !self.active.load(Ordering::SeqCst) {
            return f();
        }

        if self.guard.enter(&self.in_flight_isolated, &self.name) {
            let _exit = scopeguard::guard(Arc::clone(&self.guard), |guard| guard.exit());
            return f();
        }

        // Runs even if the measurement machinery itself panics; a stuck
        // depth would demote every later invocation to the re-entrant path.
        let exit = scopeguard::guard(Arc::clone(&self.guard), |guard| guard.exit());

        if !self.options.isolate() || self.options.call_kind().excludes_isolation() {
            if self.options.isolate() {
                tracing::warn!(
                    callable = self.name,
                    "bound methods cannot move into an isolated context; \
                     measuring in the current context instead"
                );
            }

            let (outcome, stats) = execute(&self.platform, self.options.find_children(), f);
            drop(exit);

            return self.finish(args, outcome, stats);
        }

        let id = self.guard.id();
        self.in_flight_isolated.push(id);

        // Cleared on every exit path, including panic resumption.
        let slot = scopeguard::guard(
            (self.in_flight_isolated.clone(), id),
            |(in_flight, id)| in_flight.pop(id),
        );

        let (outcome, stats) =
            match execute_isolated(&self.platform, self.options.find_children(), f) {
                IsolatedAttempt::Delivered(measured) => measured,
                IsolatedAttempt::NotRun(f, error) => {
                    drop(slot);
                    tracing::warn!(
                        callable = self.name,
                        %error,
                        "isolation unavailable; measuring in the current context instead"
                    );

                    let (outcome, stats) =
                        execute(&self.platform, self.options.find_children(), f);
                    drop(exit);

                    return self.finish(args, outcome, stats);
                }
            };

        drop(slot);
        drop(exit);

        self.finish(args, outcome, stats)
    }

    /// Records and emits the measurement, then yields the callable's own
    /// outcome.
    ///
    /// A panicking invocation is resumed before anything is recorded: the
    /// caller sees the panic exactly as without measurement, and the report
    /// carries only completed invocations.
    fn finish<T>(&self, args: CallArgs, outcome: Outcome<T>, stats: Stats) -> T {
        let value = outcome.into_value();

        let measurement = Measurement::new(
            self.name.clone(),
            args,
            self.options.call_kind(),
            stats,
            self.platform.supports_io_counters(),
        );

        self.emit(&measurement);
        self.measurements
            .lock()
            .expect(ERR_POISONED_LOCK)
            .push(measurement);

        value
    }

    #[cfg_attr(test, mutants::skip)] // Too annoying to test stdout output.
    fn emit(&self, measurement: &Measurement) {
        if self.options.verbose() {
            println!("{}", measurement.verbose_to_string());
        } else {
            println!("{measurement}");
        }
    }
}
