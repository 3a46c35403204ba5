//! Detection of re-entrant invocations of a tracked callable.
//!
//! A tracked callable may call itself, directly or through other code. Only
//! the outermost invocation should carry the measurement machinery; inner
//! invocations run plainly, otherwise nested samplers would attribute the
//! same resource usage several times over.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::ERR_POISONED_LOCK;

/// Identifies one tracked callable within a session.
pub(crate) type CallableId = u64;

/// Records which callable, if any, is currently running in an isolated
/// execution context.
///
/// An isolated context is a different thread, so a thread-local depth
/// counter cannot see the outer invocation from inside it. This shared slot
/// closes that gap: the outer invocation publishes its identity before
/// handing off, and the inner one checks the slot before measuring.
#[derive(Clone, Debug, Default)]
pub(crate) struct InFlightIsolated {
    slot: Arc<Mutex<Option<CallableId>>>,
}

impl InFlightIsolated {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Publishes `id` as the callable currently running isolated.
    pub(crate) fn push(&self, id: CallableId) {
        *self.slot.lock().expect(ERR_POISONED_LOCK) = Some(id);
    }

    /// Clears the slot if it still belongs to `id`.
    ///
    /// Idempotent, and a no-op when another callable has since claimed the
    /// slot, so teardown paths may call it unconditionally.
    pub(crate) fn pop(&self, id: CallableId) {
        let mut slot = self.slot.lock().expect(ERR_POISONED_LOCK);

        if *slot == Some(id) {
            *slot = None;
        }
    }

    /// Whether `id` is currently running in an isolated context.
    pub(crate) fn contains(&self, id: CallableId) -> bool {
        *self.slot.lock().expect(ERR_POISONED_LOCK) == Some(id)
    }
}

/// Per-callable re-entrancy counter with a one-time diagnostic.
#[derive(Debug)]
pub(crate) struct RecursionGuard {
    id: CallableId,
    depth: AtomicUsize,
    warned: AtomicBool,
}

impl RecursionGuard {
    pub(crate) fn new(id: CallableId) -> Self {
        Self {
            id,
            depth: AtomicUsize::new(0),
            warned: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> CallableId {
        self.id
    }

    /// Registers entry into the callable and reports whether this entry is
    /// re-entrant.
    ///
    /// An entry is re-entrant when an outer invocation of the same callable
    /// is already running, either on this measurement path or inside an
    /// isolated execution context. The first re-entrant entry of each
    /// callable emits a warning; later ones stay silent.
    pub(crate) fn enter(&self, in_flight: &InFlightIsolated, name: &str) -> bool {
        let previous_depth = self.depth.fetch_add(1, Ordering::SeqCst);
        let recursive = previous_depth > 0 || in_flight.contains(self.id);

        if recursive && !self.warned.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                callable = name,
                "re-entrant invocation detected; only the outermost invocation is \
                 measured. If the recursion is intentional, track a non-recursive \
                 entry point that calls the recursive function instead."
            );
        }

        recursive
    }

    /// Registers that one entry has finished.
    pub(crate) fn exit(&self) {
        let result = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                depth.checked_sub(1)
            });

        debug_assert!(result.is_ok(), "exit without a matching enter");
    }

    /// Current nesting depth; zero when no invocation is in progress.
    pub(crate) fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}
