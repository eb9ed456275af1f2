//! Completion detection: one state machine, three signals.
//!
//! A run finishes through whichever of these fires first:
//!
//! 1. the middleware calls its continuation ([`Next::advance`]),
//! 2. the middleware calls a terminal [`Response`](crate::Response) method,
//! 3. the middleware future itself settles.
//!
//! Every signal funnels into the same complete-once transition, so the
//! decision is made exactly once and in exactly one place. The continuation
//! additionally tracks its own call count: advancing twice is a contract
//! violation and fails the run, while a terminal response method after
//! completion is merely ignored. That asymmetry is deliberate — ending a
//! response that already ended is harmless, calling `next` twice re-enters
//! the rest of a middleware chain.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::error::{BoxError, Error};

/// The post-completion check, pre-bound to the run's request and response.
pub(crate) type Check = Box<dyn FnOnce(Option<&BoxError>) -> Result<(), BoxError> + Send>;

// ── Completion state ──────────────────────────────────────────────────────────

/// Shared handle to one run's completion state.
///
/// Cloned into the [`Next`] continuation and into the terminal methods of the
/// run's [`Response`](crate::Response); the runner keeps one clone to
/// reconcile the outcome after the middleware future settles.
#[derive(Clone, Default)]
pub(crate) struct Completion {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    /// The run's error slot: seeded by setup, overwritten by the continuation,
    /// cleared by response termination.
    error: Option<BoxError>,
    done: bool,
    /// Continuation call tracking, separate from `done` on purpose.
    nexted: bool,
    double_next: bool,
    check: Option<Check>,
    check_failure: Option<BoxError>,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock means a check panicked mid-signal; the state itself
        // is still coherent, so keep going rather than compounding the panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn install_check(&self, check: Check) {
        self.state().check = Some(check);
    }

    pub(crate) fn seed_error(&self, error: BoxError) {
        self.state().error = Some(error);
    }

    pub(crate) fn take_error(&self) -> Option<BoxError> {
        self.state().error.take()
    }

    /// Signal 1: the continuation fired, with or without a forwarded error.
    pub(crate) fn next_signal(&self, error: Option<BoxError>) {
        let (check, current) = {
            let mut state = self.state();
            if state.nexted {
                debug!("continuation invoked a second time");
                state.double_next = true;
                return;
            }
            state.nexted = true;
            if state.done {
                trace!("continuation fired after the response already terminated; ignored");
                return;
            }
            state.done = true;
            (state.check.take(), error)
        };
        trace!(forwarded_error = current.is_some(), "run completed via continuation");
        self.finish(check, current);
    }

    /// Signal 2: a terminal response method fired. Always error-free.
    pub(crate) fn response_signal(&self, method: &'static str) {
        let check = {
            let mut state = self.state();
            if state.done {
                trace!(method, "terminal response method after completion; ignored");
                return;
            }
            state.done = true;
            state.error = None;
            state.check.take()
        };
        trace!(method, "run completed via response termination");
        self.finish(check, None);
    }

    /// Signal 3: the middleware future settled. Decides the run's result.
    ///
    /// Returns the final error slot on success, or the run's failure: a
    /// double continuation, an unhandled rejection, or a failing check
    /// (whose error is returned as-is, never wrapped).
    pub(crate) fn reconcile(
        &self,
        result: Result<(), BoxError>,
    ) -> Result<Option<BoxError>, BoxError> {
        if self.state().double_next {
            return Err(Box::new(Error::CalledMoreThanOnce));
        }
        if let Err(inner) = result {
            return Err(Box::new(Error::UnhandledRejection(inner)));
        }

        let (check, current) = {
            let mut state = self.state();
            if !state.done {
                // Plain resolution with no earlier signal counts as success,
                // retaining whatever the error slot holds (e.g. a setup seed).
                state.done = true;
                trace!("run completed via middleware resolution");
            }
            (state.check.take(), state.error.take())
        };
        if let Some(check) = check {
            check(current.as_ref())?;
        }
        if let Some(failure) = self.state().check_failure.take() {
            return Err(failure);
        }
        Ok(current)
    }

    /// Runs the check outside the lock (it may read the fakes, which have
    /// their own locks), then restores the error slot and records any failure.
    fn finish(&self, check: Option<Check>, current: Option<BoxError>) {
        let failure = check.and_then(|check| check(current.as_ref()).err());
        let mut state = self.state();
        state.error = current;
        if failure.is_some() {
            state.check_failure = failure;
        }
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The continuation handed to the middleware under test.
///
/// Calling [`advance`](Next::advance) is the middleware saying "I'm done,
/// hand over to the rest of the chain" — with `Some(error)` it forwards an
/// error the way a framework would route it to error-handling middleware.
/// `Next` is `Clone` so middleware can stash it in spawned work, but a run
/// may only ever be advanced once.
#[derive(Clone)]
pub struct Next {
    completion: Completion,
}

impl Next {
    pub(crate) fn new(completion: Completion) -> Self {
        Self { completion }
    }

    /// Completes the run: `None` for success, `Some(error)` to forward an
    /// error to the outcome.
    ///
    /// A second call does not complete anything; it marks the run as having
    /// violated the single-completion contract, and
    /// [`Runner::run`](crate::Runner::run) fails with
    /// [`Error::CalledMoreThanOnce`](crate::Error::CalledMoreThanOnce).
    pub fn advance(&self, error: Option<BoxError>) {
        self.completion.next_signal(error);
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}
