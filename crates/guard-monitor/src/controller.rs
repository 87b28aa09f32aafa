//! # Trap Controller
//!
//! The monitor's state machine.
//!
//! ```text
//!            any signal (first winner)
//!   Armed ─────────────────────────────▶ Violated
//!     │                                     ▲
//!     └── persistence flag set at resume ───┘
//! ```
//!
//! ## Transition
//!
//! The first signal to win the guard, in order:
//! 1. hands a [`ViolationReport`] to the reporter (not awaited)
//! 2. sets the persistence flag in the session store
//! 3. engages the [`LockdownExecutor`]
//!
//! Every later signal is a no-op.
//!
//! ## Security Notes
//!
//! - The guard is a `Cell` owned by this instance and lives exactly as long
//!   as one activation. Callbacks on the host's loop never preempt each
//!   other, so check-and-set needs no lock.
//! - `Violated` is terminal. There is no method that re-arms.
//! - Reporter outcome is never observed, so a failed delivery cannot delay
//!   or undo the lockdown.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{info, warn};

use crate::config::TrapConfig;
use crate::detector::DetectionEvent;
use crate::host::Host;
use crate::lockdown::LockdownExecutor;
use crate::reporter::{ViolationReport, ViolationReporter};

/// Value written under the persistence key.
pub const PERSISTENCE_VALUE: &str = "true";

/// State of one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorState {
    /// Watching for violations.
    Armed,
    /// Trap fired. Terminal.
    Violated,
}

/// Why the controller entered `Violated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    /// A live signal during this activation.
    Detected(DetectionEvent),
    /// The persistence flag was already set when the activation started.
    Resumed,
}

/// Owns the state and idempotent guard of one activation.
pub struct TrapController {
    state: Cell<MonitorState>,
    cause: Cell<Option<TrapCause>>,
    host: Rc<dyn Host>,
    reporter: Rc<dyn ViolationReporter>,
    lockdown: LockdownExecutor,
    config: TrapConfig,
}

impl TrapController {
    /// Creates an armed controller.
    #[must_use]
    pub fn new(
        host: Rc<dyn Host>,
        reporter: Rc<dyn ViolationReporter>,
        lockdown: LockdownExecutor,
        config: TrapConfig,
    ) -> Self {
        Self {
            state: Cell::new(MonitorState::Armed),
            cause: Cell::new(None),
            host,
            reporter,
            lockdown,
            config,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state.get()
    }

    /// Returns true once the trap has fired.
    #[inline]
    #[must_use]
    pub fn is_violated(&self) -> bool {
        self.state.get() == MonitorState::Violated
    }

    /// What tripped the trap, if it has fired.
    #[must_use]
    pub fn cause(&self) -> Option<TrapCause> {
        self.cause.get()
    }

    /// Reads the persistence flag from the session store.
    #[must_use]
    pub fn persisted_violation(&self) -> bool {
        self.host
            .session_get(&self.config.persistence_key)
            .is_some_and(|v| v == PERSISTENCE_VALUE)
    }

    /// Feeds one detection signal. Returns true if this call fired the trap.
    pub fn signal(&self, event: DetectionEvent) -> bool {
        if !self.try_claim(TrapCause::Detected(event)) {
            return false;
        }
        warn!(trigger = %event, "Inspection attempt detected, trap fired");

        self.reporter.report(ViolationReport::for_event(event));
        self.host
            .session_set(&self.config.persistence_key, PERSISTENCE_VALUE);
        self.lockdown.engage();
        true
    }

    /// Re-enters `Violated` if the session already carries the persistence flag.
    ///
    /// Called once at activation, before any listener is subscribed. Returns
    /// true if the activation was resumed as violated.
    pub fn resume(&self) -> bool {
        if !self.persisted_violation() || !self.try_claim(TrapCause::Resumed) {
            return false;
        }
        info!("Session already flagged, resuming lockdown");

        if self.config.rereport_on_resume {
            self.reporter.report(ViolationReport::for_resumed_session());
        }
        self.lockdown.engage();
        true
    }

    fn try_claim(&self, cause: TrapCause) -> bool {
        if self.state.get() == MonitorState::Violated {
            return false;
        }
        self.state.set(MonitorState::Violated);
        self.cause.set(Some(cause));
        true
    }
}

impl fmt::Debug for TrapController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapController")
            .field("state", &self.state.get())
            .field("cause", &self.cause.get())
            .field("lockdown", &self.lockdown)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
