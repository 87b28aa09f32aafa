//! # Lockdown Executor
//!
//! Irreversible replacement of the page after a trap.
//!
//! The notice is rendered and scrolling disabled synchronously. The
//! configured [`LockdownStrategy`] then ends the activation at the neutral
//! location, either after a grace period or from a tight redraw loop.
//!
//! ## Security Notes
//!
//! - Engages at most once per executor
//! - Timers it schedules are owned by the host, not by the monitor's
//!   listener set, so deactivation cannot cancel them

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{LockdownConfig, LockdownStrategy};
use crate::host::{Host, TimerCallback};

/// Fixed, non-interactive replacement content.
pub const VIOLATION_NOTICE: &str = "<h1 style='text-align:center; margin-top:20%; \
font-family:sans-serif;'>SECURITY VIOLATION DETECTED</h1>";

/// Performs the lockdown for one activation.
#[derive(Debug)]
pub struct LockdownExecutor {
    host: Weak<dyn Host>,
    strategy: LockdownStrategy,
    neutral_location: String,
    engaged: Cell<bool>,
}

impl LockdownExecutor {
    /// Creates an executor acting on `host`.
    #[must_use]
    pub fn new(host: &Rc<dyn Host>, config: &LockdownConfig) -> Self {
        Self {
            host: Rc::downgrade(host),
            strategy: config.strategy,
            neutral_location: config.neutral_location.clone(),
            engaged: Cell::new(false),
        }
    }

    /// Returns true once [`engage`](Self::engage) has run.
    #[inline]
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged.get()
    }

    /// Renders the notice, disables scrolling and schedules the exit.
    ///
    /// Later calls are no-ops.
    pub fn engage(&self) {
        if self.engaged.replace(true) {
            return;
        }
        let Some(host) = self.host.upgrade() else {
            warn!("Lockdown requested after the host was torn down");
            return;
        };

        host.replace_content(VIOLATION_NOTICE);
        host.disable_scroll();

        match self.strategy {
            LockdownStrategy::DelayedRedirect { grace_ms } => {
                info!(
                    "Lockdown engaged, leaving for {} in {} ms",
                    self.neutral_location, grace_ms
                );
                host.set_timeout(Duration::from_millis(grace_ms), self.exit_callback(false));
            }
            LockdownStrategy::RedrawLoop { period_ms } => {
                info!(
                    "Lockdown engaged, redrawing every {} ms until {}",
                    period_ms, self.neutral_location
                );
                host.set_interval(Duration::from_millis(period_ms), self.exit_callback(true));
            }
        }
    }

    fn exit_callback(&self, redraw: bool) -> TimerCallback {
        let host = Weak::clone(&self.host);
        let location = self.neutral_location.clone();
        Rc::new(move || {
            let Some(host) = host.upgrade() else {
                return;
            };
            if redraw {
                host.replace_content(VIOLATION_NOTICE);
            }
            host.navigate(&location);
        })
    }
}
