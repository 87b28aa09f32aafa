//! # Inspection Monitor
//!
//! One activation of the monitor: persistence check, listener wiring and
//! teardown.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 InspectionMonitor                   │
//! │  ┌──────────┐  ┌──────────┐                         │
//! │  │ Detector │  │ Blocker  │   signals               │
//! │  └────┬─────┘  └────┬─────┘                         │
//! │       └──────┬──────┘                               │
//! │              ▼                                      │
//! │      ┌───────────────┐     ┌──────────┐             │
//! │      │TrapController │────▶│ Reporter │ (no await)  │
//! │      └───────┬───────┘     └──────────┘             │
//! │              ▼                                      │
//! │      ┌───────────────┐                              │
//! │      │   Lockdown    │                              │
//! │      └───────────────┘                              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! - [`InspectionMonitor::activate`] checks the persistence flag first, then
//!   subscribes the blocker and starts the detector
//! - [`InspectionMonitor::deactivate`] (or drop) removes every subscription
//!   and the polling timer
//! - Deactivation never clears the persistence flag, never cancels lockdown
//!   timers and never cancels an in-flight report
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::time::Duration;
//! use guard_monitor::{
//!     BeaconReporter, GuardConfig, Host, InspectionMonitor, KeyEvent, MonitorState,
//!     SimulatedHost,
//! };
//!
//! let sim = Rc::new(SimulatedHost::new());
//! let host: Rc<dyn Host> = sim.clone();
//! let config = GuardConfig::default();
//! let reporter = Rc::new(BeaconReporter::new(host.clone(), config.reporter.endpoint()));
//!
//! let monitor = InspectionMonitor::activate(host, reporter, &config)?;
//! assert_eq!(monitor.state(), MonitorState::Armed);
//!
//! let key = sim.dispatch_keydown(KeyEvent::new("F12"));
//! assert!(key.is_default_prevented());
//! assert_eq!(monitor.state(), MonitorState::Violated);
//!
//! sim.advance(Duration::from_secs(3));
//! assert_eq!(sim.location(), "about:blank");
//! # Ok::<(), guard_monitor::GuardError>(())
//! ```

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info, info_span, Span};
use uuid::Uuid;

use crate::blocker::Blocker;
use crate::config::{BlockerConfig, DetectorConfig, GuardConfig};
use crate::controller::{MonitorState, TrapController};
use crate::detector::{DetectionEvent, Detector, SignalSink};
use crate::error::Result;
use crate::host::{EventHandler, Host, HostEvent, SignalKind, SubscriptionId, TimerCallback, TimerId};
use crate::lockdown::LockdownExecutor;
use crate::reporter::ViolationReporter;

/// How an activation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Development override: nothing subscribed, nothing checked.
    Disabled,
    /// Fresh session, watching for violations.
    Armed,
    /// Session already flagged, lockdown re-entered immediately.
    Resumed,
}

/// A live activation of the inspection monitor.
///
/// Not `Send`: it lives on the host's single-threaded loop.
pub struct InspectionMonitor {
    id: Uuid,
    span: Span,
    host: Rc<dyn Host>,
    controller: Rc<TrapController>,
    outcome: ActivationOutcome,
    subscriptions: Vec<SubscriptionId>,
    poll_timer: Option<TimerId>,
    active: bool,
}

impl InspectionMonitor {
    /// Starts an activation on `host`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidConfig`](crate::GuardError::InvalidConfig)
    /// if `config` fails validation. Nothing is subscribed in that case.
    pub fn activate(
        host: Rc<dyn Host>,
        reporter: Rc<dyn ViolationReporter>,
        config: &GuardConfig,
    ) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let span = info_span!("inspection_monitor", activation = %id);
        let _entered = span.enter();

        let lockdown = LockdownExecutor::new(&host, &config.lockdown);
        let controller = Rc::new(TrapController::new(
            Rc::clone(&host),
            reporter,
            lockdown,
            config.trap.clone(),
        ));

        let mut monitor = Self {
            id,
            span: span.clone(),
            host: Rc::clone(&host),
            controller,
            outcome: ActivationOutcome::Disabled,
            subscriptions: Vec::new(),
            poll_timer: None,
            active: false,
        };

        if config.is_disabled() {
            info!("Development override set, inspection monitor disabled");
            return Ok(monitor);
        }

        monitor.active = true;
        monitor.outcome = if monitor.controller.resume() {
            ActivationOutcome::Resumed
        } else {
            ActivationOutcome::Armed
        };

        let sink = monitor.signal_sink();
        monitor.subscribe_blocker(&host, &config.blocker, &sink);
        if monitor.outcome == ActivationOutcome::Armed {
            monitor.start_detector(&host, &config.detector, &sink);
        }

        info!(
            outcome = ?monitor.outcome,
            subscriptions = monitor.subscriptions.len(),
            "Inspection monitor activated"
        );
        Ok(monitor)
    }

    /// Removes every listener and stops polling. Idempotent.
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        let _entered = self.span.enter();
        for id in self.subscriptions.drain(..) {
            self.host.unsubscribe(id);
        }
        if let Some(timer) = self.poll_timer.take() {
            self.host.clear_timer(timer);
        }
        self.active = false;
        info!(state = ?self.controller.state(), "Inspection monitor deactivated");
    }

    /// Activation id used in log spans.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// How the activation started.
    #[must_use]
    pub const fn outcome(&self) -> ActivationOutcome {
        self.outcome
    }

    /// Current trap state.
    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.controller.state()
    }

    /// Returns true while listeners are attached.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// The activation's trap controller.
    #[must_use]
    pub fn controller(&self) -> &TrapController {
        &self.controller
    }

    fn signal_sink(&self) -> SignalSink {
        let controller = Rc::downgrade(&self.controller);
        Rc::new(move |event: DetectionEvent| {
            if let Some(controller) = controller.upgrade() {
                controller.signal(event);
            }
        })
    }

    fn subscribe_blocker(&mut self, host: &Rc<dyn Host>, config: &BlockerConfig, sink: &SignalSink) {
        let blocker = Rc::new(Blocker::new(config));

        let on_key: EventHandler = {
            let (blocker, sink, span) = (Rc::clone(&blocker), Rc::clone(sink), self.span.clone());
            Rc::new(move |event: &mut HostEvent| {
                let _entered = span.enter();
                if let HostEvent::KeyDown(key) = event {
                    if let Some(detection) = blocker.on_key(key) {
                        debug!(key = %key.key, "Blocked inspector shortcut");
                        sink(detection);
                    }
                }
            })
        };
        let on_context_menu: EventHandler = {
            let (sink, span) = (Rc::clone(sink), self.span.clone());
            Rc::new(move |event: &mut HostEvent| {
                let _entered = span.enter();
                if let HostEvent::ContextMenu(menu) = event {
                    if let Some(detection) = blocker.on_context_menu(menu) {
                        sink(detection);
                    }
                }
            })
        };

        self.subscriptions.push(host.subscribe(SignalKind::KeyDown, on_key));
        self.subscriptions
            .push(host.subscribe(SignalKind::ContextMenu, on_context_menu));
    }

    fn start_detector(&mut self, host: &Rc<dyn Host>, config: &DetectorConfig, sink: &SignalSink) {
        let detector = Rc::new(Detector::new(host, config));

        let tick: TimerCallback = {
            let (detector, sink, span) = (Rc::clone(&detector), Rc::clone(sink), self.span.clone());
            let controller: Weak<TrapController> = Rc::downgrade(&self.controller);
            Rc::new(move || {
                let armed = controller.upgrade().is_some_and(|c| !c.is_violated());
                if armed {
                    let _entered = span.enter();
                    detector.tick(&sink);
                }
            })
        };
        self.poll_timer = Some(host.set_interval(config.poll_interval(), tick));

        if config.watch_resize_events {
            let (sink, span) = (Rc::clone(sink), self.span.clone());
            let on_resize: EventHandler = Rc::new(move |event: &mut HostEvent| {
                if matches!(event, HostEvent::Resize) {
                    if let Some(detection) = detector.check_viewport() {
                        let _entered = span.enter();
                        sink(detection);
                    }
                }
            });
            self.subscriptions.push(host.subscribe(SignalKind::Resize, on_resize));
        }
        debug!(
            interval_ms = config.poll_interval_ms,
            threshold_px = config.resize_threshold_px,
            console_probe = config.console_probe,
            "Detector started"
        );
    }
}

impl fmt::Debug for InspectionMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InspectionMonitor")
            .field("id", &self.id)
            .field("outcome", &self.outcome)
            .field("controller", &self.controller)
            .field("subscriptions", &self.subscriptions)
            .field("poll_timer", &self.poll_timer)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Drop for InspectionMonitor {
    fn drop(&mut self) {
        self.deactivate();
    }
}
