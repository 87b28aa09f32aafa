//! # Inspection-Deterrence Monitor
//!
//! Runtime guard that watches a page for attempts to open developer or
//! inspection tooling, reports the attempt to a backend, and irreversibly
//! locks the page down.
//!
//! ## Threat Model
//!
//! The monitor is a deterrent, not a security boundary. Its heuristics are
//! probabilistic and environment-dependent, and a determined inspector can
//! defeat all of them. What it guarantees is its own behavior:
//!
//! - **At most one trap per activation** (idempotent guard)
//! - **Sticky sessions** (a flagged session re-enters lockdown on reload)
//! - **No way back** (`Violated` is terminal)
//! - **Reporting never gates lockdown** (fire-and-forget delivery)
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Host`] | Runtime capabilities (viewport, signals, timers, storage, render, navigation) |
//! | [`Detector`] | Viewport-gap and console-probe heuristics |
//! | [`Blocker`] | Inspector shortcut and context-menu interception |
//! | [`TrapController`] | Armed → Violated state machine |
//! | [`ViolationReporter`] | Best-effort report delivery |
//! | [`LockdownExecutor`] | Notice, scroll lock, exit to a neutral location |
//! | [`InspectionMonitor`] | One activation: wiring and teardown |
//! | [`SimulatedHost`] | Deterministic host with a virtual clock |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use guard_monitor::{BeaconReporter, GuardConfig, Host, InspectionMonitor, SimulatedHost};
//!
//! let host: Rc<dyn Host> = Rc::new(SimulatedHost::new());
//! let config = GuardConfig::default().with_env_overrides();
//! let reporter = Rc::new(BeaconReporter::new(host.clone(), config.reporter.endpoint()));
//!
//! let monitor = InspectionMonitor::activate(host, reporter, &config)?;
//! // ... the page runs; dropping the monitor detaches every listener.
//! drop(monitor);
//! # Ok::<(), guard_monitor::GuardError>(())
//! ```
//!
//! ## Security Notes
//!
//! - The persistence flag is only cleared by ending the session
//! - False-positive resizes (snapping, multi-monitor drags) lock the page too;
//!   this trade-off is accepted
//! - The development override disables everything and is a convenience, not
//!   a control

mod blocker;
mod config;
mod controller;
mod detector;
mod error;
mod host;
mod lockdown;
mod monitor;
mod reporter;
mod sim;

pub use blocker::{is_blocked_combo, Blocker};
pub use config::{
    BlockerConfig, Delivery, DetectorConfig, GuardConfig, LockdownConfig, LockdownStrategy,
    ReporterConfig, RunMode, TrapConfig, ENV_API_URL, ENV_MODE,
};
pub use controller::{MonitorState, TrapCause, TrapController, PERSISTENCE_VALUE};
pub use detector::{resize_anomaly, ConsoleProbe, DetectionEvent, Detector, SignalSink};
pub use error::{GuardError, Result};
pub use host::{
    ContextMenuEvent, EventHandler, Host, HostEvent, KeyEvent, SignalKind, SubscriptionId,
    TimerCallback, TimerId, Viewport,
};
pub use lockdown::{LockdownExecutor, VIOLATION_NOTICE};
pub use monitor::{ActivationOutcome, InspectionMonitor};
pub use reporter::{BeaconReporter, ViolationReport, ViolationReporter, VIOLATION_EVENT_TYPE};
pub use sim::{SimulatedHost, APP_CONTENT, APP_LOCATION};
