//! # Detector
//!
//! Passive observation of signals that correlate with an open inspector.
//!
//! ## Heuristics
//!
//! | Heuristic | Signal | Reliability |
//! |-----------|--------|-------------|
//! | Viewport gap | `outer - inner > threshold` on either axis | Docked panels only |
//! | Console probe | accessor read while formatting console output | Engine-dependent |
//!
//! Opening a docked inspector shrinks the usable viewport relative to the
//! window frame. The threshold is a heuristic: legitimate resizes, OS snapping
//! and multi-monitor drags can cross it too, and undocked inspectors never do.
//!
//! The console probe only fires in runtimes that eagerly evaluate accessor
//! properties when rendering logged objects. It is a secondary signal and is
//! never relied upon alone.
//!
//! ## Failure Model
//!
//! None. A missed signal is a false negative, not an error.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::DetectorConfig;
use crate::host::{Host, Viewport};

/// Signal that may trip the trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionEvent {
    /// Frame-to-viewport gap exceeded the threshold.
    ResizeAnomaly,
    /// The console probe's accessor was evaluated.
    ConsoleProbe,
    /// A blocked inspector key combination was pressed.
    BlockedKeyCombo,
    /// A context menu was requested (only when configured as a violation).
    ContextMenuAttempt,
}

impl DetectionEvent {
    /// Human-readable reason used in violation reports.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::ResizeAnomaly => "viewport shrank relative to the window frame",
            Self::ConsoleProbe => "console output was inspected",
            Self::BlockedKeyCombo => "developer tools shortcut pressed",
            Self::ContextMenuAttempt => "context menu requested",
        }
    }
}

impl fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResizeAnomaly => "resize_anomaly",
            Self::ConsoleProbe => "console_probe",
            Self::BlockedKeyCombo => "blocked_key_combo",
            Self::ContextMenuAttempt => "context_menu_attempt",
        };
        f.write_str(name)
    }
}

/// Destination for detection events.
pub type SignalSink = Rc<dyn Fn(DetectionEvent)>;

/// Returns true if either axis of `viewport` has a gap strictly greater than `threshold`.
#[inline]
#[must_use]
pub const fn resize_anomaly(viewport: &Viewport, threshold: i32) -> bool {
    viewport.width_gap() > threshold || viewport.height_gap() > threshold
}

/// Disposable object handed to diagnostic output.
///
/// Reading [`id`](Self::id) fires the callback, mimicking a getter that a
/// console evaluates when it renders the object.
pub struct ConsoleProbe {
    on_read: Box<dyn Fn()>,
}

impl ConsoleProbe {
    /// Creates a probe that calls `on_read` whenever its accessor is read.
    pub fn new(on_read: impl Fn() + 'static) -> Self {
        Self {
            on_read: Box::new(on_read),
        }
    }

    /// The trapped accessor.
    pub fn id(&self) -> &'static str {
        (self.on_read)();
        ""
    }
}

impl fmt::Debug for ConsoleProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Formatting must not read the accessor.
        f.debug_struct("ConsoleProbe").finish_non_exhaustive()
    }
}

/// Polling detector bound to one activation.
pub struct Detector {
    host: Weak<dyn Host>,
    threshold: i32,
    console_probe: bool,
}

impl Detector {
    /// Creates a detector reading from `host`.
    #[must_use]
    pub fn new(host: &Rc<dyn Host>, config: &DetectorConfig) -> Self {
        Self {
            host: Rc::downgrade(host),
            threshold: config.resize_threshold_px,
            console_probe: config.console_probe,
        }
    }

    /// Runs the viewport heuristic once.
    #[must_use]
    pub fn check_viewport(&self) -> Option<DetectionEvent> {
        let host = self.host.upgrade()?;
        resize_anomaly(&host.viewport(), self.threshold).then_some(DetectionEvent::ResizeAnomaly)
    }

    /// Logs a fresh probe to diagnostic output, then clears it.
    pub fn probe_console(&self, sink: &SignalSink) {
        let Some(host) = self.host.upgrade() else {
            return;
        };
        let sink = Rc::clone(sink);
        let probe = ConsoleProbe::new(move || sink(DetectionEvent::ConsoleProbe));
        host.log_diagnostic(&probe);
        host.clear_diagnostics();
    }

    /// One polling turn: viewport check, then the console probe if enabled.
    pub fn tick(&self, sink: &SignalSink) {
        if let Some(event) = self.check_viewport() {
            sink(event);
        }
        if self.console_probe {
            self.probe_console(sink);
        }
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("threshold", &self.threshold)
            .field("console_probe", &self.console_probe)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHost;
    use std::cell::RefCell;

    fn recording_sink() -> (SignalSink, Rc<RefCell<Vec<DetectionEvent>>>) {
        let seen: Rc<RefCell<Vec<DetectionEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let sink: SignalSink =
            Rc::new(move |event: DetectionEvent| seen_clone.borrow_mut().push(event));
        (sink, seen)
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(!resize_anomaly(&Viewport::new(1000, 800, 840, 800), 160));
        assert!(resize_anomaly(&Viewport::new(1000, 800, 839, 800), 160));
    }

    #[test]
    fn test_height_axis_alone_triggers() {
        assert!(resize_anomaly(&Viewport::new(1000, 800, 1000, 639), 160));
        assert!(!resize_anomaly(&Viewport::new(1000, 800, 1000, 640), 160));
    }

    #[test]
    fn test_check_viewport_reads_host() {
        let sim = Rc::new(SimulatedHost::new());
        let host: Rc<dyn Host> = sim.clone();
        let detector = Detector::new(&host, &DetectorConfig::default());

        assert_eq!(detector.check_viewport(), None);
        sim.set_viewport(Viewport::new(1400, 900, 1000, 900));
        assert_eq!(detector.check_viewport(), Some(DetectionEvent::ResizeAnomaly));
    }

    #[test]
    fn test_console_probe_only_fires_when_console_open() {
        let sim = Rc::new(SimulatedHost::new());
        let host: Rc<dyn Host> = sim.clone();
        let detector = Detector::new(&host, &DetectorConfig::default());
        let (sink, seen) = recording_sink();

        detector.tick(&sink);
        assert!(seen.borrow().is_empty());
        assert_eq!(sim.diagnostics_logged(), 1);

        sim.set_console_open(true);
        detector.tick(&sink);
        assert_eq!(*seen.borrow(), vec![DetectionEvent::ConsoleProbe]);
    }

    #[test]
    fn test_console_probe_disabled() {
        let sim = Rc::new(SimulatedHost::new());
        sim.set_console_open(true);
        let host: Rc<dyn Host> = sim.clone();
        let config = DetectorConfig {
            console_probe: false,
            ..DetectorConfig::default()
        };
        let detector = Detector::new(&host, &config);
        let (sink, seen) = recording_sink();

        detector.tick(&sink);
        assert!(seen.borrow().is_empty());
        assert_eq!(sim.diagnostics_logged(), 0);
    }

    #[test]
    fn test_probe_debug_does_not_read_accessor() {
        let reads = Rc::new(RefCell::new(0));
        let reads_clone = Rc::clone(&reads);
        let probe = ConsoleProbe::new(move || *reads_clone.borrow_mut() += 1);

        let _ = format!("{probe:?}");
        assert_eq!(*reads.borrow(), 0);
        let _ = probe.id();
        assert_eq!(*reads.borrow(), 1);
    }

    #[test]
    fn test_detector_after_host_dropped() {
        let host: Rc<dyn Host> = Rc::new(SimulatedHost::new());
        let detector = Detector::new(&host, &DetectorConfig::default());
        drop(host);
        assert_eq!(detector.check_viewport(), None);
    }
}
