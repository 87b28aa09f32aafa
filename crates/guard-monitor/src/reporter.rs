//! # Violation Reporter
//!
//! Best-effort, fire-and-forget delivery of a [`ViolationReport`].
//!
//! ## Contract
//!
//! - Exactly one delivery attempt per report, no retry
//! - [`ViolationReporter::report`] returns immediately and cannot fail
//! - Failures are logged locally and otherwise ignored
//! - The outcome is never observed by the trap controller
//!
//! Two strategies exist: [`BeaconReporter`] hands the payload to the host's
//! unload-surviving beacon, and `guard_reporter::HttpReporter` spawns an
//! ordinary HTTP request.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::detector::DetectionEvent;
use crate::host::Host;

/// Event type tag carried by every report.
pub const VIOLATION_EVENT_TYPE: &str = "DEV_TOOLS_VIOLATION";

const BASE_DESCRIPTION: &str = "User attempted to open Developer Tools or Inspector.";

/// Payload sent to the backend violation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Always [`VIOLATION_EVENT_TYPE`].
    pub event_type: String,
    /// Human-readable description.
    pub description: String,
}

impl ViolationReport {
    /// Builds the report for a fresh trap triggered by `event`.
    #[must_use]
    pub fn for_event(event: DetectionEvent) -> Self {
        Self::with_description(format!("{BASE_DESCRIPTION} Trigger: {}.", event.describe()))
    }

    /// Builds the report for an activation resuming an already-violated session.
    #[must_use]
    pub fn for_resumed_session() -> Self {
        Self::with_description(format!(
            "{BASE_DESCRIPTION} Trigger: violation persisted from earlier in this session."
        ))
    }

    fn with_description(description: String) -> Self {
        Self {
            event_type: VIOLATION_EVENT_TYPE.to_string(),
            description,
        }
    }
}

/// Sink for violation reports.
///
/// Implementations dispatch and return. They must never block, panic or
/// surface an error to the caller.
pub trait ViolationReporter {
    /// Attempts one delivery of `report`.
    fn report(&self, report: ViolationReport);
}

/// Delivers reports through the host's beacon primitive.
pub struct BeaconReporter {
    host: Rc<dyn Host>,
    endpoint: String,
}

impl BeaconReporter {
    /// Creates a reporter posting to `endpoint` through `host`.
    #[must_use]
    pub fn new(host: Rc<dyn Host>, endpoint: impl Into<String>) -> Self {
        Self {
            host,
            endpoint: endpoint.into(),
        }
    }

    /// Target URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ViolationReporter for BeaconReporter {
    fn report(&self, report: ViolationReport) {
        let body = match serde_json::to_string(&report) {
            Ok(body) => body,
            Err(e) => {
                error!("Security log failed: could not encode report: {}", e);
                return;
            }
        };
        if self.host.send_beacon(&self.endpoint, &body) {
            debug!("Violation report queued for {}", self.endpoint);
        } else {
            error!("Security log failed: beacon to {} was refused", self.endpoint);
        }
    }
}

impl fmt::Debug for BeaconReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeaconReporter")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHost;

    #[test]
    fn test_report_shape() {
        let report = ViolationReport::for_event(DetectionEvent::BlockedKeyCombo);
        assert_eq!(report.event_type, "DEV_TOOLS_VIOLATION");
        assert!(report.description.starts_with(BASE_DESCRIPTION));
        assert!(report.description.contains("shortcut"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["event_type"], "DEV_TOOLS_VIOLATION");
        assert!(json["description"].is_string());
    }

    #[test]
    fn test_resumed_report() {
        let report = ViolationReport::for_resumed_session();
        assert_eq!(report.event_type, VIOLATION_EVENT_TYPE);
        assert!(report.description.contains("persisted"));
    }

    #[test]
    fn test_beacon_delivery() {
        let sim = Rc::new(SimulatedHost::new());
        let reporter = BeaconReporter::new(sim.clone(), "http://localhost:3000/api/security/log");

        reporter.report(ViolationReport::for_event(DetectionEvent::ResizeAnomaly));

        let beacons = sim.beacons();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0].0, "http://localhost:3000/api/security/log");
        let sent: ViolationReport = serde_json::from_str(&beacons[0].1).unwrap();
        assert_eq!(sent.event_type, VIOLATION_EVENT_TYPE);
    }

    #[test]
    fn test_refused_beacon_is_swallowed() {
        let sim = Rc::new(SimulatedHost::new());
        sim.set_beacon_accepts(false);
        let reporter = BeaconReporter::new(sim.clone(), "http://unreachable.invalid/log");

        reporter.report(ViolationReport::for_event(DetectionEvent::ConsoleProbe));
        assert!(sim.beacons().is_empty());
    }
}
