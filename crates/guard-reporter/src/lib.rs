//! # HTTP Violation Reporter
//!
//! The "ordinary asynchronous request" delivery strategy for
//! [`guard_monitor::ViolationReporter`].
//!
//! ## Design
//!
//! [`HttpReporter::report`] spawns one POST onto the ambient Tokio runtime
//! and returns at once. The trap controller never sees the outcome:
//!
//! - success is logged at `debug`
//! - transport errors and non-2xx statuses are logged at `error`
//! - no retry, no timeout policy beyond the client's defaults
//! - with no runtime available the report is dropped and logged
//!
//! Deactivating the monitor does not cancel a delivery. Hosts that want to
//! give in-flight reports a chance before shutting down can await
//! [`HttpReporter::settle`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use guard_reporter::HttpReporter;
//!
//! let reporter = Rc::new(HttpReporter::new(config.reporter.endpoint())?);
//! let monitor = InspectionMonitor::activate(host, reporter.clone(), &config)?;
//! // ... page runs ...
//! reporter.settle().await;
//! ```

mod error;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use guard_monitor::{ViolationReport, ViolationReporter};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub use error::{ReporterError, Result};

/// Posts violation reports to the backend over HTTP.
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpReporter {
    /// Creates a reporter for `endpoint` with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::InvalidEndpoint`] unless `endpoint` is an
    /// http(s) URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Creates a reporter using a preconfigured client.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ReporterError::InvalidEndpoint(endpoint));
        }
        Ok(Self {
            client,
            endpoint,
            in_flight: Mutex::new(Vec::new()),
        })
    }

    /// Target URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of spawned deliveries that have not finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let tasks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Waits for every delivery spawned so far.
    pub async fn settle(&self) {
        let pending = {
            let mut tasks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for task in pending {
            if let Err(e) = task.await {
                warn!("Violation report task did not complete: {}", e);
            }
        }
    }

    /// Performs one delivery attempt and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::Http`] on transport failure and
    /// [`ReporterError::Status`] on a non-success response.
    pub async fn deliver(&self, report: &ViolationReport) -> Result<()> {
        post_report(&self.client, &self.endpoint, report).await
    }
}

async fn post_report(client: &reqwest::Client, endpoint: &str, report: &ViolationReport) -> Result<()> {
    let response = client.post(endpoint).json(report).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ReporterError::Status {
            status: status.as_u16(),
        });
    }
    Ok(())
}

impl ViolationReporter for HttpReporter {
    fn report(&self, report: ViolationReport) {
        let Ok(runtime) = Handle::try_current() else {
            error!("Security log failed: no async runtime, report dropped");
            return;
        };
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        let task = runtime.spawn(async move {
            match post_report(&client, &endpoint, &report).await {
                Ok(()) => debug!("Violation report delivered to {}", endpoint),
                Err(e) => error!("Security log failed: {}", e),
            }
        });

        let mut tasks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

impl fmt::Debug for HttpReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpReporter")
            .field("endpoint", &self.endpoint)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guard_monitor::DetectionEvent;

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(matches!(
            HttpReporter::new("file:///etc/passwd"),
            Err(ReporterError::InvalidEndpoint(_))
        ));
        assert!(HttpReporter::new("https://portal.example/api/security/log").is_ok());
    }

    #[test]
    fn test_report_without_runtime_is_dropped() {
        let reporter = HttpReporter::new("http://127.0.0.1:9/security/log").unwrap();
        reporter.report(ViolationReport::for_event(DetectionEvent::BlockedKeyCombo));
        assert_eq!(reporter.in_flight(), 0);
    }
}
