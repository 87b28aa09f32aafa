//! Configuration types for the inspection monitor.
//!
//! Every section has a `Default` impl carrying the production values, so a
//! partial JSON document only needs to name what it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// Environment variable selecting the run mode (`development` disables the monitor).
pub const ENV_MODE: &str = "INSPECT_GUARD_ENV";

/// Environment variable overriding the backend API base URL.
pub const ENV_API_URL: &str = "INSPECT_GUARD_API_URL";

/// Top-level monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Run mode. `Development` turns the whole monitor off.
    pub mode: RunMode,

    /// Passive detection settings.
    pub detector: DetectorConfig,

    /// Input interception settings.
    pub blocker: BlockerConfig,

    /// Trap controller settings.
    pub trap: TrapConfig,

    /// Lockdown settings.
    pub lockdown: LockdownConfig,

    /// Violation reporting settings.
    pub reporter: ReporterConfig,
}

/// Run mode of the hosting application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Monitor fully enabled.
    #[default]
    Production,
    /// Local development override: no subscriptions, no checks.
    Development,
}

/// Detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Polling cadence for the viewport and console checks.
    pub poll_interval_ms: u64,

    /// Frame-to-viewport difference (px) that must be exceeded to flag a docked panel.
    pub resize_threshold_px: i32,

    /// Enable the console accessor probe (engine-dependent, best-effort).
    pub console_probe: bool,

    /// Also run the viewport check on every resize signal.
    pub watch_resize_events: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            resize_threshold_px: 160,
            console_probe: true,
            watch_resize_events: true,
        }
    }
}

impl DetectorConfig {
    /// Returns the polling cadence as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Blocker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockerConfig {
    /// Treat a context-menu attempt as a violation instead of only suppressing it.
    pub context_menu_is_violation: bool,
}

/// Trap controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    /// Session store key of the persistence flag.
    pub persistence_key: String,

    /// Send a fresh report when an activation resumes an already-violated session.
    pub rereport_on_resume: bool,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            persistence_key: "security_violation".to_string(),
            rereport_on_resume: true,
        }
    }
}

/// How the lockdown ends the activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LockdownStrategy {
    /// Replace content once, then navigate away after a grace period.
    DelayedRedirect {
        /// Grace period before navigating (ms).
        grace_ms: u64,
    },
    /// Keep re-asserting the notice and navigating on a tight interval.
    RedrawLoop {
        /// Redraw cadence (ms).
        period_ms: u64,
    },
}

impl Default for LockdownStrategy {
    fn default() -> Self {
        Self::DelayedRedirect { grace_ms: 3000 }
    }
}

/// Lockdown configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockdownConfig {
    /// Strategy used after the notice is rendered.
    pub strategy: LockdownStrategy,

    /// Non-application location the activation ends at.
    pub neutral_location: String,
}

impl Default for LockdownConfig {
    fn default() -> Self {
        Self {
            strategy: LockdownStrategy::default(),
            neutral_location: "about:blank".to_string(),
        }
    }
}

/// Delivery strategy for violation reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Unload-surviving beacon supplied by the host.
    #[default]
    Beacon,
    /// Ordinary asynchronous HTTP request.
    Request,
}

/// Violation reporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Backend API base URL.
    pub api_base_url: String,

    /// Path of the violation-log endpoint below the base URL.
    pub path: String,

    /// Delivery strategy.
    pub delivery: Delivery,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            path: "/security/log".to_string(),
            delivery: Delivery::Beacon,
        }
    }
}

impl ReporterConfig {
    /// Full URL of the violation-log endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

impl GuardConfig {
    /// Parses a JSON configuration document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::ConfigParse`] on malformed JSON and
    /// [`GuardError::InvalidConfig`] when a value fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::ConfigIo`] if the file cannot be read, otherwise
    /// the same errors as [`from_json_str`](Self::from_json_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_MODE) {
            self.mode = if mode.trim().eq_ignore_ascii_case("development") {
                RunMode::Development
            } else {
                RunMode::Production
            };
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.reporter.api_base_url = url.trim().to_string();
        }
        self
    }

    /// Returns true if the development override disables the monitor.
    #[inline]
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.mode == RunMode::Development
    }

    /// Checks every value the monitor relies on.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.detector.poll_interval_ms == 0 {
            return Err(GuardError::invalid(
                "detector.poll_interval_ms",
                "must be non-zero",
            ));
        }
        if self.detector.resize_threshold_px < 0 {
            return Err(GuardError::invalid(
                "detector.resize_threshold_px",
                format!("must not be negative, got {}", self.detector.resize_threshold_px),
            ));
        }
        if self.trap.persistence_key.trim().is_empty() {
            return Err(GuardError::invalid("trap.persistence_key", "must not be empty"));
        }
        match self.lockdown.strategy {
            LockdownStrategy::DelayedRedirect { grace_ms: 0 } => {
                return Err(GuardError::invalid("lockdown.strategy.grace_ms", "must be non-zero"));
            }
            LockdownStrategy::RedrawLoop { period_ms: 0 } => {
                return Err(GuardError::invalid("lockdown.strategy.period_ms", "must be non-zero"));
            }
            _ => {}
        }
        if self.lockdown.neutral_location.trim().is_empty() {
            return Err(GuardError::invalid(
                "lockdown.neutral_location",
                "must not be empty",
            ));
        }
        let endpoint = self.reporter.endpoint();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(GuardError::invalid(
                "reporter.api_base_url",
                format!("expected an http(s) URL, got '{}'", self.reporter.api_base_url),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.mode, RunMode::Production);
        assert_eq!(config.detector.poll_interval_ms, 1000);
        assert_eq!(config.detector.resize_threshold_px, 160);
        assert_eq!(config.trap.persistence_key, "security_violation");
        assert_eq!(
            config.lockdown.strategy,
            LockdownStrategy::DelayedRedirect { grace_ms: 3000 }
        );
        assert_eq!(config.lockdown.neutral_location, "about:blank");
        assert!(!config.blocker.context_menu_is_violation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_join() {
        let mut reporter = ReporterConfig::default();
        assert_eq!(reporter.endpoint(), "http://localhost:3000/api/security/log");

        reporter.api_base_url = "https://portal.example/api/".to_string();
        assert_eq!(reporter.endpoint(), "https://portal.example/api/security/log");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GuardConfig::from_json_str(
            r#"{ "detector": { "poll_interval_ms": 250 },
                 "lockdown": { "strategy": { "kind": "redraw_loop", "period_ms": 50 } } }"#,
        )
        .unwrap();

        assert_eq!(config.detector.poll_interval_ms, 250);
        assert_eq!(config.detector.resize_threshold_px, 160);
        assert_eq!(
            config.lockdown.strategy,
            LockdownStrategy::RedrawLoop { period_ms: 50 }
        );
        assert_eq!(config.lockdown.neutral_location, "about:blank");
    }

    #[test]
    fn test_config_serialization() {
        let config = GuardConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: GuardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = GuardConfig::default();
        config.detector.poll_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(GuardError::InvalidConfig { field: "detector.poll_interval_ms", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_grace() {
        let mut config = GuardConfig::default();
        config.lockdown.strategy = LockdownStrategy::DelayedRedirect { grace_ms: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_endpoint() {
        let mut config = GuardConfig::default();
        config.reporter.api_base_url = "ftp://backend".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_MODE, "Development"),
            (ENV_API_URL, "https://api.example.edu"),
        ]
        .into_iter()
        .collect();

        let config = GuardConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| (*v).to_string()));

        assert!(config.is_disabled());
        assert_eq!(
            config.reporter.endpoint(),
            "https://api.example.edu/security/log"
        );
    }

    #[test]
    fn test_env_production_mode_reenables() {
        let mut config = GuardConfig::default();
        config.mode = RunMode::Development;
        let config = config.with_overrides_from(|k| (k == ENV_MODE).then(|| "production".to_string()));
        assert!(!config.is_disabled());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "mode": "development", "trap": {{ "rereport_on_resume": false }} }}"#).unwrap();

        let config = GuardConfig::from_file(file.path()).unwrap();
        assert!(config.is_disabled());
        assert!(!config.trap.rereport_on_resume);
        assert_eq!(config.trap.persistence_key, "security_violation");
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = GuardConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(GuardError::ConfigIo(_))));
    }
}
