//! Scripted sessions replayed against the simulated host.

use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use guard_monitor::{
    BeaconReporter, Delivery, GuardConfig, Host, InspectionMonitor, KeyEvent, SimulatedHost,
    Viewport, ViolationReporter, PERSISTENCE_VALUE, VIOLATION_NOTICE,
};
use guard_reporter::HttpReporter;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A scripted browsing session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    /// Window geometry before the first step.
    #[serde(default)]
    pub viewport: Option<ViewportSpec>,
    /// Steps in order.
    pub steps: Vec<Step>,
}

/// Window geometry in a script.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewportSpec {
    pub outer_width: i32,
    pub outer_height: i32,
    pub inner_width: i32,
    pub inner_height: i32,
}

impl From<ViewportSpec> for Viewport {
    fn from(v: ViewportSpec) -> Self {
        Viewport::new(v.outer_width, v.outer_height, v.inner_width, v.inner_height)
    }
}

/// One scripted user or runtime action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    KeyDown {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        alt: bool,
        #[serde(default)]
        meta: bool,
    },
    ContextMenu,
    Resize(ViewportSpec),
    Advance {
        ms: u64,
    },
    Console {
        open: bool,
    },
    /// Reopen the application in the same session (new activation).
    Reload,
    Deactivate,
    EndSession,
}

/// One activation observed during the run.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationRecord {
    pub id: String,
    pub outcome: String,
    pub final_state: String,
}

/// What the run ended with.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub activations: Vec<ActivationRecord>,
    pub suppressed_inputs: usize,
    pub persistence_flag: bool,
    pub locked_down: bool,
    pub final_location: String,
    pub navigations: Vec<String>,
    pub beacons_sent: usize,
    pub elapsed_ms: u128,
}

/// Replays scripts against a fresh simulated session.
pub struct Simulation {
    sim: Rc<SimulatedHost>,
    config: GuardConfig,
    reporter: Rc<dyn ViolationReporter>,
    http: Option<Rc<HttpReporter>>,
    monitor: Option<InspectionMonitor>,
    activations: Vec<ActivationRecord>,
    suppressed_inputs: usize,
}

impl Simulation {
    /// Builds the host and reporter selected by `config`.
    pub fn new(config: GuardConfig) -> anyhow::Result<Self> {
        let sim = Rc::new(SimulatedHost::new());
        let host: Rc<dyn Host> = sim.clone();
        let endpoint = config.reporter.endpoint();

        let mut http = None;
        let reporter: Rc<dyn ViolationReporter> = match config.reporter.delivery {
            Delivery::Beacon => Rc::new(BeaconReporter::new(host, endpoint)),
            Delivery::Request => {
                let client = Rc::new(
                    HttpReporter::new(endpoint).context("building HTTP violation reporter")?,
                );
                http = Some(Rc::clone(&client));
                client
            }
        };

        Ok(Self {
            sim,
            config,
            reporter,
            http,
            monitor: None,
            activations: Vec::new(),
            suppressed_inputs: 0,
        })
    }

    /// Activates the monitor, runs every step, and settles pending reports.
    pub async fn run(mut self, script: &Script) -> anyhow::Result<Summary> {
        if let Some(viewport) = script.viewport {
            self.sim.set_viewport(viewport.into());
        }
        self.activate()?;

        for (index, step) in script.steps.iter().enumerate() {
            info!(step = index, ?step, "Replaying step");
            self.apply(step)?;
        }

        self.finish_activation();
        if let Some(http) = &self.http {
            http.settle().await;
        }
        Ok(self.summary())
    }

    fn apply(&mut self, step: &Step) -> anyhow::Result<()> {
        match step {
            Step::KeyDown {
                key,
                ctrl,
                shift,
                alt,
                meta,
            } => {
                let mut event = KeyEvent::new(key.clone());
                event.ctrl = *ctrl;
                event.shift = *shift;
                event.alt = *alt;
                event.meta = *meta;
                if self.sim.dispatch_keydown(event).is_default_prevented() {
                    self.suppressed_inputs += 1;
                }
            }
            Step::ContextMenu => {
                if self.sim.dispatch_context_menu().is_default_prevented() {
                    self.suppressed_inputs += 1;
                }
            }
            Step::Resize(viewport) => self.sim.resize_to((*viewport).into()),
            Step::Advance { ms } => self.sim.advance(Duration::from_millis(*ms)),
            Step::Console { open } => self.sim.set_console_open(*open),
            Step::Reload => {
                self.finish_activation();
                self.sim.reload();
                self.activate()?;
            }
            Step::Deactivate => {
                if let Some(monitor) = self.monitor.as_mut() {
                    monitor.deactivate();
                }
            }
            Step::EndSession => self.sim.end_session(),
        }
        Ok(())
    }

    fn activate(&mut self) -> anyhow::Result<()> {
        let host: Rc<dyn Host> = self.sim.clone();
        let monitor = InspectionMonitor::activate(host, Rc::clone(&self.reporter), &self.config)
            .context("activating inspection monitor")?;
        self.monitor = Some(monitor);
        Ok(())
    }

    fn finish_activation(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            self.activations.push(ActivationRecord {
                id: monitor.id().to_string(),
                outcome: format!("{:?}", monitor.outcome()),
                final_state: format!("{:?}", monitor.state()),
            });
        }
    }

    fn summary(&self) -> Summary {
        let flag = self
            .sim
            .session_value(&self.config.trap.persistence_key)
            .is_some_and(|v| v == PERSISTENCE_VALUE);
        let location = self.sim.location();
        Summary {
            activations: self.activations.clone(),
            suppressed_inputs: self.suppressed_inputs,
            persistence_flag: flag,
            locked_down: self.sim.content() == VIOLATION_NOTICE
                || location == self.config.lockdown.neutral_location,
            final_location: location,
            navigations: self.sim.navigations(),
            beacons_sent: self.sim.beacons().len(),
            elapsed_ms: self.sim.now().as_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Script {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_script() {
        let script = parse(
            r#"{ "steps": [
                { "action": "key_down", "key": "I", "ctrl": true, "shift": true },
                { "action": "context_menu" },
                { "action": "resize", "outer_width": 1400, "outer_height": 900,
                  "inner_width": 1000, "inner_height": 900 },
                { "action": "advance", "ms": 3000 },
                { "action": "reload" }
            ] }"#,
        );
        assert_eq!(script.steps.len(), 5);
        assert!(matches!(&script.steps[0], Step::KeyDown { key, ctrl: true, shift: true, .. } if key == "I"));
        assert!(matches!(script.steps[3], Step::Advance { ms: 3000 }));
    }

    #[tokio::test]
    async fn test_f12_session_summary() {
        let script = parse(
            r#"{ "steps": [
                { "action": "key_down", "key": "a" },
                { "action": "key_down", "key": "F12" },
                { "action": "advance", "ms": 3000 }
            ] }"#,
        );
        let summary = Simulation::new(GuardConfig::default())
            .unwrap()
            .run(&script)
            .await
            .unwrap();

        assert_eq!(summary.suppressed_inputs, 1);
        assert!(summary.persistence_flag);
        assert!(summary.locked_down);
        assert_eq!(summary.final_location, "about:blank");
        assert_eq!(summary.beacons_sent, 1);
        assert_eq!(summary.activations[0].final_state, "Violated");
    }

    #[tokio::test]
    async fn test_reload_resumes() {
        let script = parse(
            r#"{ "steps": [
                { "action": "key_down", "key": "u", "ctrl": true },
                { "action": "reload" }
            ] }"#,
        );
        let summary = Simulation::new(GuardConfig::default())
            .unwrap()
            .run(&script)
            .await
            .unwrap();

        assert_eq!(summary.activations.len(), 2);
        assert_eq!(summary.activations[1].outcome, "Resumed");
        assert_eq!(summary.beacons_sent, 2);
    }

    #[tokio::test]
    async fn test_quiet_session_stays_armed() {
        let script = parse(
            r#"{ "steps": [ { "action": "context_menu" }, { "action": "advance", "ms": 5000 } ] }"#,
        );
        let summary = Simulation::new(GuardConfig::default())
            .unwrap()
            .run(&script)
            .await
            .unwrap();

        assert_eq!(summary.suppressed_inputs, 1);
        assert!(!summary.persistence_flag);
        assert!(!summary.locked_down);
        assert_eq!(summary.activations[0].final_state, "Armed");
    }
}
