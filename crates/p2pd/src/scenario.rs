// ── Scenario runner ──
//
// A scenario is a list of steps played against a `Supervisor` wrapped
// around the simulated engine. Every step yields one outcome; callback
// deliveries and bus signals are collected after each step once the
// event loop has settled.
//
// Handles are cached by interface name the first time they are needed,
// so an `op` after `interface_down` runs on the stale handle, the same
// way a remote client would.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use p2pd_core::model::{IfaceContext, ScanEntry};
use p2pd_core::sim::SimEngine;
use p2pd_core::{
    BusSignal, CallbackMessage, Event, InterfaceHandle, JoinOutcome, JoinTicket, Operation, Reply,
    StatusCode, StatusError, Supervisor, SupervisorConfig,
};

use crate::error::CliError;

// ── Scenario file ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Bring an interface up in the engine.
    InterfaceUp {
        name: String,
        #[serde(default)]
        management_only: bool,
        #[serde(default)]
        parent: Option<String>,
    },
    InterfaceDown {
        name: String,
    },
    /// Register a binding callback on the interface.
    Subscribe {
        iface: String,
    },
    Op {
        iface: String,
        operation: Operation,
        #[serde(default)]
        expect: Option<StatusCode>,
    },
    /// Answer the latest join scan on `iface`.
    ScanResults {
        iface: String,
        #[serde(default)]
        results: Vec<ScanEntry>,
    },
    Event {
        iface: String,
        event: Event,
    },
    /// Wait for the oldest pending join ticket to resolve.
    AwaitJoin {
        #[serde(default)]
        expect: Option<StatusCode>,
    },
    /// Cancel the oldest pending join ticket without waiting.
    CancelJoin,
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InterfaceUp { .. } => "interface_up",
            Self::InterfaceDown { .. } => "interface_down",
            Self::Subscribe { .. } => "subscribe",
            Self::Op { .. } => "op",
            Self::ScanResults { .. } => "scan_results",
            Self::Event { .. } => "event",
            Self::AwaitJoin { .. } => "await_join",
            Self::CancelJoin => "cancel_join",
        }
    }
}

/// Parse a scenario file; `.json` is read as JSON, anything else as YAML.
pub fn load(path: &Path) -> Result<Scenario, CliError> {
    let scenario_err = |reason: String| CliError::Scenario {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| scenario_err(e.to_string()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text).map_err(|e| scenario_err(e.to_string()))
    } else {
        serde_yaml::from_str(&text).map_err(|e| scenario_err(e.to_string()))
    }
}

// ── Report ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub steps: Vec<StepOutcome>,
    pub callbacks: Vec<CallbackMessage>,
    pub signals: Vec<BusSignal>,
}

impl Report {
    /// Outcomes whose status differs from what the step expected.
    pub fn mismatches(&self) -> usize {
        self.steps.iter().filter(|s| !s.matches()).count()
    }
}

#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iface: Option<String>,
    pub status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<StatusCode>,
}

impl StepOutcome {
    fn ok(detail: Option<serde_json::Value>) -> Self {
        Self {
            index: 0,
            step: "",
            iface: None,
            status: StatusCode::Success,
            detail,
            message: None,
            expected: None,
        }
    }

    fn failed(err: &StatusError) -> Self {
        Self {
            status: err.code(),
            message: Some(err.to_string()),
            ..Self::ok(None)
        }
    }

    pub fn matches(&self) -> bool {
        self.expected.is_none_or(|e| e == self.status)
    }
}

// ── Runner ───────────────────────────────────────────────────────────

pub struct Runner {
    engine: SimEngine,
    supervisor: Supervisor,
    handles: HashMap<String, Arc<InterfaceHandle>>,
    tickets: VecDeque<JoinTicket>,
    subscriptions: Vec<mpsc::UnboundedReceiver<CallbackMessage>>,
    signals: broadcast::Receiver<Arc<BusSignal>>,
    join_timeout: Duration,
    report: Report,
}

impl Runner {
    pub fn new(config: SupervisorConfig, join_timeout: Duration) -> Self {
        let engine = SimEngine::new();
        let supervisor = Supervisor::new(config, engine.clone());
        let signals = supervisor.bus_signals();
        Self {
            engine,
            supervisor,
            handles: HashMap::new(),
            tickets: VecDeque::new(),
            subscriptions: Vec::new(),
            signals,
            join_timeout,
            report: Report::default(),
        }
    }

    /// Play every step in order and return what happened.
    pub async fn run(mut self, steps: Vec<Step>) -> Result<Report, CliError> {
        self.supervisor.start().await?;

        for (i, step) in steps.into_iter().enumerate() {
            let index = i + 1;
            let kind = step.kind();
            debug!(index, step = kind, "running step");
            let iface = step_iface(&step);
            let mut outcome = self.step(index, step).await?;
            outcome.index = index;
            outcome.step = kind;
            outcome.iface = iface;
            self.supervisor.settle().await?;
            self.collect();
            self.report.steps.push(outcome);
        }

        self.supervisor.shutdown().await;
        self.collect();
        Ok(self.report)
    }

    #[allow(clippy::too_many_lines)]
    async fn step(&mut self, index: usize, step: Step) -> Result<StepOutcome, CliError> {
        let kind = step.kind();
        let outcome = match step {
            Step::InterfaceUp {
                name,
                management_only,
                parent,
            } => {
                self.engine.add_interface(IfaceContext {
                    name: name.clone(),
                    management_only,
                    parent,
                });
                self.supervisor.settle().await?;
                let handle = self.supervisor.interface(&name).ok_or_else(|| CliError::Step {
                    step: index,
                    kind,
                    reason: format!("interface {name} did not come up"),
                })?;
                self.handles.insert(name, handle);
                StepOutcome::ok(None)
            }
            Step::InterfaceDown { name } => {
                self.engine.remove_interface(&name);
                StepOutcome::ok(None)
            }
            Step::Subscribe { iface } => {
                let handle = self.handle(index, kind, &iface)?;
                match self.supervisor.subscribe(&handle).await {
                    Ok(rx) => {
                        self.subscriptions.push(rx);
                        StepOutcome::ok(None)
                    }
                    Err(e) => StepOutcome::failed(&e),
                }
            }
            Step::Op {
                iface,
                operation,
                expect,
            } => {
                let handle = self.handle(index, kind, &iface)?;
                let op = operation.name();
                let mut outcome = match self.supervisor.execute(&handle, operation).await {
                    Ok(Reply::JoinScheduled(ticket)) => {
                        let detail = serde_json::json!({ "join_id": ticket.id() });
                        self.tickets.push_back(ticket);
                        StepOutcome::ok(Some(detail))
                    }
                    Ok(Reply::Ok) => StepOutcome::ok(None),
                    Ok(reply) => StepOutcome::ok(serde_json::to_value(&reply).ok()),
                    Err(e) => StepOutcome::failed(&e),
                };
                let mut detail = serde_json::json!({ "op": op });
                if let (Some(extra), Some(map)) = (outcome.detail.take(), detail.as_object_mut()) {
                    map.insert("result".into(), extra);
                }
                outcome.detail = Some(detail);
                outcome.expected = expect;
                outcome
            }
            Step::ScanResults { iface, results } => {
                let work = self
                    .engine
                    .deliver_scan_results(&iface, results)
                    .ok_or_else(|| CliError::Step {
                        step: index,
                        kind,
                        reason: format!("no scan was issued on {iface}"),
                    })?;
                StepOutcome::ok(Some(serde_json::json!({ "work": work })))
            }
            Step::Event { iface, event } => {
                let name = event.name();
                self.engine.inject(&iface, event);
                StepOutcome::ok(Some(serde_json::json!({ "event": name })))
            }
            Step::AwaitJoin { expect } => {
                let ticket = self.tickets.pop_front().ok_or_else(|| CliError::Step {
                    step: index,
                    kind,
                    reason: "no join is pending".into(),
                })?;
                let id = ticket.id();
                let mut outcome = match tokio::time::timeout(self.join_timeout, ticket.wait()).await
                {
                    Ok(Ok(result)) => StepOutcome::ok(Some(serde_json::json!({
                        "join_id": id,
                        "outcome": join_outcome_name(result),
                    }))),
                    Ok(Err(e)) => StepOutcome::failed(&e),
                    Err(_) => {
                        return Err(CliError::Step {
                            step: index,
                            kind,
                            reason: format!(
                                "join {id} did not conclude within {}s",
                                self.join_timeout.as_secs()
                            ),
                        });
                    }
                };
                outcome.expected = expect;
                outcome
            }
            Step::CancelJoin => {
                let ticket = self.tickets.front().ok_or_else(|| CliError::Step {
                    step: index,
                    kind,
                    reason: "no join is pending".into(),
                })?;
                ticket.cancel();
                StepOutcome::ok(Some(serde_json::json!({ "join_id": ticket.id() })))
            }
        };
        Ok(outcome)
    }

    fn handle(
        &mut self,
        index: usize,
        kind: &'static str,
        iface: &str,
    ) -> Result<Arc<InterfaceHandle>, CliError> {
        if let Some(handle) = self.handles.get(iface) {
            return Ok(Arc::clone(handle));
        }
        // Group interfaces appear without an explicit `interface_up`.
        let handle = self
            .supervisor
            .interface(iface)
            .ok_or_else(|| CliError::Step {
                step: index,
                kind,
                reason: format!("unknown interface {iface}"),
            })?;
        self.handles.insert(iface.to_owned(), Arc::clone(&handle));
        Ok(handle)
    }

    fn collect(&mut self) {
        for rx in &mut self.subscriptions {
            while let Ok(message) = rx.try_recv() {
                self.report.callbacks.push(message);
            }
        }

        loop {
            match self.signals.try_recv() {
                Ok(signal) => self.report.signals.push((*signal).clone()),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "bus signal capture fell behind");
                }
                Err(_) => break,
            }
        }
    }
}

fn step_iface(step: &Step) -> Option<String> {
    match step {
        Step::InterfaceUp { name, .. } | Step::InterfaceDown { name } => Some(name.clone()),
        Step::Subscribe { iface }
        | Step::Op { iface, .. }
        | Step::ScanResults { iface, .. }
        | Step::Event { iface, .. } => Some(iface.clone()),
        Step::AwaitJoin { .. } | Step::CancelJoin => None,
    }
}

fn join_outcome_name(outcome: JoinOutcome) -> &'static str {
    match outcome {
        JoinOutcome::Joined => "joined",
        JoinOutcome::Cancelled => "cancelled",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const JOIN: &str = r#"
description: join an existing group
steps:
  - step: interface_up
    name: p2p0
  - step: subscribe
    iface: p2p0
  - step: op
    iface: p2p0
    operation:
      op: add_group_with_config
      ssid_text: MyNet
      passphrase: "12345678"
      peer: "00:11:22:33:44:55"
      join_existing_group: true
  - step: scan_results
    iface: p2p0
    results:
      - bssid: "00:11:22:33:44:55"
        ssid: MyNet
        freq: 2437
  - step: await_join
    expect: SUCCESS
"#;

    fn runner() -> Runner {
        Runner::new(SupervisorConfig::default(), Duration::from_secs(2))
    }

    fn parse(text: &str) -> Scenario {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn parses_every_step_kind() {
        let scenario = parse(
            r#"
steps:
  - { step: interface_up, name: wlan0 }
  - { step: interface_up, name: p2p-dev-wlan0, management_only: true, parent: wlan0 }
  - { step: interface_down, name: wlan0 }
  - { step: subscribe, iface: p2p0 }
  - { step: op, iface: p2p0, operation: { op: find, timeout_secs: 10 }, expect: SUCCESS }
  - { step: scan_results, iface: p2p0 }
  - { step: event, iface: p2p0, event: { event: interface_added } }
  - { step: await_join }
  - { step: cancel_join }
"#,
        );
        let kinds: Vec<_> = scenario.steps.iter().map(Step::kind).collect();
        assert_eq!(
            kinds,
            [
                "interface_up",
                "interface_up",
                "interface_down",
                "subscribe",
                "op",
                "scan_results",
                "event",
                "await_join",
                "cancel_join",
            ]
        );
    }

    #[tokio::test]
    async fn join_scenario_reports_every_step() {
        let scenario = parse(JOIN);
        let report = runner().run(scenario.steps).await.unwrap();

        assert_eq!(report.steps.len(), 5);
        assert!(report.steps.iter().all(|s| s.status == StatusCode::Success));
        assert_eq!(report.mismatches(), 0);

        let last = report.steps.last().unwrap();
        assert_eq!(last.step, "await_join");
        assert_eq!(last.detail.as_ref().unwrap()["outcome"], "joined");
        assert!(!report.signals.is_empty());
    }

    #[tokio::test]
    async fn stale_handle_is_rejected_after_interface_down() {
        let scenario = parse(
            r#"
steps:
  - { step: interface_up, name: p2p0 }
  - { step: interface_down, name: p2p0 }
  - { step: op, iface: p2p0, operation: { op: get_name }, expect: FAILURE_IFACE_INVALID }
"#,
        );
        let report = runner().run(scenario.steps).await.unwrap();
        assert_eq!(report.steps[2].status, StatusCode::FailureIfaceInvalid);
        assert_eq!(report.mismatches(), 0);
    }

    #[tokio::test]
    async fn expectation_mismatch_is_counted() {
        let scenario = parse(
            r#"
steps:
  - { step: interface_up, name: p2p0 }
  - { step: op, iface: p2p0, operation: { op: get_name }, expect: FAILURE_UNKNOWN }
"#,
        );
        let report = runner().run(scenario.steps).await.unwrap();
        assert_eq!(report.mismatches(), 1);
    }

    #[tokio::test]
    async fn cancelled_join_resolves_as_cancelled() {
        let scenario = parse(
            r#"
steps:
  - { step: interface_up, name: p2p0 }
  - step: op
    iface: p2p0
    operation: { op: add_group_with_config, ssid_text: MyNet, passphrase: "12345678", join_existing_group: true }
  - { step: cancel_join }
  - { step: await_join }
"#,
        );
        let report = runner().run(scenario.steps).await.unwrap();
        let last = report.steps.last().unwrap();
        assert_eq!(last.detail.as_ref().unwrap()["outcome"], "cancelled");
    }

    #[tokio::test]
    async fn unknown_interface_is_a_step_error() {
        let scenario = parse("steps: [{ step: subscribe, iface: nope0 }]");
        let err = runner().run(scenario.steps).await.unwrap_err();
        assert!(matches!(err, CliError::Step { step: 1, kind: "subscribe", .. }));
    }
}
