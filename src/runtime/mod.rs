// src/runtime/mod.rs
//
// =============================================================================
// ROBOGRAPH: RUNTIME ENGINE (v 0.1 )
// =============================================================================
//
// Orchestrates mission execution under a scenario.
//
// Pipeline:
// 1. Compile guard   - structural sanity of the mission.
// 2. Execute guard   - scenario preconditions.
// 3. Safety check    - policy evaluation (+ emergency handling on block).
// 4. Audit           - structured event on every block and completion.
// 5. Scheduler       - task id allocation, cooperative cancellation.
// 6. Monitor         - timing and event counts.
// 7. Workflow runner - the actual graph walk (runner.rs).
//
// The engine itself is synchronous; a caller that wants fire-and-forget
// semantics runs `execute` on a dedicated worker thread and cancels through
// the shared stop flag.

pub mod eval;
pub mod runner;

pub use runner::{RunnerOutcome, WorkflowRunner};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::auditlog::AuditLogWriter;
use crate::ir::{NodeKind, WorkflowIR};
use crate::robot::RobotAdapter;

// ============================================================================
// 1. SCENARIO & POLICY
// ============================================================================

/// Execution context handed in by the caller.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub target: String,
    pub robot_type: String,
    pub simulation_running: bool,
    pub safety_policy: SafetyPolicy,
    pub action_mapping: HashMap<String, String>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            target: "simulation".to_string(),
            robot_type: "go2".to_string(),
            simulation_running: false,
            safety_policy: SafetyPolicy::default(),
            action_mapping: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    pub max_loop_iterations: usize,
    pub require_robot_for_actions: bool,
    pub block_when_simulation_running: bool,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            max_loop_iterations: 100,
            require_robot_for_actions: false,
            block_when_simulation_running: true,
        }
    }
}

impl SafetyPolicy {
    /// Lenient construction from a JSON object; anything malformed falls
    /// back to defaults.
    pub fn from_json(data: &Value) -> Self {
        let defaults = Self::default();
        match data.as_object() {
            Some(obj) => Self {
                max_loop_iterations: obj
                    .get("max_loop_iterations")
                    .and_then(Value::as_u64)
                    .map(|v| v as usize)
                    .unwrap_or(defaults.max_loop_iterations),
                require_robot_for_actions: obj
                    .get("require_robot_for_actions")
                    .and_then(Value::as_bool)
                    .unwrap_or(defaults.require_robot_for_actions),
                block_when_simulation_running: obj
                    .get("block_when_simulation_running")
                    .and_then(Value::as_bool)
                    .unwrap_or(defaults.block_when_simulation_running),
            },
            None => defaults,
        }
    }
}

// ============================================================================
// 2. GUARDS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    pub ok: bool,
    pub reason: String,
}

impl GuardVerdict {
    fn pass() -> Self {
        Self {
            ok: true,
            reason: String::new(),
        }
    }

    fn block(reason: &str) -> Self {
        Self {
            ok: false,
            reason: reason.to_string(),
        }
    }
}

/// Lightweight structural checks before runtime execution.
pub struct CompileGuard;

impl CompileGuard {
    pub fn check(mission: &WorkflowIR) -> GuardVerdict {
        if mission.nodes.is_empty() {
            return GuardVerdict::block("nodes_missing");
        }
        GuardVerdict::pass()
    }
}

/// Scenario preconditions before execution begins.
pub struct ExecuteGuard;

impl ExecuteGuard {
    pub fn check(scenario: &Scenario) -> GuardVerdict {
        if scenario.simulation_running {
            return GuardVerdict::block("simulation_already_running");
        }
        if scenario.target != "simulation" && scenario.target != "hardware" {
            return GuardVerdict::block("scenario_target_invalid");
        }
        GuardVerdict::pass()
    }
}

// ============================================================================
// 3. SAFETY
// ============================================================================

/// Evaluate mission/scenario against the safety policy.
pub struct SafetyChecker;

impl SafetyChecker {
    pub fn check(
        mission: &WorkflowIR,
        scenario: &Scenario,
        policy: &SafetyPolicy,
        has_adapter: bool,
    ) -> GuardVerdict {
        if policy.block_when_simulation_running && scenario.simulation_running {
            return GuardVerdict::block("simulation_running");
        }
        if policy.require_robot_for_actions && has_action_nodes(mission) && !has_adapter {
            return GuardVerdict::block("robot_model_required");
        }
        GuardVerdict::pass()
    }
}

fn has_action_nodes(mission: &WorkflowIR) -> bool {
    mission
        .nodes
        .iter()
        .any(|n| matches!(n.kind, NodeKind::Action | NodeKind::Stop))
}

/// Emergency actions generated when a safety check fails.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyAction {
    pub action: String,
    pub reason: String,
}

pub struct EmergencyHandler;

impl EmergencyHandler {
    pub fn handle(reason: &str) -> EmergencyAction {
        let action = match reason {
            "simulation_running" | "simulation_already_running" => "abort",
            _ => "stop",
        };
        EmergencyAction {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// 4. AUDIT
// ============================================================================

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// In-memory audit store with an optional durable append-only sink.
pub struct AuditLogger {
    events: Vec<AuditEntry>,
    sink: Option<AuditLogWriter>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            sink: None,
        }
    }

    /// Attach a durable sink; every recorded event is also framed to disk.
    pub fn with_sink(mut self, sink: AuditLogWriter) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn record(&mut self, event_type: &str, payload: Value) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.append(event_type, payload.clone()) {
                log::warn!("Audit sink write failed: {e}");
            }
        }
        self.events.push(AuditEntry {
            event_type: event_type.to_string(),
            payload,
            timestamp: Utc::now(),
        });
    }

    pub fn events(&self) -> &[AuditEntry] {
        &self.events
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 5. SCHEDULER & MONITOR
// ============================================================================

struct TaskEntry {
    status: String,
    stop_flag: Arc<AtomicBool>,
}

/// Task bookkeeping. One task runs at a time in the current scope, but the
/// contract is id-based and cancellation is cooperative.
pub struct Scheduler {
    tasks: HashMap<String, TaskEntry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Allocate a task id bound to a stop flag the runner polls.
    pub fn schedule(&mut self, stop_flag: Arc<AtomicBool>) -> String {
        let task_id = Uuid::new_v4().to_string();
        self.tasks.insert(
            task_id.clone(),
            TaskEntry {
                status: "scheduled".to_string(),
                stop_flag,
            },
        );
        task_id
    }

    /// Request cooperative cancellation. Returns false for unknown ids.
    pub fn cancel(&mut self, task_id: &str) -> bool {
        match self.tasks.get_mut(task_id) {
            Some(entry) => {
                entry.status = "cancelled".to_string();
                entry.stop_flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn get_status(&self, task_id: &str) -> String {
        self.tasks
            .get(task_id)
            .map(|e| e.status.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn set_status(&mut self, task_id: &str, status: &str) {
        if let Some(entry) = self.tasks.get_mut(task_id) {
            if entry.status != "cancelled" {
                entry.status = status.to_string();
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime metrics collection.
#[derive(Debug, Default)]
pub struct Monitor {
    active: bool,
    started_at: Option<std::time::Instant>,
    events: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub active: bool,
    pub uptime_sec: f64,
    pub events: usize,
}

impl Monitor {
    pub fn start(&mut self) {
        self.active = true;
        self.started_at = Some(std::time::Instant::now());
        self.events = 0;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn bump_event(&mut self) {
        if self.active {
            self.events += 1;
        }
    }

    pub fn metrics(&self) -> Metrics {
        let uptime = match (self.active, self.started_at) {
            (true, Some(t)) => t.elapsed().as_secs_f64(),
            _ => 0.0,
        };
        Metrics {
            active: self.active,
            uptime_sec: (uptime * 1000.0).round() / 1000.0,
            events: self.events,
        }
    }
}

// ============================================================================
// 6. THE ENGINE
// ============================================================================

/// Result summary of one mission execution.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: String,
    pub phase: String,
    pub reason: String,
    pub task_id: Option<String>,
    pub node_count: usize,
    pub results: HashMap<String, Value>,
    pub metrics: Option<Metrics>,
    pub emergency: Option<EmergencyAction>,
}

impl RunReport {
    fn blocked(phase: &str, reason: &str) -> Self {
        Self {
            status: "blocked".to_string(),
            phase: phase.to_string(),
            reason: reason.to_string(),
            task_id: None,
            node_count: 0,
            results: HashMap::new(),
            metrics: None,
            emergency: None,
        }
    }
}

/// Executes a mission IR within a given scenario context.
pub struct RuntimeEngine {
    scheduler: Scheduler,
    monitor: Monitor,
    audit: AuditLogger,
    stop_flag: Arc<AtomicBool>,
    running: bool,
}

impl RuntimeEngine {
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            monitor: Monitor::default(),
            audit: AuditLogger::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            running: false,
        }
    }

    /// Route audit events into a durable log file as well.
    pub fn with_audit_sink(mut self, sink: AuditLogWriter) -> Self {
        self.audit = AuditLogger::new().with_sink(sink);
        self
    }

    /// Handle for cooperative cancellation from another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn scheduler(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn audit_events(&self) -> &[AuditEntry] {
        self.audit.events()
    }

    /// Execute `mission` under `scenario` and return a result summary.
    pub fn execute(
        &mut self,
        mission: &WorkflowIR,
        scenario: &Scenario,
        adapter: Option<&dyn RobotAdapter>,
    ) -> RunReport {
        let compile_check = CompileGuard::check(mission);
        if !compile_check.ok {
            self.audit
                .record("compile_blocked", json!({"reason": compile_check.reason}));
            return RunReport::blocked("compile", &compile_check.reason);
        }

        let execute_check = ExecuteGuard::check(scenario);
        if !execute_check.ok {
            self.audit
                .record("execute_blocked", json!({"reason": execute_check.reason}));
            return RunReport::blocked("execute", &execute_check.reason);
        }

        let policy = &scenario.safety_policy;
        let safety_check = SafetyChecker::check(mission, scenario, policy, adapter.is_some());
        if !safety_check.ok {
            let emergency = EmergencyHandler::handle(&safety_check.reason);
            self.audit.record(
                "safety_blocked",
                json!({
                    "reason": safety_check.reason,
                    "emergency": {"action": emergency.action, "reason": emergency.reason},
                }),
            );
            let mut report = RunReport::blocked("safety", &safety_check.reason);
            report.emergency = Some(emergency);
            return report;
        }

        self.running = true;
        self.stop_flag.store(false, Ordering::SeqCst);
        self.monitor.start();

        let task_id = self.scheduler.schedule(self.stop_flag.clone());
        self.scheduler.set_status(&task_id, "running");

        let runner = WorkflowRunner::new(policy.max_loop_iterations, self.stop_flag.clone());
        let outcome = runner.run(mission, adapter, &scenario.action_mapping);

        self.monitor.bump_event();
        let status = if outcome.cancelled {
            "cancelled"
        } else if outcome.ok {
            "success"
        } else {
            "failed"
        };
        self.scheduler
            .set_status(&task_id, if outcome.cancelled { "cancelled" } else { "completed" });
        self.audit.record(
            "execution_completed",
            json!({
                "task_id": task_id,
                "node_count": mission.nodes.len(),
                "status": status,
            }),
        );

        let metrics = self.monitor.metrics();
        self.monitor.stop();
        self.running = false;

        RunReport {
            status: status.to_string(),
            phase: "run".to_string(),
            reason: outcome.reason,
            task_id: Some(task_id),
            node_count: mission.nodes.len(),
            results: outcome.results,
            metrics: Some(metrics),
            emergency: None,
        }
    }
}

impl Default for RuntimeEngine {
    fn default() -> Self {
        Self::new()
    }
}
