// src/runtime/runner.rs
//
// =============================================================================
// ROBOGRAPH: WORKFLOW RUNNER (v 0.1 )
// =============================================================================
//
// Walks a validated WorkflowIR as a flow graph against a robot adapter.
//
// Responsibilities:
// 1. Build the execution DAG (petgraph) from nodes + edges.
// 2. Drive entry nodes depth-first along flow_out, with logic nodes picking
//    branches and loops re-entering their body subtree.
// 3. Cache comparison results for condition ports.
// 4. Poll the cooperative stop flag between nodes and loop iterations.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ir::{EdgeType, IRNode, NodeKind, ParamValue, WorkflowIR};
use crate::robot::RobotAdapter;
use crate::runtime::eval;

/// Wire metadata carried on each graph edge.
#[derive(Debug, Clone)]
struct Wire {
    from_port: String,
    to_port: String,
    edge_type: EdgeType,
}

/// Summary of one run.
#[derive(Debug, Clone)]
pub struct RunnerOutcome {
    pub ok: bool,
    pub reason: String,
    pub results: HashMap<String, Value>,
    pub executed_count: usize,
    pub cancelled: bool,
}

/// Execute workflow graphs with control-flow support.
pub struct WorkflowRunner {
    pub max_loop_iterations: usize,
    stop_flag: Arc<AtomicBool>,
}

impl WorkflowRunner {
    pub fn new(max_loop_iterations: usize, stop_flag: Arc<AtomicBool>) -> Self {
        Self {
            max_loop_iterations,
            stop_flag,
        }
    }

    /// Run the workflow and return a result summary.
    pub fn run(
        &self,
        ir: &WorkflowIR,
        adapter: Option<&dyn RobotAdapter>,
        action_mapping: &HashMap<String, String>,
    ) -> RunnerOutcome {
        if ir.nodes.is_empty() {
            return RunnerOutcome {
                ok: false,
                reason: "no_nodes".to_string(),
                results: HashMap::new(),
                executed_count: 0,
                cancelled: false,
            };
        }

        let mut walk = Walk::new(ir, adapter, action_mapping, self);

        let entry_ids: Vec<String> = ir.entry_nodes().iter().map(|n| n.id.clone()).collect();
        for entry_id in entry_ids {
            if let Some(&idx) = walk.id_map.get(entry_id.as_str()) {
                walk.execute_node(idx);
            }
        }

        RunnerOutcome {
            ok: true,
            reason: String::new(),
            results: walk.results,
            executed_count: walk.executed_count,
            cancelled: walk.cancelled,
        }
    }
}

// ============================================================================
// THE WALK
// ============================================================================

struct Walk<'a> {
    graph: DiGraph<&'a IRNode, Wire>,
    id_map: HashMap<&'a str, NodeIndex>,
    adapter: Option<&'a dyn RobotAdapter>,
    action_mapping: &'a HashMap<String, String>,
    stop_flag: &'a Arc<AtomicBool>,
    max_loop_iterations: usize,

    executed: HashSet<NodeIndex>,
    results: HashMap<String, Value>,
    executed_count: usize,
    cancelled: bool,
}

impl<'a> Walk<'a> {
    fn new(
        ir: &'a WorkflowIR,
        adapter: Option<&'a dyn RobotAdapter>,
        action_mapping: &'a HashMap<String, String>,
        runner: &'a WorkflowRunner,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut id_map: HashMap<&str, NodeIndex> = HashMap::new();

        for node in &ir.nodes {
            let idx = graph.add_node(node);
            id_map.insert(node.id.as_str(), idx);
        }
        for edge in &ir.edges {
            if let (Some(&from), Some(&to)) = (
                id_map.get(edge.from_node.as_str()),
                id_map.get(edge.to_node.as_str()),
            ) {
                graph.add_edge(
                    from,
                    to,
                    Wire {
                        from_port: edge.from_port.clone(),
                        to_port: edge.to_port.clone(),
                        edge_type: edge.edge_type,
                    },
                );
            }
        }

        Self {
            graph,
            id_map,
            adapter,
            action_mapping,
            stop_flag: &runner.stop_flag,
            max_loop_iterations: runner.max_loop_iterations,
            executed: HashSet::new(),
            results: HashMap::new(),
            executed_count: 0,
            cancelled: false,
        }
    }

    fn stop_requested(&mut self) -> bool {
        if self.stop_flag.load(Ordering::SeqCst) {
            self.cancelled = true;
            return true;
        }
        false
    }

    /// Targets of a named output port.
    fn port_targets(&self, idx: NodeIndex, port: &str) -> Vec<NodeIndex> {
        self.graph
            .edges(idx)
            .filter(|e| e.weight().from_port == port)
            .map(|e| e.target())
            .collect()
    }

    fn execute_node(&mut self, idx: NodeIndex) {
        if self.stop_requested() || self.executed.contains(&idx) {
            return;
        }

        self.executed.insert(idx);
        self.executed_count += 1;
        let node = self.graph[idx];
        log::info!(
            "Executing node: {} (ID: {}, Kind: {})",
            node.schema_id,
            node.id,
            node.kind.as_str()
        );

        match node.kind {
            NodeKind::Logic => {
                self.execute_logic(idx);
            }
            NodeKind::Comparison => {
                let result = self.execute_comparison(idx);
                self.results.insert(node.id.clone(), result);
            }
            NodeKind::Action => {
                let action = node.param_str("action", "stand");
                let action = self
                    .action_mapping
                    .get(&action)
                    .cloned()
                    .unwrap_or(action);
                if let Some(adapter) = self.adapter {
                    log::info!("Executing action: {action}");
                    let ok = adapter.run_action(&action, &json!({}));
                    let status = if ok { "success" } else { "failed" };
                    self.results.insert(
                        node.id.clone(),
                        json!({"status": status, "action": action}),
                    );
                } else {
                    log::debug!("No adapter configured; action '{action}' not dispatched");
                }
                self.follow_flow(idx);
            }
            NodeKind::Stop => {
                if let Some(adapter) = self.adapter {
                    adapter.stop();
                }
                self.results
                    .insert(node.id.clone(), json!({"status": "stopped"}));
                self.follow_flow(idx);
            }
            NodeKind::Sensor => {
                if let Some(adapter) = self.adapter {
                    let data = adapter.get_sensor_data();
                    self.results
                        .insert(node.id.clone(), json!({"data": Value::Object(data)}));
                }
                self.follow_flow(idx);
            }
            NodeKind::Timer => {
                let duration = node
                    .param_value("duration")
                    .and_then(ParamValue::as_f64)
                    .unwrap_or(1.0);
                let duration = if node.param_str("unit", "seconds") == "milliseconds" {
                    duration / 1000.0
                } else {
                    duration
                };
                if duration > 0.0 && !self.stop_requested() {
                    std::thread::sleep(std::time::Duration::from_secs_f64(duration));
                }
                self.follow_flow(idx);
            }
            NodeKind::Variable => {
                let value = node
                    .param_value("initial_value")
                    .cloned()
                    .unwrap_or(ParamValue::Int(0));
                self.results.insert(
                    node.id.clone(),
                    json!({"value": serde_json::to_value(&value).unwrap_or(Value::Null)}),
                );
                self.follow_flow(idx);
            }
            NodeKind::Math => {
                let result = self.execute_math(idx);
                self.results.insert(node.id.clone(), result);
                self.follow_flow(idx);
            }
            NodeKind::Opaque | NodeKind::Custom => {
                log::debug!("Skipping non-executable node {}", node.id);
                self.results
                    .insert(node.id.clone(), json!({"status": "skipped"}));
                self.follow_flow(idx);
            }
        }
    }

    fn follow_flow(&mut self, idx: NodeIndex) {
        for target in self.port_targets(idx, "flow_out") {
            self.execute_node(target);
        }
    }

    // ------------------------------------------------------------------
    // Logic control
    // ------------------------------------------------------------------

    fn execute_logic(&mut self, idx: NodeIndex) {
        let node = self.graph[idx];

        if node.schema_id == "builtin.while_loop" {
            self.execute_loop(idx);
            return;
        }

        // Conditional branch (builtin.if and custom logic alike).
        let condition_result = self.evaluate_condition(idx);
        log::debug!("If condition evaluated to: {condition_result}");
        let branch = if condition_result { "out_if" } else { "out_else" };
        for target in self.port_targets(idx, branch) {
            self.execute_node(target);
        }
    }

    fn execute_loop(&mut self, idx: NodeIndex) {
        let node = self.graph[idx];
        let loop_type = node.param_str("loop_type", "while");

        if loop_type == "for" {
            let start = param_i64(node, "for_start", 0);
            let end = param_i64(node, "for_end", 10);
            let step = param_i64(node, "for_step", 1);

            if step == 0 {
                log::warn!("For loop with zero step; skipping body");
            } else {
                log::debug!("For loop: range({start}, {end}, {step})");
                let mut i = start;
                while (step > 0 && i < end) || (step < 0 && i > end) {
                    if self.stop_requested() {
                        break;
                    }
                    self.results
                        .insert(format!("{}_i", node.id), json!(i));
                    self.replay_body(idx);
                    i += step;
                }
            }
        } else {
            let mut iteration = 0;
            while iteration < self.max_loop_iterations {
                if self.stop_requested() || !self.evaluate_condition(idx) {
                    break;
                }
                self.replay_body(idx);
                iteration += 1;
            }
            if iteration >= self.max_loop_iterations {
                log::warn!(
                    "While loop exceeded max iterations ({})",
                    self.max_loop_iterations
                );
            }
        }

        for target in self.port_targets(idx, "loop_end") {
            self.execute_node(target);
        }
    }

    /// One loop iteration: clear the body subtree from the executed set,
    /// then run it again.
    fn replay_body(&mut self, idx: NodeIndex) {
        let body_targets = self.port_targets(idx, "loop_body");
        for &target in &body_targets {
            for member in self.flow_subtree(target) {
                self.executed.remove(&member);
            }
        }
        for target in body_targets {
            self.execute_node(target);
        }
    }

    /// Nodes reachable from `start` along flow edges.
    fn flow_subtree(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            for edge in self.graph.edges(idx) {
                if edge.weight().edge_type == EdgeType::Flow {
                    stack.push(edge.target());
                }
            }
        }
        seen.into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Conditions & data producers
    // ------------------------------------------------------------------

    /// Evaluation order: connected comparison result first, then the raw
    /// condition_expr in the restricted namespace. Only the first incoming
    /// condition source counts; failures come back false.
    fn evaluate_condition(&mut self, idx: NodeIndex) -> bool {
        let source = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .find(|e| e.weight().to_port == "condition")
            .map(|e| e.source());

        if let Some(source_idx) = source {
            let source_node = self.graph[source_idx];
            if !self.results.contains_key(&source_node.id) {
                let result = self.execute_comparison(source_idx);
                self.results.insert(source_node.id.clone(), result);
            }
            if let Some(result) = self.results.get(&source_node.id) {
                return result
                    .pointer("/result/value")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
            }
        }

        let expr = self.graph[idx].param_str("condition_expr", "");
        if expr.is_empty() {
            return false;
        }
        let names = self.namespace();
        match eval::eval_condition(&expr, &names) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Condition evaluation failed: {e}");
                false
            }
        }
    }

    fn execute_comparison(&mut self, idx: NodeIndex) -> Value {
        let node = self.graph[idx];
        let left = self
            .wired_input(idx, "left")
            .unwrap_or_else(|| parse_operand(&node.param_str("input_expr", "0")));
        let right = self
            .wired_input(idx, "right")
            .unwrap_or_else(|| parse_operand(&node.param_str("compare_value", "0")));
        let operator = node.param_str("operator", "==");

        let value = eval_comparison(&left, &operator, &right);
        json!({"result": {"value": value}})
    }

    fn execute_math(&mut self, idx: NodeIndex) -> Value {
        let node = self.graph[idx];
        let a = self
            .wired_input(idx, "a")
            .and_then(|v| v.as_f64())
            .or_else(|| node.param_value("value_a").and_then(ParamValue::as_f64))
            .unwrap_or(0.0);
        let b = self
            .wired_input(idx, "b")
            .and_then(|v| v.as_f64())
            .or_else(|| node.param_value("value_b").and_then(ParamValue::as_f64))
            .unwrap_or(0.0);
        let operation = node.param_str("operation", "add");

        let value = match operation.as_str() {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            // Division by zero yields infinity. JSON has no encoding for
            // non-finite numbers, so the stored result reads as null.
            "divide" => {
                if b == 0.0 {
                    f64::INFINITY
                } else {
                    a / b
                }
            }
            "power" => a.powf(b),
            "modulo" => floor_mod(a, b),
            "min" => a.min(b),
            "max" => a.max(b),
            "abs" => a.abs(),
            "sum" | "average" => {
                let values = self.aggregate_values(idx, a, b);
                let total: f64 = values.iter().sum();
                if operation == "average" {
                    if values.is_empty() {
                        0.0
                    } else {
                        total / values.len() as f64
                    }
                } else {
                    total
                }
            }
            other => {
                log::warn!("Unknown math operation '{other}', defaulting to add");
                a + b
            }
        };
        json!({"result": {"value": value, "operation": operation}})
    }

    /// Operand list for sum/average: the wired `values` input when it is a
    /// list, otherwise [a, b].
    fn aggregate_values(&self, idx: NodeIndex, a: f64, b: f64) -> Vec<f64> {
        match self.wired_input(idx, "values") {
            Some(ParamValue::List(items)) => {
                items.iter().filter_map(ParamValue::as_f64).collect()
            }
            Some(ParamValue::Json(Value::Array(items))) => items
                .iter()
                .filter_map(|v| param_from_json(v).and_then(|pv| pv.as_f64()))
                .collect(),
            _ => vec![a, b],
        }
    }

    /// Value delivered over a data edge into `port`, if any producer ran.
    /// A `{"value": ...}` payload is unwrapped to its inner value.
    fn wired_input(&self, idx: NodeIndex, port: &str) -> Option<ParamValue> {
        let edge = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .find(|e| e.weight().to_port == port)?;
        let source = self.graph[edge.source()];
        let from_port = &edge.weight().from_port;
        let value = self.results.get(&source.id)?.get(from_port)?.clone();
        let value = match &value {
            Value::Object(inner) if inner.contains_key("value") => inner["value"].clone(),
            _ => value,
        };
        param_from_json(&value)
    }

    /// Namespace for condition evaluation: True/False/None plus
    /// result_<node>_<key> entries from prior results.
    fn namespace(&self) -> HashMap<String, ParamValue> {
        let mut names: HashMap<String, ParamValue> = HashMap::new();
        names.insert("True".to_string(), ParamValue::Bool(true));
        names.insert("False".to_string(), ParamValue::Bool(false));
        names.insert("None".to_string(), ParamValue::Json(Value::Null));

        for (node_id, result) in &self.results {
            if let Value::Object(entries) = result {
                for (key, val) in entries {
                    if let Value::Object(inner) = val {
                        if let Some(value) = inner.get("value") {
                            if let Some(pv) = param_from_json(value) {
                                names.insert(format!("result_{node_id}_{key}"), pv);
                            }
                        }
                    }
                }
            }
        }
        names
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn param_i64(node: &IRNode, name: &str, default: i64) -> i64 {
    node.param_value(name)
        .and_then(ParamValue::as_i64)
        .unwrap_or(default)
}

/// Floor modulo: the result takes the sign of the divisor, matching the
/// source language's `%`. A zero divisor yields 0.
fn floor_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

/// Widget operands arrive as text; numbers win, everything else stays a
/// string.
fn parse_operand(text: &str) -> ParamValue {
    let trimmed = text.trim();
    if trimmed.contains('.') {
        if let Ok(f) = trimmed.parse::<f64>() {
            return ParamValue::Float(f);
        }
    } else if let Ok(i) = trimmed.parse::<i64>() {
        return ParamValue::Int(i);
    }
    ParamValue::Str(trimmed.to_string())
}

fn eval_comparison(left: &ParamValue, operator: &str, right: &ParamValue) -> bool {
    let numeric = |v: &ParamValue| match v {
        ParamValue::Int(i) => Some(*i as f64),
        ParamValue::Float(f) => Some(*f),
        ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
        return match operator {
            "==" => a == b,
            "!=" => a != b,
            ">" => a > b,
            "<" => a < b,
            ">=" => a >= b,
            "<=" => a <= b,
            _ => false,
        };
    }

    let (a, b) = (left.py_str(), right.py_str());
    match operator {
        "==" => a == b,
        "!=" => a != b,
        ">" => a > b,
        "<" => a < b,
        ">=" => a >= b,
        "<=" => a <= b,
        _ => false,
    }
}

fn param_from_json(value: &Value) -> Option<ParamValue> {
    Some(match value {
        Value::Bool(b) => ParamValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ParamValue::Int(i)
            } else {
                ParamValue::Float(n.as_f64()?)
            }
        }
        Value::String(s) => ParamValue::Str(s.clone()),
        other => ParamValue::Json(other.clone()),
    })
}
