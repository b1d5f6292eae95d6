// Runtime engine coverage: guard pipeline, safety policy, branch and loop
// execution against the simulated adapter, cooperative cancellation, audit
// trail (in-memory and durable).

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use robograph::auditlog::{AuditLogReader, AuditLogWriter};
use robograph::ir::{IREdge, IRNode, NodeKind, WorkflowIR};
use robograph::robot::SimulatedAdapter;
use robograph::runtime::{RuntimeEngine, SafetyPolicy, Scenario, WorkflowRunner};

fn action(id: &str, name: &str) -> IRNode {
    let mut node = IRNode::new(id, "builtin.action_execution", NodeKind::Action);
    node.set_param("action", name, "string");
    node
}

fn single_action_ir() -> WorkflowIR {
    let mut ir = WorkflowIR::for_robot("go2");
    ir.add_node(action("0", "stand"));
    ir
}

fn if_else_ir(condition: &str) -> WorkflowIR {
    let mut ir = WorkflowIR::for_robot("go2");
    let mut logic = IRNode::new("0", "builtin.if", NodeKind::Logic);
    logic.set_param("condition_expr", condition, "string");
    ir.add_node(logic);
    ir.add_node(action("1", "stand"));
    ir.add_node(action("2", "sit"));
    ir.add_edge(IREdge::flow("0", "out_if", "1", "flow_in"));
    ir.add_edge(IREdge::flow("0", "out_else", "2", "flow_in"));
    ir
}

fn for_loop_ir(start: i64, end: i64, step: i64) -> WorkflowIR {
    let mut ir = WorkflowIR::for_robot("go2");
    let mut logic = IRNode::new("0", "builtin.while_loop", NodeKind::Logic);
    logic.set_param("loop_type", "for", "string");
    logic.set_param("condition_expr", "", "string");
    logic.set_param("for_start", start, "int");
    logic.set_param("for_end", end, "int");
    logic.set_param("for_step", step, "int");
    ir.add_node(logic);
    ir.add_node(action("1", "stand"));
    ir.add_edge(IREdge::flow("0", "loop_body", "1", "flow_in"));
    ir
}

// ---------- Guards ----------

#[test]
fn test_compile_guard_blocks_empty_mission() {
    let ir = WorkflowIR::for_robot("go2");
    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &Scenario::default(), None);
    assert_eq!(report.status, "blocked");
    assert_eq!(report.phase, "compile");
    assert_eq!(report.reason, "nodes_missing");
    assert!(engine
        .audit_events()
        .iter()
        .any(|e| e.event_type == "compile_blocked"));
}

#[test]
fn test_execute_guard_blocks_running_simulation() {
    let ir = single_action_ir();
    let scenario = Scenario {
        simulation_running: true,
        ..Scenario::default()
    };
    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &scenario, None);
    assert_eq!(report.status, "blocked");
    assert_eq!(report.phase, "execute");
    assert_eq!(report.reason, "simulation_already_running");
}

#[test]
fn test_execute_guard_rejects_bad_target() {
    let ir = single_action_ir();
    let scenario = Scenario {
        target: "teleport".to_string(),
        ..Scenario::default()
    };
    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &scenario, None);
    assert_eq!(report.reason, "scenario_target_invalid");
}

#[test]
fn test_safety_blocks_actions_without_robot() {
    let ir = single_action_ir();
    let scenario = Scenario {
        safety_policy: SafetyPolicy {
            require_robot_for_actions: true,
            ..SafetyPolicy::default()
        },
        ..Scenario::default()
    };
    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &scenario, None);
    assert_eq!(report.status, "blocked");
    assert_eq!(report.phase, "safety");
    assert_eq!(report.reason, "robot_model_required");
    let emergency = report.emergency.expect("emergency action");
    assert_eq!(emergency.action, "stop");
    assert!(engine
        .audit_events()
        .iter()
        .any(|e| e.event_type == "safety_blocked"));
}

// ---------- Execution ----------

#[test]
fn test_single_action_executes_on_adapter() {
    let ir = single_action_ir();
    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();

    let report = engine.execute(&ir, &Scenario::default(), Some(&adapter));

    assert_eq!(report.status, "success");
    assert_eq!(adapter.executed_actions(), vec!["stand"]);
    assert!(report.task_id.is_some());
    assert!(engine
        .audit_events()
        .iter()
        .any(|e| e.event_type == "execution_completed"));
}

#[test]
fn test_if_branch_selects_true_arm() {
    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(&if_else_ir("True"), &Scenario::default(), Some(&adapter));
    assert_eq!(adapter.executed_actions(), vec!["stand"]);
}

#[test]
fn test_if_branch_selects_else_arm() {
    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(&if_else_ir("False"), &Scenario::default(), Some(&adapter));
    assert_eq!(adapter.executed_actions(), vec!["sit"]);
}

#[test]
fn test_malformed_condition_falls_back_to_else() {
    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(
        &if_else_ir("robot is ready"),
        &Scenario::default(),
        Some(&adapter),
    );
    assert_eq!(adapter.executed_actions(), vec!["sit"]);
}

#[test]
fn test_comparison_feeds_condition_port() {
    let mut ir = WorkflowIR::for_robot("go2");
    let mut cmp = IRNode::new("0", "builtin.comparison", NodeKind::Comparison);
    cmp.set_param("input_expr", "10", "string");
    cmp.set_param("compare_value", "5", "string");
    cmp.set_param("operator", ">", "string");
    cmp.set_param("output_name", "condition_0", "string");
    ir.add_node(cmp);

    let logic = IRNode::new("1", "builtin.if", NodeKind::Logic);
    ir.add_node(logic);
    ir.add_node(action("2", "stand"));
    ir.add_edge(IREdge {
        from_node: "0".to_string(),
        from_port: "result".to_string(),
        to_node: "1".to_string(),
        to_port: "condition".to_string(),
        edge_type: robograph::ir::EdgeType::Data,
    });
    ir.add_edge(IREdge::flow("1", "out_if", "2", "flow_in"));

    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(&ir, &Scenario::default(), Some(&adapter));
    assert_eq!(adapter.executed_actions(), vec!["stand"]);
}

#[test]
fn test_for_loop_replays_body() {
    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(&for_loop_ir(0, 3, 1), &Scenario::default(), Some(&adapter));
    assert_eq!(adapter.executed_actions().len(), 3);
}

#[test]
fn test_for_loop_zero_step_does_not_hang() {
    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&for_loop_ir(0, 3, 0), &Scenario::default(), Some(&adapter));
    assert_eq!(report.status, "success");
    assert!(adapter.executed_actions().is_empty());
}

#[test]
fn test_while_loop_capped_at_max_iterations() {
    let mut ir = WorkflowIR::for_robot("go2");
    let mut logic = IRNode::new("0", "builtin.while_loop", NodeKind::Logic);
    logic.set_param("loop_type", "while", "string");
    logic.set_param("condition_expr", "True", "string");
    ir.add_node(logic);
    ir.add_node(action("1", "stand"));
    ir.add_edge(IREdge::flow("0", "loop_body", "1", "flow_in"));

    let scenario = Scenario {
        safety_policy: SafetyPolicy {
            max_loop_iterations: 5,
            ..SafetyPolicy::default()
        },
        ..Scenario::default()
    };
    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &scenario, Some(&adapter));

    assert_eq!(report.status, "success");
    assert_eq!(adapter.executed_actions().len(), 5);
}

#[test]
fn test_while_loop_false_condition_skips_body_and_continues() {
    let mut ir = WorkflowIR::for_robot("go2");
    let mut logic = IRNode::new("0", "builtin.while_loop", NodeKind::Logic);
    logic.set_param("loop_type", "while", "string");
    logic.set_param("condition_expr", "False", "string");
    ir.add_node(logic);
    ir.add_node(action("1", "stand"));
    ir.add_node(action("2", "sit"));
    ir.add_edge(IREdge::flow("0", "loop_body", "1", "flow_in"));
    ir.add_edge(IREdge::flow("0", "loop_end", "2", "flow_in"));

    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(&ir, &Scenario::default(), Some(&adapter));
    assert_eq!(adapter.executed_actions(), vec!["sit"]);
}

fn math_node(id: &str, operation: &str, a: f64, b: f64) -> IRNode {
    let mut node = IRNode::new(id, "builtin.math", NodeKind::Math);
    node.set_param("operation", operation, "string");
    node.set_param("value_a", a, "any");
    node.set_param("value_b", b, "any");
    node
}

fn math_result(report: &robograph::runtime::RunReport, id: &str) -> serde_json::Value {
    report.results[id]["result"]["value"].clone()
}

#[test]
fn test_math_sum_and_average_over_operands() {
    let mut ir = WorkflowIR::for_robot("go2");
    ir.add_node(math_node("0", "sum", 2.0, 3.0));
    ir.add_node(math_node("1", "average", 2.0, 4.0));
    ir.add_edge(IREdge::flow("0", "flow_out", "1", "flow_in"));

    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &Scenario::default(), None);

    assert_eq!(math_result(&report, "0"), serde_json::json!(5.0));
    assert_eq!(math_result(&report, "1"), serde_json::json!(3.0));
}

#[test]
fn test_math_aggregates_wired_values_list() {
    let mut ir = WorkflowIR::for_robot("go2");
    let mut var = IRNode::new("0", "builtin.variable", NodeKind::Variable);
    var.set_param("name", "readings", "string");
    var.set_param(
        "initial_value",
        robograph::ir::ParamValue::List(vec![
            robograph::ir::ParamValue::Int(1),
            robograph::ir::ParamValue::Int(2),
            robograph::ir::ParamValue::Int(3),
        ]),
        "any",
    );
    ir.add_node(var);
    ir.add_node(math_node("1", "sum", 0.0, 0.0));
    ir.add_edge(IREdge::flow("0", "flow_out", "1", "flow_in"));
    ir.add_edge(IREdge {
        from_node: "0".to_string(),
        from_port: "value".to_string(),
        to_node: "1".to_string(),
        to_port: "values".to_string(),
        edge_type: robograph::ir::EdgeType::Data,
    });

    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &Scenario::default(), None);
    assert_eq!(math_result(&report, "1"), serde_json::json!(6.0));
}

#[test]
fn test_math_divide_by_zero_reads_as_null() {
    // Infinity has no JSON encoding; the stored result is the null sentinel.
    let mut ir = WorkflowIR::for_robot("go2");
    ir.add_node(math_node("0", "divide", 4.0, 0.0));

    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &Scenario::default(), None);
    assert!(math_result(&report, "0").is_null());
    assert_eq!(report.results["0"]["result"]["operation"], "divide");
}

#[test]
fn test_math_modulo_takes_divisor_sign() {
    let mut ir = WorkflowIR::for_robot("go2");
    ir.add_node(math_node("0", "modulo", 5.0, -3.0));
    ir.add_node(math_node("1", "modulo", 5.0, 0.0));
    ir.add_edge(IREdge::flow("0", "flow_out", "1", "flow_in"));

    let mut engine = RuntimeEngine::new();
    let report = engine.execute(&ir, &Scenario::default(), None);
    assert_eq!(math_result(&report, "0"), serde_json::json!(-1.0));
    assert_eq!(math_result(&report, "1"), serde_json::json!(0.0));
}

#[test]
fn test_stop_node_reaches_adapter() {
    let mut ir = WorkflowIR::for_robot("go2");
    ir.add_node(IRNode::new("0", "builtin.stop", NodeKind::Stop));

    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(&ir, &Scenario::default(), Some(&adapter));
    assert!(adapter.was_stopped());
}

#[test]
fn test_action_mapping_overrides_action_name() {
    let ir = single_action_ir();
    let mut mapping = HashMap::new();
    mapping.insert("stand".to_string(), "stand_up".to_string());
    let scenario = Scenario {
        action_mapping: mapping,
        ..Scenario::default()
    };

    let adapter = SimulatedAdapter::new("go2");
    let mut engine = RuntimeEngine::new();
    engine.execute(&ir, &scenario, Some(&adapter));
    assert_eq!(adapter.executed_actions(), vec!["stand_up"]);
}

#[test]
fn test_cancelled_runner_executes_nothing() {
    let stop = Arc::new(AtomicBool::new(true));
    let runner = WorkflowRunner::new(100, stop);
    let adapter = SimulatedAdapter::new("go2");

    let outcome = runner.run(&single_action_ir(), Some(&adapter), &HashMap::new());

    assert!(outcome.cancelled);
    assert_eq!(outcome.executed_count, 0);
    assert!(adapter.executed_actions().is_empty());
}

#[test]
fn test_scheduler_cancel_flips_status() {
    let mut engine = RuntimeEngine::new();
    let flag = engine.stop_handle();
    let task_id = engine.scheduler().schedule(flag.clone());
    assert_eq!(engine.scheduler().get_status(&task_id), "scheduled");
    assert!(engine.scheduler().cancel(&task_id));
    assert_eq!(engine.scheduler().get_status(&task_id), "cancelled");
    assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    assert!(!engine.scheduler().cancel("no-such-task"));
}

// ---------- Durable audit log ----------

#[test]
fn test_audit_log_round_trip() {
    let dir = std::env::temp_dir().join(format!("robograph_audit_{}", std::process::id()));
    let path = dir.join("events.log");
    let _ = std::fs::remove_file(&path);

    let mut writer = AuditLogWriter::open(&path).unwrap();
    writer
        .append("safety_blocked", serde_json::json!({"reason": "robot_model_required"}))
        .unwrap();
    writer
        .append("execution_completed", serde_json::json!({"node_count": 3}))
        .unwrap();

    let mut reader = AuditLogReader::open(&path).unwrap();
    let first = reader.next_event().unwrap().expect("first event");
    assert_eq!(first.event.kind, "safety_blocked");
    assert_eq!(first.event.payload["reason"], "robot_model_required");
    let second = reader.next_event().unwrap().expect("second event");
    assert_eq!(second.event.kind, "execution_completed");
    assert!(reader.next_event().unwrap().is_none());
    assert!(second.offset > first.offset);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_audit_log_recovers_from_corruption() {
    use std::io::Write;

    let dir = std::env::temp_dir().join(format!("robograph_audit_corrupt_{}", std::process::id()));
    let path = dir.join("events.log");
    let _ = std::fs::remove_file(&path);

    {
        let mut writer = AuditLogWriter::open(&path).unwrap();
        writer.append("first", serde_json::json!({"n": 1})).unwrap();
    }
    // Inject garbage between records.
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(b"!!garbage!!").unwrap();
    }
    {
        let mut writer = AuditLogWriter::open(&path).unwrap();
        writer.append("second", serde_json::json!({"n": 2})).unwrap();
    }

    let mut reader = AuditLogReader::open(&path).unwrap();
    let first = reader.next_event().unwrap().expect("first event");
    assert_eq!(first.event.kind, "first");
    let second = reader.next_event().unwrap().expect("second survives garbage");
    assert_eq!(second.event.kind, "second");
    assert!(reader.next_event().unwrap().is_none());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_engine_audit_sink_writes_frames() {
    let dir = std::env::temp_dir().join(format!("robograph_audit_sink_{}", std::process::id()));
    let path = dir.join("events.log");
    let _ = std::fs::remove_file(&path);

    let mut engine =
        RuntimeEngine::new().with_audit_sink(AuditLogWriter::open(&path).unwrap());
    let adapter = SimulatedAdapter::new("go2");
    engine.execute(&single_action_ir(), &Scenario::default(), Some(&adapter));

    let mut reader = AuditLogReader::open(&path).unwrap();
    let event = reader.next_event().unwrap().expect("audit event on disk");
    assert_eq!(event.event.kind, "execution_completed");

    let _ = std::fs::remove_file(&path);
}
