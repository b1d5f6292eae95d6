// Canvas -> IR lowering and IR -> Code generation, driven by the same
// graph payloads the editor exports. Scenario expectations follow the
// shipped sample workflows (single action, chains, branches, loops, timer).

use robograph::canvas::{self, CanvasGraph};
use robograph::codegen;
use robograph::ir::{NodeKind, ParamValue};
use robograph::validator::SemanticValidator;
use robograph::DiagnosticLevel;

fn graph(json: serde_json::Value) -> CanvasGraph {
    serde_json::from_value(json).expect("canvas payload")
}

fn action_node(id: i64, x: f64, selection: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "display_name": "Action Execution",
        "position": {"x": x, "y": 100},
        "node_type": "action_execution",
        "ui_selection": selection,
    })
}

// ---------- Canvas -> IR ----------

#[test]
fn test_single_action_node() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes.len(), 1);
    assert_eq!(ir.nodes[0].kind, NodeKind::Action);
    assert_eq!(
        ir.nodes[0].param_value("action"),
        Some(&ParamValue::Str("stand".into()))
    );
}

#[test]
fn test_two_chained_actions() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand"), action_node(1, 400.0, "Walk")],
        "connections": [
            {"from_node": 0, "from_port": "flow_out", "to_node": 1, "to_port": "flow_in"},
        ],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes.len(), 2);
    assert_eq!(ir.edges.len(), 1);
    assert_eq!(ir.edges[0].edge_type, robograph::ir::EdgeType::Flow);
}

#[test]
fn test_if_node() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Logic Control",
            "position": {"x": 100, "y": 100},
            "node_type": "if", "ui_selection": "If",
            "condition_expr": "x > 5",
        }],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].kind, NodeKind::Logic);
    assert_eq!(ir.nodes[0].schema_id, "builtin.if");
    assert_eq!(ir.nodes[0].param_str("condition_expr", ""), "x > 5");
}

#[test]
fn test_logic_control_disambiguation() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Logic Control",
            "position": {"x": 100, "y": 100},
            "ui_selection": "While Loop", "loop_type": "While",
            "condition_expr": "running",
        }],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].schema_id, "builtin.while_loop");
    assert_eq!(ir.nodes[0].param_str("loop_type", ""), "while");
}

#[test]
fn test_for_loop_node() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Logic Control",
            "position": {"x": 100, "y": 100},
            "node_type": "while_loop", "ui_selection": "While Loop",
            "loop_type": "For", "for_start": "0", "for_end": "5", "for_step": "1",
        }],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].param_str("loop_type", ""), "for");
    assert_eq!(ir.nodes[0].param_value("for_start"), Some(&ParamValue::Int(0)));
    assert_eq!(ir.nodes[0].param_value("for_end"), Some(&ParamValue::Int(5)));
}

#[test]
fn test_comparison_node() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Condition",
            "position": {"x": 100, "y": 100},
            "node_type": "comparison", "ui_selection": "Greater Than",
            "left_value": "x", "right_value": "10",
        }],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].kind, NodeKind::Comparison);
    assert_eq!(ir.nodes[0].param_str("operator", ""), ">");
    assert_eq!(ir.nodes[0].param_str("output_name", ""), "condition_0");
}

#[test]
fn test_timer_node() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Timer",
            "position": {"x": 100, "y": 100},
            "node_type": "timer", "duration": "2.5",
        }],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].kind, NodeKind::Timer);
    assert_eq!(
        ir.nodes[0].param_value("duration"),
        Some(&ParamValue::Float(2.5))
    );
}

#[test]
fn test_sensor_node() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Sensor Input",
            "position": {"x": 100, "y": 100},
            "node_type": "sensor_input", "ui_selection": "Read IMU",
        }],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].kind, NodeKind::Sensor);
    assert_eq!(ir.nodes[0].param_str("sensor_type", ""), "imu");
}

#[test]
fn test_stop_preset_becomes_stop_node() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stop")],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].kind, NodeKind::Stop);
    assert_eq!(ir.nodes[0].schema_id, "builtin.stop");
}

#[test]
fn test_unknown_node_type_downgrades_to_custom() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Quantum Oscillator",
            "position": {"x": 0, "y": 0},
            "node_type": "quantum",
        }],
        "connections": [],
    }));
    let (ir, diags) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.nodes[0].kind, NodeKind::Custom);
    assert_eq!(ir.nodes[0].schema_id, "unknown.quantum");
    assert!(diags.iter().any(|d| d.code == "W2001"));
}

#[test]
fn test_unmapped_edge_skipped_with_warning() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [
            {"from_node": 0, "from_port": "flow_out", "to_node": 99, "to_port": "flow_in"},
        ],
    }));
    let (ir, diags) = canvas::import_graph(&data, "go2");
    assert!(ir.edges.is_empty());
    assert!(diags.iter().any(|d| d.code == "W3001"));
}

#[test]
fn test_elif_edge_classified_as_flow() {
    let data = graph(serde_json::json!({
        "nodes": [
            {"id": 0, "display_name": "Logic Control", "position": {"x": 0, "y": 0},
             "node_type": "if", "ui_selection": "If", "condition_expr": "True",
             "elif_conditions": ["x > 1"]},
            action_node(1, 300.0, "Stand"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "out_elif_0", "to_node": 1, "to_port": "flow_in"},
        ],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    assert_eq!(ir.edges[0].edge_type, robograph::ir::EdgeType::Flow);
}

// ---------- IR -> Code (scenarios S1..S5) ----------

fn pipeline(data: CanvasGraph) -> String {
    let (ir, _) = canvas::import_graph(&data, "go2");
    let (code, _, _) = codegen::generate_code(&ir);
    code
}

#[test]
fn test_s1_single_action_code() {
    let code = pipeline(graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [],
    })));
    assert!(code.contains("    RobotContext.run_action('stand')"));
    assert!(code.contains("def execute_workflow("));
    assert!(code.contains("if __name__ == '__main__':"));
}

#[test]
fn test_s2_chained_actions_order() {
    let code = pipeline(graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand"), action_node(1, 400.0, "Walk")],
        "connections": [
            {"from_node": 0, "from_port": "flow_out", "to_node": 1, "to_port": "flow_in"},
        ],
    })));
    let stand_idx = code.find("run_action('stand')").expect("stand emitted");
    let walk_idx = code.find("run_action('walk')").expect("walk emitted");
    assert!(stand_idx < walk_idx);
}

#[test]
fn test_s3_if_else_code() {
    let code = pipeline(graph(serde_json::json!({
        "nodes": [
            {"id": 0, "display_name": "Logic Control", "position": {"x": 100, "y": 100},
             "node_type": "if", "ui_selection": "If", "condition_expr": "True"},
            action_node(1, 400.0, "Stand"),
            action_node(2, 400.0, "Sit"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "out_if", "to_node": 1, "to_port": "flow_in"},
            {"from_node": 0, "from_port": "out_else", "to_node": 2, "to_port": "flow_in"},
        ],
    })));
    let if_idx = code.find("if True:").expect("if emitted");
    let stand_idx = code.find("RobotContext.run_action('stand')").unwrap();
    let else_idx = code.find("else:").expect("else emitted");
    let sit_idx = code.find("RobotContext.run_action('sit')").unwrap();
    assert!(if_idx < stand_idx && stand_idx < else_idx && else_idx < sit_idx);
}

#[test]
fn test_s4_for_range_code() {
    let code = pipeline(graph(serde_json::json!({
        "nodes": [
            {"id": 0, "display_name": "Logic Control", "position": {"x": 100, "y": 100},
             "node_type": "while_loop", "ui_selection": "While Loop",
             "loop_type": "For", "for_start": "0", "for_end": "5", "for_step": "1"},
            action_node(1, 400.0, "Stand"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "loop_body", "to_node": 1, "to_port": "flow_in"},
        ],
    })));
    assert!(code.contains("    for i in range(0, 5, 1):"));
    assert!(code.contains("        RobotContext.run_action('stand')"));
}

#[test]
fn test_s5_timer_code() {
    let code = pipeline(graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Timer",
            "position": {"x": 100, "y": 100},
            "node_type": "timer", "duration": "2.0",
        }],
        "connections": [],
    })));
    assert!(code.contains("    time.sleep(2.0)"));
}

#[test]
fn test_comparison_feeding_condition_emitted_first() {
    let code = pipeline(graph(serde_json::json!({
        "nodes": [
            {"id": 0, "display_name": "Condition", "position": {"x": 100, "y": 100},
             "node_type": "comparison", "ui_selection": "Greater Than",
             "left_value": "10", "right_value": "5"},
            {"id": 1, "display_name": "Logic Control", "position": {"x": 400, "y": 100},
             "node_type": "if", "ui_selection": "If"},
            action_node(2, 700.0, "Stand"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "result", "to_node": 1, "to_port": "condition"},
            {"from_node": 1, "from_port": "out_if", "to_node": 2, "to_port": "flow_in"},
        ],
    })));
    let cmp_idx = code.find("condition_0 = 10 > 5").expect("comparison emitted");
    let if_idx = code.find("if condition_0:").expect("if uses comparison output");
    assert!(cmp_idx < if_idx);
}

#[test]
fn test_empty_workflow_emits_pass() {
    let code = pipeline(graph(serde_json::json!({"nodes": [], "connections": []})));
    assert!(code.contains("    pass  # No connected workflow"));
}

#[test]
fn test_millisecond_timer_scaled() {
    let mut ir = robograph::WorkflowIR::for_robot("go2");
    let mut timer = robograph::ir::IRNode::new("0", "builtin.timer", NodeKind::Timer);
    timer.set_param("duration", 500.0, "float");
    timer.set_param("unit", "milliseconds", "string");
    ir.add_node(timer);

    let (code, _, _) = codegen::generate_code(&ir);
    assert!(code.contains("time.sleep(500.0 / 1000)"));
}

#[test]
fn test_source_map_covers_emitted_nodes() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand"), action_node(1, 400.0, "Walk")],
        "connections": [
            {"from_node": 0, "from_port": "flow_out", "to_node": 1, "to_port": "flow_in"},
        ],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    let (code, _, source_map) = codegen::generate_code(&ir);

    let (start, end) = source_map.get("0").expect("span for node 0");
    assert!(start >= 1 && end >= start);
    let lines: Vec<&str> = code.split('\n').collect();
    // Node 0's span contains its own line; node 1 chains inside it.
    assert!(lines[start - 1..end]
        .iter()
        .any(|l| l.contains("run_action('stand')")));
    assert!(source_map.get("1").is_some());
}

// ---------- Validator ----------

#[test]
fn test_valid_workflow_has_no_errors_and_summary() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    let diags = SemanticValidator::new().validate(&ir);
    assert!(!diags.iter().any(|d| d.is_error()), "{diags:?}");
    assert!(diags.iter().any(|d| d.code == "I4001"));
}

#[test]
fn test_invalid_choice_rejected() {
    let mut ir = robograph::WorkflowIR::for_robot("go2");
    let mut node =
        robograph::ir::IRNode::new("0", "builtin.action_execution", NodeKind::Action);
    node.set_param("action", "fly", "string");
    ir.add_node(node);

    let diags = SemanticValidator::new().validate(&ir);
    assert!(diags.iter().any(|d| d.code == "E2004" && d.is_error()));
}

#[test]
fn test_out_of_range_duration_rejected() {
    let mut ir = robograph::WorkflowIR::for_robot("go2");
    let mut node = robograph::ir::IRNode::new("0", "builtin.timer", NodeKind::Timer);
    node.set_param("duration", 120.0, "float");
    ir.add_node(node);

    let diags = SemanticValidator::new().validate(&ir);
    assert!(diags.iter().any(|d| d.code == "E2003" && d.is_error()));
}

#[test]
fn test_dangling_edge_rejected() {
    let mut ir = robograph::WorkflowIR::for_robot("go2");
    let mut node =
        robograph::ir::IRNode::new("0", "builtin.action_execution", NodeKind::Action);
    node.set_param("action", "stand", "string");
    ir.add_node(node);
    ir.add_edge(robograph::ir::IREdge::flow("0", "flow_out", "ghost", "flow_in"));

    let diags = SemanticValidator::new().validate(&ir);
    assert!(diags.iter().any(|d| d.code == "E2005" && d.is_error()));
}

#[test]
fn test_unknown_schema_rejected() {
    let mut ir = robograph::WorkflowIR::for_robot("go2");
    ir.add_node(robograph::ir::IRNode::new(
        "0",
        "builtin.nonexistent",
        NodeKind::Action,
    ));

    let diags = SemanticValidator::new().validate(&ir);
    assert!(diags.iter().any(|d| d.code == "E2001" && d.is_error()));
}

#[test]
fn test_robot_compat_emitted_as_warning() {
    let mut ir = robograph::WorkflowIR::for_robot("spot");
    let mut node =
        robograph::ir::IRNode::new("0", "builtin.action_execution", NodeKind::Action);
    node.set_param("action", "stand", "string");
    ir.add_node(node);

    let diags = SemanticValidator::new().validate(&ir);
    let compat: Vec<_> = diags.iter().filter(|d| d.code == "E2007").collect();
    assert_eq!(compat.len(), 1);
    assert_eq!(compat[0].level, DiagnosticLevel::Warning);
}

#[test]
fn test_opaque_nodes_skip_schema_check() {
    let mut ir = robograph::WorkflowIR::for_robot("go2");
    let mut node = robograph::ir::IRNode::new("0", "builtin.opaque", NodeKind::Opaque);
    node.opaque_code = Some("custom_call()".to_string());
    ir.add_node(node);

    let diags = SemanticValidator::new().validate(&ir);
    assert!(!diags.iter().any(|d| d.is_error()), "{diags:?}");
}
