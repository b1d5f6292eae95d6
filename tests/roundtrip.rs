// Round-trip suite: Canvas -> IR -> Code -> AST -> IR (and back to canvas),
// scored by the normalizer. Thresholds mirror the shipped regression
// samples.

use robograph::canvas::{self, CanvasGraph};
use robograph::codegen;
use robograph::dsl;
use robograph::lowering;
use robograph::normalizer::IRNormalizer;
use robograph::WorkflowIR;

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

/// Full round-trip: canvas -> IR -> code -> parse -> IR; returns the
/// equivalence score.
fn roundtrip(data: &CanvasGraph) -> f64 {
    let (ir_forward, _) = canvas::import_graph(data, "go2");
    let (code, _, _) = codegen::generate_code(&ir_forward);

    let (ast, _) = dsl::parse_source(&code);
    let (ir_reverse, _) = lowering::lower_ast(&ast, "go2");

    IRNormalizer::new().compare(&ir_forward, &ir_reverse)
}

// ---------- Normalizer ----------

#[test]
fn test_identical_ir_scores_one() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [],
    }));
    let (ir1, _) = canvas::import_graph(&data, "go2");
    let (ir2, _) = canvas::import_graph(&data, "go2");
    assert_eq!(IRNormalizer::new().compare(&ir1, &ir2), 1.0);
}

#[test]
fn test_positions_do_not_affect_score() {
    let data1 = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [],
    }));
    let data2 = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Action Execution",
            "position": {"x": 999, "y": 999},
            "node_type": "action_execution", "ui_selection": "Stand",
        }],
        "connections": [],
    }));
    let (ir1, _) = canvas::import_graph(&data1, "go2");
    let (ir2, _) = canvas::import_graph(&data2, "go2");
    assert_eq!(IRNormalizer::new().compare(&ir1, &ir2), 1.0);
}

#[test]
fn test_different_actions_lower_score() {
    let (ir1, _) = canvas::import_graph(
        &graph(serde_json::json!({"nodes": [action_node(0, 100.0, "Stand")], "connections": []})),
        "go2",
    );
    let (ir2, _) = canvas::import_graph(
        &graph(serde_json::json!({"nodes": [action_node(0, 100.0, "Walk")], "connections": []})),
        "go2",
    );
    let score = IRNormalizer::new().compare(&ir1, &ir2);
    assert!(score >= 0.3, "score {score}");
    assert!(score < 1.0, "score {score}");
}

#[test]
fn test_empty_irs_equivalent() {
    let score = IRNormalizer::new().compare(&WorkflowIR::default(), &WorkflowIR::default());
    assert_eq!(score, 1.0);
}

#[test]
fn test_normalize_strips_ui() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    let normalized = IRNormalizer::new().normalize(&ir);
    assert!(normalized.nodes[0].ui.is_none());
}

#[test]
fn test_normalize_assigns_sequential_ids() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(5, 100.0, "Stand"), action_node(10, 400.0, "Walk")],
        "connections": [
            {"from_node": 5, "from_port": "flow_out", "to_node": 10, "to_port": "flow_in"},
        ],
    }));
    let (ir, _) = canvas::import_graph(&data, "go2");
    let normalized = IRNormalizer::new().normalize(&ir);
    assert_eq!(normalized.nodes[0].id, "0");
    assert_eq!(normalized.nodes[1].id, "1");
    assert_eq!(normalized.edges[0].from_node, "0");
    assert_eq!(normalized.edges[0].to_node, "1");
}

#[test]
fn test_normalize_coerces_numeric_strings() {
    let mut ir = WorkflowIR::for_robot("go2");
    let mut node = robograph::ir::IRNode::new(
        "0",
        "builtin.timer",
        robograph::ir::NodeKind::Timer,
    );
    node.set_param("duration", "2.0", "float");
    ir.add_node(node);

    let normalized = IRNormalizer::new().normalize(&ir);
    assert_eq!(
        normalized.nodes[0].param_value("duration"),
        Some(&robograph::ir::ParamValue::Float(2.0))
    );
}

// ---------- Round-trip scenarios ----------

#[test]
fn test_roundtrip_single_action() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand")],
        "connections": [],
    }));
    let score = roundtrip(&data);
    assert!(score >= 0.95, "round-trip score too low: {score}");
}

#[test]
fn test_roundtrip_chained_actions() {
    let data = graph(serde_json::json!({
        "nodes": [action_node(0, 100.0, "Stand"), action_node(1, 400.0, "Walk")],
        "connections": [
            {"from_node": 0, "from_port": "flow_out", "to_node": 1, "to_port": "flow_in"},
        ],
    }));
    let score = roundtrip(&data);
    assert!(score >= 0.95, "round-trip score too low: {score}");
}

#[test]
fn test_roundtrip_if_else() {
    let data = graph(serde_json::json!({
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
    }));
    let score = roundtrip(&data);
    assert!(score >= 0.80, "round-trip score too low: {score}");
}

#[test]
fn test_roundtrip_while_loop() {
    let data = graph(serde_json::json!({
        "nodes": [
            {"id": 0, "display_name": "Logic Control", "position": {"x": 100, "y": 100},
             "node_type": "while_loop", "ui_selection": "While Loop",
             "loop_type": "While", "condition_expr": "x > 5"},
            action_node(1, 400.0, "Stand"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "loop_body", "to_node": 1, "to_port": "flow_in"},
        ],
    }));
    let score = roundtrip(&data);
    assert!(score >= 0.80, "round-trip score too low: {score}");
}

#[test]
fn test_roundtrip_for_loop() {
    let data = graph(serde_json::json!({
        "nodes": [
            {"id": 0, "display_name": "Logic Control", "position": {"x": 100, "y": 100},
             "node_type": "while_loop", "ui_selection": "While Loop",
             "loop_type": "For", "for_start": "0", "for_end": "5", "for_step": "1"},
            action_node(1, 400.0, "Stand"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "loop_body", "to_node": 1, "to_port": "flow_in"},
        ],
    }));
    let score = roundtrip(&data);
    assert!(score >= 0.80, "round-trip score too low: {score}");
}

#[test]
fn test_roundtrip_timer_in_flow() {
    let data = graph(serde_json::json!({
        "nodes": [
            action_node(0, 100.0, "Stand"),
            {"id": 1, "display_name": "Timer", "position": {"x": 400, "y": 100},
             "node_type": "timer", "duration": "2.0"},
            action_node(2, 700.0, "Walk"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "flow_out", "to_node": 1, "to_port": "flow_in"},
            {"from_node": 1, "from_port": "flow_out", "to_node": 2, "to_port": "flow_in"},
        ],
    }));
    let score = roundtrip(&data);
    assert!(score >= 0.80, "round-trip score too low: {score}");
}

#[test]
fn test_roundtrip_sensor_standalone() {
    let data = graph(serde_json::json!({
        "nodes": [{
            "id": 0, "display_name": "Sensor Input",
            "position": {"x": 100, "y": 100},
            "node_type": "sensor_input", "ui_selection": "Read IMU",
        }],
        "connections": [],
    }));
    let score = roundtrip(&data);
    assert!(score >= 0.70, "round-trip score too low: {score}");
}

#[test]
fn test_full_canvas_roundtrip() {
    let data = graph(serde_json::json!({
        "nodes": [
            action_node(0, 100.0, "Stand"),
            {"id": 1, "display_name": "Timer", "position": {"x": 400, "y": 100},
             "node_type": "timer", "duration": "2.0"},
            action_node(2, 700.0, "Walk"),
        ],
        "connections": [
            {"from_node": 0, "from_port": "flow_out", "to_node": 1, "to_port": "flow_in"},
            {"from_node": 1, "from_port": "flow_out", "to_node": 2, "to_port": "flow_in"},
        ],
    }));

    // Forward: Canvas -> IR -> Code.
    let (ir1, _) = canvas::import_graph(&data, "go2");
    let (code, _, _) = codegen::generate_code(&ir1);

    // Reverse: Code -> IR -> Canvas.
    let (ast, _) = dsl::parse_source(&code);
    let (ir2, _) = lowering::lower_ast(&ast, "go2");
    let (canvas_data, _) = canvas::export_graph(&ir2);

    // Re-forward: Canvas -> IR.
    let (ir3, _) = canvas::import_graph(&canvas_data, "go2");

    let score = IRNormalizer::new().compare(&ir1, &ir3);
    assert!(score >= 0.80, "full round-trip score too low: {score}");
}

#[test]
fn test_generated_document_shape_is_universal() {
    // Any IR, even an empty one, yields a complete document.
    for ir in [WorkflowIR::default(), {
        let data = graph(serde_json::json!({
            "nodes": [action_node(0, 100.0, "Stand")],
            "connections": [],
        }));
        canvas::import_graph(&data, "go2").0
    }] {
        let (code, _, _) = codegen::generate_code(&ir);
        assert!(code.contains("def execute_workflow("));
        assert!(code.contains("if __name__ == '__main__':"));
    }
}

#[test]
fn test_auto_layout_assigns_positions() {
    // IR straight from code has no UI; exporting to canvas must place it.
    let source = "RobotContext.run_action('stand')\ntime.sleep(1.0)\nRobotContext.run_action('sit')\n";
    let (ast, _) = dsl::parse_source(source);
    let (ir, _) = lowering::lower_ast(&ast, "go2");
    let (canvas_data, _) = canvas::export_graph(&ir);

    assert_eq!(canvas_data.nodes.len(), 3);
    let xs: Vec<f64> = canvas_data.nodes.iter().map(|n| n.position.x).collect();
    // Chained nodes land on successive layers, left to right.
    assert!(xs[0] < xs[1] && xs[1] < xs[2], "positions {xs:?}");
    assert!(canvas_data.nodes.iter().all(|n| n.position.y != 0.0));
}

#[test]
fn test_opaque_code_survives_roundtrip() {
    let source = "custom_helper(1, 2)\n";
    let (ast, _) = dsl::parse_source(source);
    let (ir, diags) = lowering::lower_ast(&ast, "go2");

    assert_eq!(ir.nodes[0].kind, robograph::ir::NodeKind::Opaque);
    assert_eq!(ir.nodes[0].opaque_code.as_deref(), Some("custom_helper(1, 2)"));
    assert!(diags.iter().any(|d| d.code == "W2002"));

    let (code, _, _) = codegen::generate_code(&ir);
    assert!(code.contains("custom_helper(1, 2)"));
}
