// src/canvas/import.rs
//
// =============================================================================
// ROBOGRAPH: CANVAS -> IR (v 0.1 )
// =============================================================================
//
// Lowers the editor's serialized graph into the workflow IR.
//
// Resolution order per node:
// 1. Explicit node_type field, else display-name lookup.
// 2. "Logic Control" disambiguates to if / while_loop via ui_selection;
//    an Action Execution preset of "Stop" becomes a stop node.
// 3. Schema lookup by node_type; a miss downgrades to kind=custom with a
//    synthetic unknown.<type> schema id.
// 4. Fixed UI-text -> identifier maps build the typed params.

use std::collections::HashMap;

use crate::canvas::{CanvasConnection, CanvasGraph, CanvasNode};
use crate::diagnostics::Diagnostic;
use crate::ir::{EdgeType, IREdge, IRNode, NodeKind, NodeUi, ParamValue, WorkflowIR};
use crate::schema::SchemaRegistry;

// Maps display names used on the canvas to schema node types.
const DISPLAY_NAME_TO_NODE_TYPE: &[(&str, &str)] = &[
    ("Action Execution", "action_execution"),
    ("Sensor Input", "sensor_input"),
    ("Logic Control", "if"),
    ("Condition", "comparison"),
    ("Math", "math"),
    ("Timer", "timer"),
    ("Variable", "variable"),
    ("Stop", "stop"),
];

// Maps UI action display text to robot action identifiers.
const ACTION_UI_TO_ID: &[(&str, &str)] = &[
    ("Lift Right Leg", "lift_right_leg"),
    ("Stand", "stand"),
    ("Sit", "sit"),
    ("Walk", "walk"),
    ("Stop", "stop"),
];

// Maps UI sensor display text to sensor type identifiers.
const SENSOR_UI_TO_ID: &[(&str, &str)] = &[
    ("Read Ultrasonic", "ultrasonic"),
    ("Read Infrared", "infrared"),
    ("Read Camera", "camera"),
    ("Read IMU", "imu"),
    ("Read Odometry", "odometry"),
];

// Maps UI comparison display text to operator symbols.
const COMPARISON_UI_TO_OP: &[(&str, &str)] = &[
    ("Equal", "=="),
    ("Not Equal", "!="),
    ("Greater Than", ">"),
    ("Less Than", "<"),
    ("Greater Equal", ">="),
    ("Less Equal", "<="),
];

// Maps UI math display text to operation identifiers.
const MATH_UI_TO_OP: &[(&str, &str)] = &[
    ("Add", "add"),
    ("Subtract", "subtract"),
    ("Multiply", "multiply"),
    ("Divide", "divide"),
    ("Power", "power"),
    ("Modulo", "modulo"),
    ("Min", "min"),
    ("Max", "max"),
    ("Abs", "abs"),
    ("Sum", "sum"),
    ("Average", "average"),
];

// Ports that carry control flow.
const FLOW_PORTS: &[&str] = &[
    "flow_in", "flow_out", "out_if", "out_else", "loop_body", "loop_end",
];

fn table_get(table: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Convert canvas graph data to IR.
pub fn import_graph(graph: &CanvasGraph, robot_type: &str) -> (WorkflowIR, Vec<Diagnostic>) {
    let mut diags: Vec<Diagnostic> = Vec::new();
    let mut ir = WorkflowIR::for_robot(robot_type);

    // Map canvas integer IDs to IR node IDs.
    let mut id_map: HashMap<i64, String> = HashMap::new();

    for node_data in &graph.nodes {
        let ir_node = convert_node(node_data, &mut diags);
        if let Some(old_id) = node_data.id {
            id_map.insert(old_id, ir_node.id.clone());
        }
        ir.add_node(ir_node);
    }

    for conn in &graph.connections {
        if let Some(edge) = convert_edge(conn, &id_map, &mut diags) {
            ir.add_edge(edge);
        }
    }

    (ir, diags)
}

fn convert_node(node_data: &CanvasNode, diags: &mut Vec<Diagnostic>) -> IRNode {
    let display_name = node_data.display_name.as_str();
    let node_id = node_data
        .id
        .map(|i| i.to_string())
        .unwrap_or_else(IRNode::new_id);
    let ui_selection = node_data.ui_selection.clone().unwrap_or_default();

    // Determine node type: explicit field, else display-name lookup.
    let mut node_type = node_data
        .node_type
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    if node_type == "unknown" {
        node_type = table_get(DISPLAY_NAME_TO_NODE_TYPE, display_name)
            .unwrap_or("unknown")
            .to_string();
    }

    // Logic Control resolves to if vs while_loop via its preset.
    if display_name.contains("Logic Control") {
        let sel = ui_selection.to_lowercase();
        node_type = if sel.starts_with("while") || sel.starts_with("for") {
            "while_loop".to_string()
        } else {
            "if".to_string()
        };
    }

    // A Stop preset on an Action Execution node is really a stop node.
    if node_type == "action_execution" && ui_selection == "Stop" {
        node_type = "stop".to_string();
    }

    let (schema_id, kind) = match SchemaRegistry::get_by_node_type(&node_type) {
        Some(schema) => (
            schema.schema_id.clone(),
            NodeKind::from_str_lossy(&schema.kind),
        ),
        None => {
            diags.push(
                Diagnostic::warning(
                    "W2001",
                    format!(
                        "No schema found for node type '{node_type}' (display: '{display_name}')"
                    ),
                )
                .at_node(node_id.clone()),
            );
            (format!("unknown.{node_type}"), NodeKind::Custom)
        }
    };

    let mut ir_node = IRNode::new(&node_id, &schema_id, kind);
    extract_params(&mut ir_node, node_data, &node_type, &ui_selection);
    ir_node.ui = Some(NodeUi {
        x: node_data.position.x,
        y: node_data.position.y,
        width: node_data.width.unwrap_or(180.0),
        height: node_data.height.unwrap_or(110.0),
        collapsed: false,
    });
    ir_node
}

fn extract_params(node: &mut IRNode, data: &CanvasNode, node_type: &str, ui_selection: &str) {
    match node_type {
        "action_execution" => {
            let action = table_get(ACTION_UI_TO_ID, ui_selection)
                .map(str::to_string)
                .unwrap_or_else(|| ui_selection.to_lowercase().replace(' ', "_"));
            node.set_param("action", action, "string");
        }
        "stop" => {} // No parameters.
        "sensor_input" => {
            let sensor = table_get(SENSOR_UI_TO_ID, ui_selection).unwrap_or("imu");
            node.set_param("sensor_type", sensor, "string");
        }
        "if" => {
            let cond = data.condition_expr.clone().unwrap_or_default();
            node.set_param("condition_expr", cond, "string");
            if let Some(elifs) = &data.elif_conditions {
                if !elifs.is_empty() {
                    let list: Vec<ParamValue> =
                        elifs.iter().map(|c| ParamValue::Str(c.clone())).collect();
                    node.set_param("elif_conditions", ParamValue::List(list), "string");
                }
            }
        }
        "while_loop" => {
            let loop_type = data
                .loop_type
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "While".to_string())
                .to_lowercase();
            node.set_param("loop_type", loop_type, "string");
            let cond = data.condition_expr.clone().unwrap_or_default();
            node.set_param("condition_expr", cond, "string");
            node.set_param("for_start", safe_int(data.for_start.as_ref(), 0), "int");
            node.set_param("for_end", safe_int(data.for_end.as_ref(), 10), "int");
            node.set_param("for_step", safe_int(data.for_step.as_ref(), 1), "int");
        }
        "comparison" => {
            let operator = table_get(COMPARISON_UI_TO_OP, ui_selection).unwrap_or("==");
            node.set_param("operator", operator, "string");
            node.set_param(
                "input_expr",
                data.left_value.clone().unwrap_or_default(),
                "string",
            );
            node.set_param(
                "compare_value",
                data.right_value.clone().unwrap_or_else(|| "0".to_string()),
                "string",
            );
            node.set_param(
                "output_name",
                format!("condition_{}", data.id.unwrap_or(0)),
                "string",
            );
        }
        "math" => {
            let operation = table_get(MATH_UI_TO_OP, ui_selection).unwrap_or("add");
            node.set_param("operation", operation, "string");
        }
        "timer" => {
            let duration = data
                .duration
                .as_ref()
                .and_then(ParamValue::as_f64)
                .unwrap_or(1.0);
            node.set_param("duration", duration, "float");
            node.set_param("unit", "seconds", "string");
        }
        "variable" => {
            node.set_param(
                "name",
                data.name.clone().unwrap_or_else(|| "var".to_string()),
                "string",
            );
            node.set_param(
                "initial_value",
                data.initial_value.clone().unwrap_or(ParamValue::Int(0)),
                "any",
            );
        }
        _ => {}
    }
}

fn convert_edge(
    conn: &CanvasConnection,
    id_map: &HashMap<i64, String>,
    diags: &mut Vec<Diagnostic>,
) -> Option<IREdge> {
    let from_id = id_map.get(&conn.from_node);
    let to_id = id_map.get(&conn.to_node);

    let (from_id, to_id) = match (from_id, to_id) {
        (Some(f), Some(t)) => (f, t),
        _ => {
            diags.push(Diagnostic::warning(
                "W3001",
                format!(
                    "Skipping edge with unmapped node ID: {} -> {}",
                    conn.from_node, conn.to_node
                ),
            ));
            return None;
        }
    };

    let is_flow = FLOW_PORTS.contains(&conn.from_port.as_str())
        || FLOW_PORTS.contains(&conn.to_port.as_str())
        || conn.from_port.starts_with("out_elif");

    Some(IREdge {
        from_node: from_id.clone(),
        from_port: conn.from_port.clone(),
        to_node: to_id.clone(),
        to_port: conn.to_port.clone(),
        edge_type: if is_flow { EdgeType::Flow } else { EdgeType::Data },
    })
}

fn safe_int(val: Option<&ParamValue>, default: i64) -> i64 {
    val.and_then(ParamValue::as_i64).unwrap_or(default)
}
