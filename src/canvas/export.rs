// src/canvas/export.rs
//
// =============================================================================
// ROBOGRAPH: IR -> CANVAS (v 0.1 )
// =============================================================================
//
// Converts a WorkflowIR back into the editor's graph format. Node kinds map
// through the reverse UI tables; nodes without usable positions trigger the
// auto-layout pass first.

use std::collections::HashMap;

use crate::canvas::layout::LayoutEngine;
use crate::canvas::{CanvasConnection, CanvasGraph, CanvasNode, Position};
use crate::diagnostics::Diagnostic;
use crate::ir::{IRNode, NodeKind, ParamValue, WorkflowIR};

// Reverse map: action ID to UI display name.
const ACTION_ID_TO_UI: &[(&str, &str)] = &[
    ("lift_right_leg", "Lift Right Leg"),
    ("stand", "Stand"),
    ("sit", "Sit"),
    ("walk", "Walk"),
    ("stop", "Stop"),
];

// Reverse map: sensor type to UI display name.
const SENSOR_ID_TO_UI: &[(&str, &str)] = &[
    ("ultrasonic", "Read Ultrasonic"),
    ("infrared", "Read Infrared"),
    ("camera", "Read Camera"),
    ("imu", "Read IMU"),
    ("odometry", "Read Odometry"),
];

// Reverse map: operator symbol to UI display name.
const OP_TO_COMPARISON_UI: &[(&str, &str)] = &[
    ("==", "Equal"),
    ("!=", "Not Equal"),
    (">", "Greater Than"),
    ("<", "Less Than"),
    (">=", "Greater Equal"),
    ("<=", "Less Equal"),
];

// Reverse map: math operation to UI display name.
const MATH_OP_TO_UI: &[(&str, &str)] = &[
    ("add", "Add"),
    ("subtract", "Subtract"),
    ("multiply", "Multiply"),
    ("divide", "Divide"),
    ("power", "Power"),
    ("modulo", "Modulo"),
    ("min", "Min"),
    ("max", "Max"),
    ("abs", "Abs"),
    ("sum", "Sum"),
    ("average", "Average"),
];

fn table_get(table: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Convert IR to a canvas graph document.
pub fn export_graph(ir: &WorkflowIR) -> (CanvasGraph, Vec<Diagnostic>) {
    let mut diags: Vec<Diagnostic> = Vec::new();

    // Auto-layout when any node lacks a usable position.
    let needs_layout = ir
        .nodes
        .iter()
        .any(|n| n.ui.is_none() || n.ui.as_ref().map_or(true, |ui| ui.x == 0.0 && ui.y == 0.0));
    let laid_out;
    let ir = if needs_layout {
        let mut clone = ir.clone();
        LayoutEngine::new().layout(&mut clone);
        laid_out = clone;
        &laid_out
    } else {
        ir
    };

    let mut nodes: Vec<CanvasNode> = Vec::new();
    let mut id_map: HashMap<String, i64> = HashMap::new();

    for (idx, ir_node) in ir.nodes.iter().enumerate() {
        let canvas_node = convert_node(ir_node, idx as i64, &mut diags);
        nodes.push(canvas_node);
        id_map.insert(ir_node.id.clone(), idx as i64);
    }

    let mut connections: Vec<CanvasConnection> = Vec::new();
    for edge in &ir.edges {
        if let (Some(&from_id), Some(&to_id)) =
            (id_map.get(&edge.from_node), id_map.get(&edge.to_node))
        {
            connections.push(CanvasConnection {
                from_node: from_id,
                from_port: edge.from_port.clone(),
                to_node: to_id,
                to_port: edge.to_port.clone(),
            });
        }
    }

    diags.push(Diagnostic::info(
        "I4003",
        format!(
            "IR to canvas: {} nodes, {} connections",
            nodes.len(),
            connections.len()
        ),
    ));

    (CanvasGraph { nodes, connections }, diags)
}

fn convert_node(ir_node: &IRNode, canvas_id: i64, diags: &mut Vec<Diagnostic>) -> CanvasNode {
    let mut base = CanvasNode {
        id: Some(canvas_id),
        position: ir_node
            .ui
            .as_ref()
            .map(|ui| Position { x: ui.x, y: ui.y })
            .unwrap_or(Position { x: 100.0, y: 100.0 }),
        ..CanvasNode::default()
    };

    match ir_node.kind {
        NodeKind::Action => {
            let action = ir_node.param_str("action", "stand");
            let ui_name = table_get(ACTION_ID_TO_UI, &action)
                .map(str::to_string)
                .unwrap_or_else(|| py_title(&action.replace('_', " ")));
            base.display_name = "Action Execution".to_string();
            base.node_type = Some("action_execution".to_string());
            base.ui_selection = Some(ui_name);
        }
        NodeKind::Stop => {
            base.display_name = "Action Execution".to_string();
            base.node_type = Some("action_execution".to_string());
            base.ui_selection = Some("Stop".to_string());
        }
        NodeKind::Sensor => {
            let sensor = ir_node.param_str("sensor_type", "imu");
            let ui_name = table_get(SENSOR_ID_TO_UI, &sensor)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Read {}", py_title(&sensor)));
            base.display_name = "Sensor Input".to_string();
            base.node_type = Some("sensor_input".to_string());
            base.ui_selection = Some(ui_name);
        }
        NodeKind::Timer => {
            base.display_name = "Timer".to_string();
            base.node_type = Some("timer".to_string());
            base.duration = Some(ParamValue::Str(ir_node.param_str("duration", "1.0")));
        }
        NodeKind::Logic if ir_node.schema_id == "builtin.if" => {
            base.display_name = "Logic Control".to_string();
            base.node_type = Some("if".to_string());
            base.ui_selection = Some("If".to_string());
            base.condition_expr = Some(ir_node.param_str("condition_expr", ""));
            if let Some(ParamValue::List(items)) = ir_node.param_value("elif_conditions") {
                if !items.is_empty() {
                    base.elif_conditions =
                        Some(items.iter().map(|v| v.py_str()).collect());
                }
            }
        }
        NodeKind::Logic if ir_node.schema_id == "builtin.while_loop" => {
            let loop_type = ir_node.param_str("loop_type", "while");
            base.display_name = "Logic Control".to_string();
            base.node_type = Some("while_loop".to_string());
            base.ui_selection = Some("While Loop".to_string());
            base.condition_expr = Some(ir_node.param_str("condition_expr", ""));
            if loop_type == "for" {
                base.loop_type = Some("For".to_string());
                base.for_start = Some(ParamValue::Str(ir_node.param_str("for_start", "0")));
                base.for_end = Some(ParamValue::Str(ir_node.param_str("for_end", "10")));
                base.for_step = Some(ParamValue::Str(ir_node.param_str("for_step", "1")));
            } else {
                base.loop_type = Some("While".to_string());
            }
        }
        NodeKind::Comparison => {
            let operator = ir_node.param_str("operator", "==");
            let ui_name = table_get(OP_TO_COMPARISON_UI, &operator).unwrap_or("Equal");
            base.display_name = "Condition".to_string();
            base.node_type = Some("comparison".to_string());
            base.ui_selection = Some(ui_name.to_string());
            base.left_value = Some(ir_node.param_str("input_expr", ""));
            base.right_value = Some(ir_node.param_str("compare_value", "0"));
        }
        NodeKind::Math => {
            let operation = ir_node.param_str("operation", "add");
            let ui_name = table_get(MATH_OP_TO_UI, &operation)
                .map(str::to_string)
                .unwrap_or_else(|| py_title(&operation));
            base.display_name = "Math".to_string();
            base.node_type = Some("math".to_string());
            base.ui_selection = Some(ui_name);
        }
        NodeKind::Variable => {
            base.display_name = "Variable".to_string();
            base.node_type = Some("variable".to_string());
            base.name = Some(ir_node.param_str("name", "var"));
            base.initial_value = Some(
                ir_node
                    .param_value("initial_value")
                    .cloned()
                    .unwrap_or(ParamValue::Int(0)),
            );
        }
        NodeKind::Opaque => {
            let code = ir_node
                .opaque_code
                .clone()
                .unwrap_or_else(|| ir_node.param_str("code", ""));
            base.display_name = "Opaque Code".to_string();
            base.node_type = Some("opaque".to_string());
            base.code = Some(code);
            diags.push(
                Diagnostic::warning(
                    "W3002",
                    "Opaque code block: cannot fully reconstruct canvas node",
                )
                .at_node(ir_node.id.clone()),
            );
        }
        _ => {
            base.display_name = format!("Unknown ({})", ir_node.schema_id);
            base.node_type = Some("unknown".to_string());
            diags.push(
                Diagnostic::warning(
                    "W3003",
                    format!("Unknown node kind: {}", ir_node.kind.as_str()),
                )
                .at_node(ir_node.id.clone()),
            );
        }
    }

    base
}

/// Title-casing with the source language's `str.title()` rules: a letter
/// following a non-letter is uppercased, every other letter is lowercased,
/// and non-letters (including underscores) pass through untouched. So
/// "custom_op" becomes "Custom_Op", not "Custom Op".
fn py_title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
