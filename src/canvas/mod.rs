// src/canvas/mod.rs
//
// =============================================================================
// ROBOGRAPH: CANVAS INTERCHANGE (v 0.1 )
// =============================================================================
//
// The serialized form of the node-and-edge editor. The canvas itself is an
// external collaborator; this module only speaks its JSON dialect:
//
//   { "nodes": [ {id, display_name, node_type, position, ...} ],
//     "connections": [ {from_node, from_port, to_node, to_port} ] }
//
// `import_graph` lowers canvas data to IR, `export_graph` goes the other
// way (running auto-layout when positions are missing).

pub mod export;
pub mod import;
pub mod layout;

pub use export::export_graph;
pub use import::import_graph;
pub use layout::LayoutEngine;

use serde::{Deserialize, Serialize};

use crate::ir::ParamValue;

/// Node position on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A canvas node as the editor serializes it. UI-level fields are optional;
/// numeric-ish fields arrive as strings or numbers depending on the widget,
/// so they are held as loose `ParamValue`s and coerced on import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_selection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elif_conditions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_start: Option<ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_end: Option<ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_step: Option<ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A canvas connection between two node ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasConnection {
    pub from_node: i64,
    #[serde(default = "default_from_port")]
    pub from_port: String,
    pub to_node: i64,
    #[serde(default = "default_to_port")]
    pub to_port: String,
}

fn default_from_port() -> String {
    "flow_out".to_string()
}

fn default_to_port() -> String {
    "flow_in".to_string()
}

/// The complete canvas document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasGraph {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub connections: Vec<CanvasConnection>,
}
