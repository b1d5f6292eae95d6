// src/ir.rs
//
// =============================================================================
// ROBOGRAPH: WORKFLOW IR (v 0.1 )
// =============================================================================
//
// The canonical workflow representation.
// Both Canvas and Code map to/from IR, never directly to each other.
//
// Design Principles:
// 1. Flat owned sequences: nodes and edges are two Vecs, all cross-references
//    go through short string IDs (the graph may share sub-nodes).
// 2. Tagged parameter values: `ParamValue` carries int/float/bool/string/list
//    without collapsing everything to strings.
// 3. UI metadata is never part of semantic equality.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// The only IR version this build reads and writes.
pub const IR_VERSION: &str = "1.0";

// ============================================================================
// 1. SCALAR TYPE TAGS & PORT DIRECTION
// ============================================================================

/// Data types used in IR ports and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Float,
    Bool,
    String,
    Void,
    Any,
}

impl ValueType {
    /// Parse a type string, defaulting to `Any`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "int" => ValueType::Int,
            "float" => ValueType::Float,
            "bool" => ValueType::Bool,
            "string" => ValueType::String,
            "void" => ValueType::Void,
            _ => ValueType::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Void => "void",
            ValueType::Any => "any",
        }
    }
}

impl Serialize for ValueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Unknown type strings land on Any rather than failing the document.
impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ValueType::from_str_lossy(&s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

// ============================================================================
// 2. PARAMETER VALUES
// ============================================================================

/// A dynamically typed parameter value.
///
/// Int and Float compare numerically equal when they denote the same number,
/// matching the loose equality the round-trip comparison relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    Json(serde_json::Value),
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        use ParamValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(a), Str(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            _ => false,
        }
    }
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) => Some(*f as i64),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Stringify like Python `str()`: `True`, `2`, `2.0`, bare strings.
    pub fn py_str(&self) -> String {
        match self {
            ParamValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => fmt_float(*f),
            ParamValue::Str(s) => s.clone(),
            ParamValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.py_repr()).collect();
                format!("[{}]", inner.join(", "))
            }
            ParamValue::Json(v) => v.to_string(),
        }
    }

    /// Stringify like Python `repr()`: strings come back quoted.
    pub fn py_repr(&self) -> String {
        match self {
            ParamValue::Str(s) => {
                let escaped = s
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n")
                    .replace('\t', "\\t");
                format!("'{escaped}'")
            }
            other => other.py_str(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Format a float the way Python prints it: integral values keep one decimal.
pub fn fmt_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// A typed parameter value on an IR node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IRParam {
    pub name: String,
    pub value: ParamValue,
    #[serde(default = "default_param_type")]
    pub param_type: String,
}

fn default_param_type() -> String {
    "string".to_string()
}

impl IRParam {
    pub fn new(name: &str, value: impl Into<ParamValue>, param_type: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            param_type: param_type.to_string(),
        }
    }
}

// ============================================================================
// 3. NODES & EDGES
// ============================================================================

/// The kind/category of an IR node. Closed set; unknown strings land on
/// `Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Action,
    Sensor,
    Logic,
    Math,
    Timer,
    Variable,
    Comparison,
    Stop,
    Opaque,
    Custom,
}

impl Serialize for NodeKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeKind::from_str_lossy(&s))
    }
}

impl NodeKind {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "action" => NodeKind::Action,
            "sensor" => NodeKind::Sensor,
            "logic" => NodeKind::Logic,
            "math" => NodeKind::Math,
            "timer" => NodeKind::Timer,
            "variable" => NodeKind::Variable,
            "comparison" => NodeKind::Comparison,
            "stop" => NodeKind::Stop,
            "opaque" => NodeKind::Opaque,
            _ => NodeKind::Custom,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Action => "action",
            NodeKind::Sensor => "sensor",
            NodeKind::Logic => "logic",
            NodeKind::Math => "math",
            NodeKind::Timer => "timer",
            NodeKind::Variable => "variable",
            NodeKind::Comparison => "comparison",
            NodeKind::Stop => "stop",
            NodeKind::Opaque => "opaque",
            NodeKind::Custom => "custom",
        }
    }
}

/// Edge type: control flow or data flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Flow,
    Data,
}

impl Default for EdgeType {
    fn default() -> Self {
        EdgeType::Flow
    }
}

/// UI metadata for a node. Not part of semantic comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUi {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_node_width")]
    pub width: f64,
    #[serde(default = "default_node_height")]
    pub height: f64,
    #[serde(default)]
    pub collapsed: bool,
}

fn default_node_width() -> f64 {
    180.0
}

fn default_node_height() -> f64 {
    110.0
}

impl Default for NodeUi {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 180.0,
            height: 110.0,
            collapsed: false,
        }
    }
}

/// Code location for source mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpan {
    #[serde(default)]
    pub line_start: usize,
    #[serde(default)]
    pub line_end: usize,
    #[serde(default)]
    pub col_start: usize,
    #[serde(default)]
    pub col_end: usize,
}

/// A node in the workflow IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IRNode {
    pub id: String,
    pub schema_id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub params: BTreeMap<String, IRParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<NodeUi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_span: Option<SourceSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque_code: Option<String>,
}

impl IRNode {
    pub fn new(id: impl Into<String>, schema_id: &str, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            schema_id: schema_id.to_string(),
            kind,
            params: BTreeMap::new(),
            ui: None,
            source_span: None,
            opaque_code: None,
        }
    }

    /// Generate a fresh opaque node ID.
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    /// Get a parameter value by name.
    pub fn param_value(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name).map(|p| &p.value)
    }

    pub fn param_str(&self, name: &str, default: &str) -> String {
        match self.param_value(name) {
            Some(v) => v.py_str(),
            None => default.to_string(),
        }
    }

    /// Set a parameter value.
    pub fn set_param(&mut self, name: &str, value: impl Into<ParamValue>, param_type: &str) {
        self.params
            .insert(name.to_string(), IRParam::new(name, value, param_type));
    }
}

/// A directed edge in the workflow IR. Ports are plain strings agreed
/// between schema and IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IREdge {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
    #[serde(default)]
    pub edge_type: EdgeType,
}

impl IREdge {
    pub fn flow(from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> Self {
        Self {
            from_node: from_node.to_string(),
            from_port: from_port.to_string(),
            to_node: to_node.to_string(),
            to_port: to_port.to_string(),
            edge_type: EdgeType::Flow,
        }
    }
}

/// A workflow-level variable declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IRVariable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<ParamValue>,
    #[serde(default = "default_value_type")]
    pub value_type: String,
}

fn default_value_type() -> String {
    "number".to_string()
}

// ============================================================================
// 4. THE WORKFLOW
// ============================================================================

#[derive(Debug, Error)]
pub enum IrError {
    #[error("unsupported ir_version '{0}' (this build reads {IR_VERSION})")]
    UnsupportedVersion(String),
    #[error("failed to parse workflow JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The complete Workflow Intermediate Representation.
///
/// Created fresh by a lowering stage, validated, possibly normalized for
/// comparison, and consumed by codegen / canvas-gen / runtime. Downstream
/// stages treat it as immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowIR {
    pub ir_version: String,
    pub name: String,
    pub robot_type: String,
    pub brand: String,
    pub nodes: Vec<IRNode>,
    pub edges: Vec<IREdge>,
    pub variables: Vec<IRVariable>,
}

impl Default for WorkflowIR {
    fn default() -> Self {
        Self::for_robot("go2")
    }
}

impl WorkflowIR {
    pub fn for_robot(robot_type: &str) -> Self {
        Self {
            ir_version: IR_VERSION.to_string(),
            name: String::new(),
            robot_type: robot_type.to_string(),
            brand: brand_for(robot_type).to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Find a node by ID.
    pub fn node(&self, node_id: &str) -> Option<&IRNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Get all nodes of a specific kind.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&IRNode> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }

    /// Get all edges originating from a node.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&IREdge> {
        self.edges.iter().filter(|e| e.from_node == node_id).collect()
    }

    /// Get all edges targeting a node.
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&IREdge> {
        self.edges.iter().filter(|e| e.to_node == node_id).collect()
    }

    /// Nodes with no incoming flow edge, excluding comparison data producers.
    pub fn entry_nodes(&self) -> Vec<&IRNode> {
        let targets: std::collections::HashSet<&str> = self
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Flow)
            .map(|e| e.to_node.as_str())
            .collect();
        self.nodes
            .iter()
            .filter(|n| !targets.contains(n.id.as_str()) && n.kind != NodeKind::Comparison)
            .collect()
    }

    pub fn add_node(&mut self, node: IRNode) {
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, edge: IREdge) {
        self.edges.push(edge);
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Deserialize from JSON, rejecting incompatible IR versions.
    pub fn from_json(json: &str) -> Result<Self, IrError> {
        let probe: serde_json::Value = serde_json::from_str(json)?;
        if let Some(version) = probe.get("ir_version").and_then(serde_json::Value::as_str) {
            if version != IR_VERSION {
                return Err(IrError::UnsupportedVersion(version.to_string()));
            }
        }
        Ok(serde_json::from_value(probe)?)
    }
}

// Manual Deserialize so the version gate sits in one place no matter which
// entry point parses the document.
impl<'de> Deserialize<'de> for WorkflowIR {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default = "default_version")]
            ir_version: String,
            #[serde(default)]
            name: String,
            #[serde(default = "default_robot")]
            robot_type: String,
            #[serde(default)]
            brand: Option<String>,
            #[serde(default)]
            nodes: Vec<IRNode>,
            #[serde(default)]
            edges: Vec<IREdge>,
            #[serde(default)]
            variables: Vec<IRVariable>,
        }

        fn default_version() -> String {
            IR_VERSION.to_string()
        }
        fn default_robot() -> String {
            "go2".to_string()
        }

        let raw = Raw::deserialize(deserializer)?;
        if raw.ir_version != IR_VERSION {
            return Err(D::Error::custom(format!(
                "unsupported ir_version '{}' (this build reads {})",
                raw.ir_version, IR_VERSION
            )));
        }
        let brand = raw
            .brand
            .unwrap_or_else(|| brand_for(&raw.robot_type).to_string());
        Ok(WorkflowIR {
            ir_version: raw.ir_version,
            name: raw.name,
            robot_type: raw.robot_type,
            brand,
            nodes: raw.nodes,
            edges: raw.edges,
            variables: raw.variables,
        })
    }
}

/// Brand derivation for known robot types.
pub fn brand_for(robot_type: &str) -> &'static str {
    match robot_type {
        "go2" | "a1" | "b1" | "b2" | "h1" => "unitree",
        _ => "unknown",
    }
}
