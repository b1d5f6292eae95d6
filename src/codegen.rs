// src/codegen.rs
//
// =============================================================================
// ROBOGRAPH: IR -> CODE (v 0.1 )
// =============================================================================
//
// Emits the textual workflow program from IR, plus a source map from node
// IDs to emitted line ranges so the editor can highlight.
//
// Emission order:
// 1. Comparison nodes whose result feeds a condition port (data producers
//    must be live before their consumers).
// 2. Entry nodes (no incoming flow edge), sorted by canvas x position.
//
// Never fails: semantic holes degrade to `pass` or comment lines, and the
// document always carries the fixed header, `def execute_workflow(...)`
// signature, and `__main__` footer.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::Diagnostic;
use crate::ir::{IRNode, NodeKind, WorkflowIR};
use crate::schema::SchemaRegistry;

// Maps math operation identifiers to operator symbols.
const MATH_OP_SYMBOLS: &[(&str, &str)] = &[
    ("add", "+"),
    ("subtract", "-"),
    ("multiply", "*"),
    ("divide", "/"),
    ("power", "**"),
    ("modulo", "%"),
];

/// Maps IR node IDs to generated code line ranges (1-based, inclusive).
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    map: HashMap<String, (usize, usize)>,
}

impl SourceMap {
    fn record(&mut self, node_id: &str, line_start: usize, line_end: usize) {
        self.map.insert(node_id.to_string(), (line_start, line_end));
    }

    pub fn get(&self, node_id: &str) -> Option<(usize, usize)> {
        self.map.get(node_id).copied()
    }

    pub fn as_map(&self) -> &HashMap<String, (usize, usize)> {
        &self.map
    }
}

type PortTargets = HashMap<String, Vec<(String, String)>>;

/// Generate workflow source text from IR.
pub struct CodeGenerator<'a> {
    ir: &'a WorkflowIR,
    diags: Vec<Diagnostic>,
    source_map: SourceMap,
    generated: HashSet<String>,
    outgoing: HashMap<String, PortTargets>,
    incoming: HashMap<String, PortTargets>,
    lines: Vec<String>,
}

/// Convenience entry point.
pub fn generate_code(ir: &WorkflowIR) -> (String, Vec<Diagnostic>, SourceMap) {
    CodeGenerator::new(ir).generate()
}

impl<'a> CodeGenerator<'a> {
    pub fn new(ir: &'a WorkflowIR) -> Self {
        let mut outgoing: HashMap<String, PortTargets> = HashMap::new();
        let mut incoming: HashMap<String, PortTargets> = HashMap::new();
        for node in &ir.nodes {
            outgoing.entry(node.id.clone()).or_default();
            incoming.entry(node.id.clone()).or_default();
        }
        for edge in &ir.edges {
            outgoing
                .entry(edge.from_node.clone())
                .or_default()
                .entry(edge.from_port.clone())
                .or_default()
                .push((edge.to_node.clone(), edge.to_port.clone()));
            incoming
                .entry(edge.to_node.clone())
                .or_default()
                .entry(edge.to_port.clone())
                .or_default()
                .push((edge.from_node.clone(), edge.from_port.clone()));
        }

        Self {
            ir,
            diags: Vec::new(),
            source_map: SourceMap::default(),
            generated: HashSet::new(),
            outgoing,
            incoming,
            lines: Vec::new(),
        }
    }

    pub fn generate(mut self) -> (String, Vec<Diagnostic>, SourceMap) {
        // File header.
        self.lines.extend(
            [
                "#!/usr/bin/env python3",
                "# -*- coding: utf-8 -*-",
                "\"\"\"Auto-generated workflow code\"\"\"",
                "",
                "import time",
                "from robot_context import RobotContext",
                "",
                "",
                "def execute_workflow(robot=None):",
                "    '''Execute the visual workflow'''",
            ]
            .map(String::from),
        );
        let header_len = self.lines.len();

        // Comparisons feeding condition ports come first.
        let comparison_ids: Vec<String> = self
            .ir
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Comparison)
            .map(|n| n.id.clone())
            .collect();
        for node_id in comparison_ids {
            let feeds_condition = self
                .outgoing
                .get(&node_id)
                .and_then(|ports| ports.get("result"))
                .map_or(false, |targets| {
                    targets.iter().any(|(_, port)| port == "condition")
                });
            if feeds_condition {
                let before = self.lines.len();
                self.generate_node(&node_id, 1);
                if self.lines.len() > before {
                    self.lines.push(String::new());
                }
            }
        }

        // Entry nodes sorted by canvas x position for stable ordering.
        let mut entries: Vec<&IRNode> = self.ir.entry_nodes();
        entries.sort_by(|a, b| {
            let ax = a.ui.as_ref().map_or(0.0, |ui| ui.x);
            let bx = b.ui.as_ref().map_or(0.0, |ui| ui.x);
            ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal)
        });
        let entry_ids: Vec<String> = entries.iter().map(|n| n.id.clone()).collect();

        for entry_id in entry_ids {
            if !self.generated.contains(&entry_id) {
                let before = self.lines.len();
                self.generate_node(&entry_id, 1);
                if self.lines.len() > before {
                    self.lines.push(String::new());
                }
            }
        }

        // Keep the function body syntactically valid.
        let has_body = self.lines[header_len..].iter().any(|l| !l.trim().is_empty());
        if !has_body {
            self.lines.push("    pass  # No connected workflow".to_string());
        }

        // Main block.
        self.lines.extend(
            [
                "",
                "if __name__ == '__main__':",
                "    # Initialize robot (simulation or real)",
                "    robot = None  # Replace with actual robot instance",
                "    execute_workflow(robot)",
            ]
            .map(String::from),
        );

        self.diags.push(Diagnostic::info(
            "I4001",
            format!(
                "Code generated: {} nodes, {} edges",
                self.ir.nodes.len(),
                self.ir.edges.len()
            ),
        ));

        let code = self.lines.join("\n");
        (code, self.diags, self.source_map)
    }

    /// Recursively emit code for a node and its downstream flow. The
    /// `generated` set prevents re-emission of shared nodes.
    fn generate_node(&mut self, node_id: &str, indent: usize) {
        if self.generated.contains(node_id) {
            return;
        }
        let node = match self.ir.node(node_id) {
            Some(n) => n.clone(),
            None => return,
        };

        self.generated.insert(node_id.to_string());
        let indent_str = "    ".repeat(indent);
        let line_start = self.lines.len() + 1;

        match node.kind {
            NodeKind::Logic if node.schema_id == "builtin.if" => {
                self.gen_if(&node, indent);
            }
            NodeKind::Logic if node.schema_id == "builtin.while_loop" => {
                if node.param_str("loop_type", "while") == "for" {
                    self.gen_for(&node, indent);
                } else {
                    self.gen_while(&node, indent);
                }
            }
            NodeKind::Comparison => {
                self.gen_comparison(&node, indent);
            }
            NodeKind::Action => {
                let action = node.param_str("action", "stand");
                self.lines
                    .push(format!("{indent_str}RobotContext.run_action('{action}')"));
                self.follow_flow(node_id, "flow_out", indent);
            }
            NodeKind::Stop => {
                self.lines.push(format!("{indent_str}RobotContext.stop()"));
                self.follow_flow(node_id, "flow_out", indent);
            }
            NodeKind::Sensor => {
                let sensor_type = node.param_str("sensor_type", "imu");
                self.lines
                    .push(format!("{indent_str}# Sensor read: {sensor_type}"));
                self.lines.push(format!(
                    "{indent_str}sensor_data = RobotContext.get_sensor_data()"
                ));
                self.follow_flow(node_id, "flow_out", indent);
            }
            NodeKind::Timer => {
                let duration = node.param_str("duration", "1.0");
                let unit = node.param_str("unit", "seconds");
                if unit == "milliseconds" {
                    self.lines
                        .push(format!("{indent_str}time.sleep({duration} / 1000)"));
                } else {
                    self.lines.push(format!("{indent_str}time.sleep({duration})"));
                }
                self.follow_flow(node_id, "flow_out", indent);
            }
            NodeKind::Math => {
                self.gen_math(&node, indent);
                self.follow_flow(node_id, "flow_out", indent);
            }
            NodeKind::Variable => {
                let name = node.param_str("name", "var");
                let value = node
                    .param_value("initial_value")
                    .map(|v| v.py_repr())
                    .unwrap_or_else(|| "0".to_string());
                self.lines.push(format!("{indent_str}{name} = {value}"));
                self.follow_flow(node_id, "flow_out", indent);
            }
            NodeKind::Opaque => {
                let code = node
                    .opaque_code
                    .clone()
                    .unwrap_or_else(|| node.param_str("code", ""));
                if !code.is_empty() {
                    self.lines.push(format!("{indent_str}# [opaque code block]"));
                    for code_line in code.split('\n') {
                        self.lines.push(format!("{indent_str}{code_line}"));
                    }
                }
                self.follow_flow(node_id, "flow_out", indent);
            }
            _ => {
                // Unknown kind: fall back to the schema code template.
                let template = SchemaRegistry::get(&node.schema_id)
                    .filter(|s| !s.code_template.is_empty())
                    .map(|s| s.code_template.clone());
                match template {
                    Some(mut template) => {
                        for (pname, pparam) in &node.params {
                            template =
                                template.replace(&format!("{{{pname}}}"), &pparam.value.py_str());
                        }
                        self.lines.push(format!("{indent_str}{template}"));
                    }
                    None => {
                        self.lines
                            .push(format!("{indent_str}# Unknown node: {}", node.schema_id));
                        self.diags.push(
                            Diagnostic::warning(
                                "W3005",
                                format!("Unknown node type in code generation: {}", node.schema_id),
                            )
                            .at_node(node_id.to_string()),
                        );
                    }
                }
                self.follow_flow(node_id, "flow_out", indent);
            }
        }

        self.source_map
            .record(node_id, line_start, self.lines.len());
    }

    /// Follow a port's connections and generate downstream code.
    fn follow_flow(&mut self, node_id: &str, port: &str, indent: usize) {
        let targets: Vec<String> = self
            .outgoing
            .get(node_id)
            .and_then(|ports| ports.get(port))
            .map(|ts| ts.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default();
        for target_id in targets {
            self.generate_node(&target_id, indent);
        }
    }

    fn gen_if(&mut self, node: &IRNode, indent: usize) {
        let indent_str = "    ".repeat(indent);
        let condition = self.condition_text(node);
        self.lines.push(format!("{indent_str}if {condition}:"));

        let true_targets = self.port_targets(&node.id, "out_if");
        if true_targets.is_empty() {
            self.lines.push(format!("{indent_str}    pass"));
        } else {
            for target_id in true_targets {
                self.generate_node(&target_id, indent + 1);
            }
        }

        if let Some(crate::ir::ParamValue::List(conds)) = node.param_value("elif_conditions") {
            let conds: Vec<String> = conds.iter().map(|c| c.py_str()).collect();
            for (i, elif_cond) in conds.iter().enumerate() {
                let mut cond = elif_cond.trim().to_string();
                if cond.is_empty() {
                    cond = "False".to_string();
                }
                self.lines.push(format!("{indent_str}elif {cond}:"));
                let elif_targets = self.port_targets(&node.id, &format!("out_elif_{i}"));
                if elif_targets.is_empty() {
                    self.lines.push(format!("{indent_str}    pass"));
                } else {
                    for target_id in elif_targets {
                        self.generate_node(&target_id, indent + 1);
                    }
                }
            }
        }

        let false_targets = self.port_targets(&node.id, "out_else");
        if !false_targets.is_empty() {
            self.lines.push(format!("{indent_str}else:"));
            for target_id in false_targets {
                self.generate_node(&target_id, indent + 1);
            }
        }
    }

    fn gen_while(&mut self, node: &IRNode, indent: usize) {
        let indent_str = "    ".repeat(indent);
        let condition = self.condition_text(node);
        self.lines.push(format!("{indent_str}while {condition}:"));

        let body_targets = self.port_targets(&node.id, "loop_body");
        if body_targets.is_empty() {
            self.lines.push(format!("{indent_str}    pass"));
        } else {
            for target_id in body_targets {
                self.generate_node(&target_id, indent + 1);
            }
        }

        // Continuation after the loop stays at the same indent.
        for target_id in self.port_targets(&node.id, "loop_end") {
            self.generate_node(&target_id, indent);
        }
    }

    fn gen_for(&mut self, node: &IRNode, indent: usize) {
        let indent_str = "    ".repeat(indent);
        let start = node.param_str("for_start", "0");
        let end = node.param_str("for_end", "10");
        let step = node.param_str("for_step", "1");
        self.lines
            .push(format!("{indent_str}for i in range({start}, {end}, {step}):"));

        let body_targets = self.port_targets(&node.id, "loop_body");
        if body_targets.is_empty() {
            self.lines.push(format!("{indent_str}    pass"));
        } else {
            for target_id in body_targets {
                self.generate_node(&target_id, indent + 1);
            }
        }

        for target_id in self.port_targets(&node.id, "loop_end") {
            self.generate_node(&target_id, indent);
        }
    }

    fn gen_comparison(&mut self, node: &IRNode, indent: usize) {
        let indent_str = "    ".repeat(indent);
        let mut input_expr = node.param_str("input_expr", "0");
        if input_expr.is_empty() {
            input_expr = "0".to_string();
        }
        let compare_value = node.param_str("compare_value", "0");
        let operator = node.param_str("operator", "==");
        let output_name = node.param_str("output_name", &format!("condition_{}", node.id));

        self.lines.push(format!(
            "{indent_str}{output_name} = {input_expr} {operator} {compare_value}"
        ));
    }

    fn gen_math(&mut self, node: &IRNode, indent: usize) {
        let indent_str = "    ".repeat(indent);
        let operation = node.param_str("operation", "add");
        let value_a = node.param_str("value_a", "0");
        let value_b = node.param_str("value_b", "0");

        let line = if let Some(symbol) = MATH_OP_SYMBOLS
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, s)| *s)
        {
            format!("{indent_str}result = {value_a} {symbol} {value_b}")
        } else {
            match operation.as_str() {
                "abs" => format!("{indent_str}result = abs({value_a})"),
                "min" => format!("{indent_str}result = min({value_a}, {value_b})"),
                "max" => format!("{indent_str}result = max({value_a}, {value_b})"),
                "sum" => format!("{indent_str}result = sum(values)"),
                "average" => format!("{indent_str}result = sum(values) / len(values)"),
                _ => format!("{indent_str}# Unknown math operation: {operation}"),
            }
        };
        self.lines.push(line);
    }

    /// Condition text for if/while nodes: a connected comparison's output
    /// name wins, then the condition_expr parameter, then a placeholder.
    /// Only the first incoming source on the condition port is considered.
    fn condition_text(&self, node: &IRNode) -> String {
        let sources = self
            .incoming
            .get(&node.id)
            .and_then(|ports| ports.get("condition"));
        if let Some((source_id, _)) = sources.and_then(|s| s.first()) {
            if let Some(source_node) = self.ir.node(source_id) {
                if source_node.kind == NodeKind::Comparison {
                    let output_name = source_node.param_str("output_name", "");
                    if !output_name.is_empty() {
                        return output_name;
                    }
                }
            }
        }

        let expr = node.param_str("condition_expr", "");
        if !expr.is_empty() {
            return expr;
        }

        "condition".to_string()
    }

    fn port_targets(&self, node_id: &str, port: &str) -> Vec<String> {
        self.outgoing
            .get(node_id)
            .and_then(|ports| ports.get(port))
            .map(|ts| ts.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }
}
