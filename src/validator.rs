// src/validator.rs
//
// =============================================================================
// ROBOGRAPH: SEMANTIC VALIDATOR (v 0.1 )
// =============================================================================
//
// Checks a WorkflowIR against its node schemas. Each check appends
// diagnostics and mutates nothing; callers decide what an error means.
//
// Checks, in order: schema existence, parameter types, parameter
// constraints, dangling edges, robot compatibility.

use crate::diagnostics::Diagnostic;
use crate::ir::{NodeKind, ValueType, WorkflowIR};
use crate::schema::SchemaRegistry;

pub struct SemanticValidator;

impl SemanticValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run all validation checks on the IR.
    pub fn validate(&self, ir: &WorkflowIR) -> Vec<Diagnostic> {
        let mut diags: Vec<Diagnostic> = Vec::new();

        self.check_schemas_exist(ir, &mut diags);
        self.check_param_types(ir, &mut diags);
        self.check_param_constraints(ir, &mut diags);
        self.check_dangling_edges(ir, &mut diags);
        self.check_robot_compat(ir, &mut diags);

        if !diags.iter().any(Diagnostic::is_error) {
            diags.push(Diagnostic::info(
                "I4001",
                format!(
                    "Validation passed ({} nodes, {} edges)",
                    ir.nodes.len(),
                    ir.edges.len()
                ),
            ));
        }

        diags
    }

    /// Every non-opaque node must reference a known schema.
    fn check_schemas_exist(&self, ir: &WorkflowIR, diags: &mut Vec<Diagnostic>) {
        for node in &ir.nodes {
            if node.kind == NodeKind::Opaque {
                continue;
            }
            if SchemaRegistry::get(&node.schema_id).is_none() {
                diags.push(
                    Diagnostic::error("E2001", format!("Unknown schema: {}", node.schema_id))
                        .at_node(node.id.clone())
                        .with_suggestion(format!(
                            "Available schemas: {}",
                            SchemaRegistry::list_schema_ids().join(", ")
                        )),
                );
            }
        }
    }

    /// Parameter values present in the node must coerce to the schema's
    /// declared type. Numeric strings coerce; boolean mismatches only warn.
    fn check_param_types(&self, ir: &WorkflowIR, diags: &mut Vec<Diagnostic>) {
        for node in &ir.nodes {
            let schema = match SchemaRegistry::get(&node.schema_id) {
                Some(s) => s,
                None => continue,
            };

            for param in &schema.parameters {
                let ir_param = match node.params.get(&param.name) {
                    Some(p) => p,
                    None => continue,
                };
                let value = &ir_param.value;

                match param.param_type {
                    ValueType::Int => {
                        if value.as_i64().is_none() {
                            diags.push(
                                Diagnostic::error(
                                    "E2003",
                                    format!(
                                        "Parameter '{}' expects int, got '{}'",
                                        param.name,
                                        value.py_str()
                                    ),
                                )
                                .at_node(node.id.clone()),
                            );
                        }
                    }
                    ValueType::Float => {
                        if value.as_f64().is_none() {
                            diags.push(
                                Diagnostic::error(
                                    "E2003",
                                    format!(
                                        "Parameter '{}' expects float, got '{}'",
                                        param.name,
                                        value.py_str()
                                    ),
                                )
                                .at_node(node.id.clone()),
                            );
                        }
                    }
                    ValueType::Bool => {
                        if value.as_bool().is_none() {
                            diags.push(
                                Diagnostic::warning(
                                    "E2003",
                                    format!(
                                        "Parameter '{}' expects bool, got '{}'",
                                        param.name,
                                        value.py_str()
                                    ),
                                )
                                .at_node(node.id.clone()),
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Choices membership and numeric min/max bounds.
    fn check_param_constraints(&self, ir: &WorkflowIR, diags: &mut Vec<Diagnostic>) {
        for node in &ir.nodes {
            let schema = match SchemaRegistry::get(&node.schema_id) {
                Some(s) => s,
                None => continue,
            };

            for param_schema in &schema.parameters {
                let ir_param = match node.params.get(&param_schema.name) {
                    Some(p) => p,
                    None => continue,
                };
                let constraints = match &param_schema.constraints {
                    Some(c) => c,
                    None => continue,
                };
                let value = &ir_param.value;

                if let Some(choices) = &constraints.choices {
                    let as_text = value.py_str();
                    if !choices.iter().any(|c| c == &as_text) {
                        diags.push(
                            Diagnostic::error(
                                "E2004",
                                format!(
                                    "Parameter '{}' value '{}' not in allowed choices: {:?}",
                                    param_schema.name, as_text, choices
                                ),
                            )
                            .at_node(node.id.clone()),
                        );
                    }
                }

                if constraints.min_value.is_some() || constraints.max_value.is_some() {
                    if let Some(num_val) = value.as_f64() {
                        if let Some(min) = constraints.min_value {
                            if num_val < min {
                                diags.push(
                                    Diagnostic::error(
                                        "E2003",
                                        format!(
                                            "Parameter '{}' value {} below minimum {}",
                                            param_schema.name, num_val, min
                                        ),
                                    )
                                    .at_node(node.id.clone()),
                                );
                            }
                        }
                        if let Some(max) = constraints.max_value {
                            if num_val > max {
                                diags.push(
                                    Diagnostic::error(
                                        "E2003",
                                        format!(
                                            "Parameter '{}' value {} above maximum {}",
                                            param_schema.name, num_val, max
                                        ),
                                    )
                                    .at_node(node.id.clone()),
                                );
                            }
                        }
                    }
                }

            }
        }
    }

    /// Every edge endpoint must name an existing node.
    fn check_dangling_edges(&self, ir: &WorkflowIR, diags: &mut Vec<Diagnostic>) {
        let node_ids: std::collections::HashSet<&str> =
            ir.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &ir.edges {
            if !node_ids.contains(edge.from_node.as_str()) {
                diags.push(Diagnostic::error(
                    "E2005",
                    format!("Edge references nonexistent source node: {}", edge.from_node),
                ));
            }
            if !node_ids.contains(edge.to_node.as_str()) {
                diags.push(Diagnostic::error(
                    "E2005",
                    format!("Edge references nonexistent target node: {}", edge.to_node),
                ));
            }
        }
    }

    /// Schema robot_compat lists restrict the robots a node may target.
    /// Emitted at warning level under the historical E2007 code.
    fn check_robot_compat(&self, ir: &WorkflowIR, diags: &mut Vec<Diagnostic>) {
        for node in &ir.nodes {
            let schema = match SchemaRegistry::get(&node.schema_id) {
                Some(s) => s,
                None => continue,
            };
            if !schema.robot_compat.is_empty() && !schema.robot_compat.contains(&ir.robot_type) {
                diags.push(
                    Diagnostic::warning(
                        "E2007",
                        format!(
                            "Node '{}' may not be compatible with robot '{}'",
                            schema.display_name, ir.robot_type
                        ),
                    )
                    .at_node(node.id.clone()),
                );
            }
        }
    }
}

impl Default for SemanticValidator {
    fn default() -> Self {
        Self::new()
    }
}
