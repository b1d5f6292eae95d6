// src/lowering.rs
//
// =============================================================================
// ROBOGRAPH: AST -> IR LOWERING (v 0.1 )
// =============================================================================
//
// Maps the parsed DSL AST onto the workflow IR.
//
// Recognized patterns:
// - RobotContext.run_action('name')   -> action node
// - RobotContext.stop()               -> stop node
// - RobotContext.get_sensor_data()    -> sensor node
// - time.sleep(n)                     -> timer node
// - if/elif/else                      -> if node + branch chains
// - while cond:                       -> while_loop node (loop_type=while)
// - for i in range(a, b, c):          -> while_loop node (loop_type=for)
// - name = literal                    -> variable node
// - anything else                     -> opaque node
//
// Statements chain through flow edges (prev.flow_out -> next.flow_in);
// branch bodies hang off out_if / out_elif_<i> / out_else / loop_body.

use crate::diagnostics::Diagnostic;
use crate::dsl::{expr_to_string, Expr, Module, Number, Stmt};
use crate::ir::{brand_for, IREdge, IRNode, NodeKind, ParamValue, WorkflowIR};

/// Lower a parsed module to a WorkflowIR. IDs are sequential decimal
/// strings assigned in conversion order.
pub struct AstLowering {
    ir: WorkflowIR,
    diags: Vec<Diagnostic>,
    node_counter: usize,
}

impl AstLowering {
    pub fn new() -> Self {
        Self {
            ir: WorkflowIR::default(),
            diags: Vec::new(),
            node_counter: 0,
        }
    }

    pub fn lower(mut self, ast: &Module, robot_type: &str) -> (WorkflowIR, Vec<Diagnostic>) {
        self.ir = WorkflowIR::for_robot(robot_type);
        self.ir.brand = brand_for(robot_type).to_string();

        let body = find_workflow_body(ast);

        let mut prev_node_id: Option<String> = None;
        let mut prev_port = "flow_out".to_string();

        for stmt in body {
            let node_ids = self.convert_statement(stmt);
            if let (Some(first), Some(prev)) = (node_ids.first(), prev_node_id.as_ref()) {
                self.ir
                    .add_edge(IREdge::flow(prev, &prev_port, first, "flow_in"));
            }
            if let Some(last) = node_ids.last() {
                prev_node_id = Some(last.clone());
                prev_port = "flow_out".to_string();
            }
        }

        self.diags.push(Diagnostic::info(
            "I4002",
            format!(
                "AST lowered: {} nodes, {} edges",
                self.ir.nodes.len(),
                self.ir.edges.len()
            ),
        ));
        (self.ir, self.diags)
    }

    fn next_id(&mut self) -> String {
        let nid = self.node_counter.to_string();
        self.node_counter += 1;
        nid
    }

    /// Convert a statement to IR node(s). Returns the created node IDs
    /// (first = entry, last = exit).
    fn convert_statement(&mut self, stmt: &Stmt) -> Vec<String> {
        match stmt {
            Stmt::Expr { expr, .. } => match expr {
                Expr::Call { .. } => self.convert_function_call(expr),
                _ => Vec::new(),
            },
            Stmt::If {
                condition,
                body,
                elifs,
                else_body,
                ..
            } => self.convert_if(condition, body, elifs, else_body),
            Stmt::While {
                condition, body, ..
            } => self.convert_while(condition, body),
            Stmt::ForRange {
                start,
                end,
                step,
                body,
                ..
            } => self.convert_for(start, end, step, body),
            Stmt::Assign { target, value, .. } => self.convert_assignment(target, value),
            Stmt::Opaque { code, .. } => self.convert_opaque(code),
            Stmt::Pass
            | Stmt::Comment { .. }
            | Stmt::Import { .. }
            | Stmt::Return { .. }
            | Stmt::Break
            | Stmt::Continue => Vec::new(),
            other => {
                // Unknown statement shape: preserve a marker opaque node.
                let label = stmt_label(other);
                self.convert_opaque(&format!("# unsupported: {label}"))
            }
        }
    }

    fn convert_function_call(&mut self, call: &Expr) -> Vec<String> {
        let (func, args) = match call {
            Expr::Call { func, args } => (func, args),
            _ => return Vec::new(),
        };
        let func_name = func.dotted_name();

        match func_name.as_str() {
            "RobotContext.run_action" => {
                let action = extract_string_arg(args, 0, "stand");
                let nid = self.next_id();
                let mut node = IRNode::new(&nid, "builtin.action_execution", NodeKind::Action);
                node.set_param("action", action, "string");
                self.ir.add_node(node);
                vec![nid]
            }
            "RobotContext.stop" => {
                let nid = self.next_id();
                let node = IRNode::new(&nid, "builtin.stop", NodeKind::Stop);
                self.ir.add_node(node);
                vec![nid]
            }
            "RobotContext.get_sensor_data" => {
                let nid = self.next_id();
                let mut node = IRNode::new(&nid, "builtin.sensor_input", NodeKind::Sensor);
                node.set_param("sensor_type", "imu", "string");
                self.ir.add_node(node);
                vec![nid]
            }
            "time.sleep" => {
                let duration = extract_number_arg(args, 0, 1.0);
                let nid = self.next_id();
                let mut node = IRNode::new(&nid, "builtin.timer", NodeKind::Timer);
                node.set_param("duration", duration, "float");
                node.set_param("unit", "seconds", "string");
                self.ir.add_node(node);
                vec![nid]
            }
            _ => {
                let code = expr_to_string(call);
                let nid = self.next_id();
                let mut node = IRNode::new(&nid, "builtin.opaque", NodeKind::Opaque);
                node.opaque_code = Some(code);
                self.ir.add_node(node);
                self.diags.push(Diagnostic::warning(
                    "W2002",
                    format!("Unknown function call '{func_name}' wrapped as opaque block"),
                ));
                vec![nid]
            }
        }
    }

    fn convert_if(
        &mut self,
        condition: &Expr,
        body: &[Stmt],
        elifs: &[crate::dsl::ElifClause],
        else_body: &[Stmt],
    ) -> Vec<String> {
        let nid = self.next_id();
        let condition_text = expr_to_string(condition);

        let mut node = IRNode::new(&nid, "builtin.if", NodeKind::Logic);
        node.set_param("condition_expr", condition_text, "string");
        if !elifs.is_empty() {
            let conds: Vec<ParamValue> = elifs
                .iter()
                .map(|ec| ParamValue::Str(expr_to_string(&ec.condition)))
                .collect();
            node.set_param("elif_conditions", ParamValue::List(conds), "string");
        }
        self.ir.add_node(node);

        self.convert_branch(body, &nid, "out_if");
        for (i, ec) in elifs.iter().enumerate() {
            self.convert_branch(&ec.body, &nid, &format!("out_elif_{i}"));
        }
        if !else_body.is_empty() {
            self.convert_branch(else_body, &nid, "out_else");
        }

        vec![nid]
    }

    fn convert_while(&mut self, condition: &Expr, body: &[Stmt]) -> Vec<String> {
        let nid = self.next_id();
        let condition_text = expr_to_string(condition);

        let mut node = IRNode::new(&nid, "builtin.while_loop", NodeKind::Logic);
        node.set_param("loop_type", "while", "string");
        node.set_param("condition_expr", condition_text, "string");
        node.set_param("for_start", 0i64, "int");
        node.set_param("for_end", 10i64, "int");
        node.set_param("for_step", 1i64, "int");
        self.ir.add_node(node);

        self.convert_branch(body, &nid, "loop_body");
        vec![nid]
    }

    fn convert_for(&mut self, start: &Expr, end: &Expr, step: &Expr, body: &[Stmt]) -> Vec<String> {
        let nid = self.next_id();

        let mut node = IRNode::new(&nid, "builtin.while_loop", NodeKind::Logic);
        node.set_param("loop_type", "for", "string");
        node.set_param("condition_expr", "", "string");
        node.set_param("for_start", extract_int(start, 0), "int");
        node.set_param("for_end", extract_int(end, 10), "int");
        node.set_param("for_step", extract_int(step, 1), "int");
        self.ir.add_node(node);

        self.convert_branch(body, &nid, "loop_body");
        vec![nid]
    }

    fn convert_assignment(&mut self, target: &str, value: &Expr) -> Vec<String> {
        // RHS delegating to a recognized call, e.g.
        // sensor_data = RobotContext.get_sensor_data()
        if let Expr::Call { func, .. } = value {
            let func_name = func.dotted_name();
            if matches!(
                func_name.as_str(),
                "RobotContext.get_sensor_data"
                    | "RobotContext.run_action"
                    | "RobotContext.stop"
                    | "time.sleep"
            ) {
                return self.convert_function_call(value);
            }
        }

        let nid = self.next_id();
        let mut node = IRNode::new(&nid, "builtin.variable", NodeKind::Variable);
        node.set_param("name", target, "string");
        node.set_param("initial_value", extract_literal(value), "any");
        self.ir.add_node(node);
        vec![nid]
    }

    fn convert_opaque(&mut self, code: &str) -> Vec<String> {
        let nid = self.next_id();
        let mut node = IRNode::new(&nid, "builtin.opaque", NodeKind::Opaque);
        node.opaque_code = Some(code.to_string());
        self.ir.add_node(node);
        vec![nid]
    }

    /// Convert a branch body, connecting the first node to parent:port and
    /// chaining the rest along flow_out.
    fn convert_branch(&mut self, stmts: &[Stmt], parent_id: &str, port: &str) {
        let mut prev_id = parent_id.to_string();
        let mut prev_port = port.to_string();
        for stmt in stmts {
            let node_ids = self.convert_statement(stmt);
            if let Some(first) = node_ids.first() {
                self.ir
                    .add_edge(IREdge::flow(&prev_id, &prev_port, first, "flow_in"));
                prev_id = node_ids.last().unwrap().clone();
                prev_port = "flow_out".to_string();
            }
        }
    }
}

impl Default for AstLowering {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience entry point.
pub fn lower_ast(ast: &Module, robot_type: &str) -> (WorkflowIR, Vec<Diagnostic>) {
    AstLowering::new().lower(ast, robot_type)
}

// ============================================================================
// HELPERS
// ============================================================================

/// Locate the workflow body: the `execute_workflow` function if present,
/// otherwise top-level statements minus imports, comments, pass, other
/// function defs, and the `__name__ == '__main__'` guard.
fn find_workflow_body(ast: &Module) -> Vec<&Stmt> {
    for stmt in &ast.body {
        if let Stmt::Def { name, body, .. } = stmt {
            if name == "execute_workflow" {
                return body.iter().collect();
            }
        }
    }

    let mut body: Vec<&Stmt> = Vec::new();
    for stmt in &ast.body {
        match stmt {
            Stmt::Import { .. } | Stmt::Comment { .. } | Stmt::Pass | Stmt::Def { .. } => {}
            Stmt::If { condition, .. } => {
                if is_main_guard(condition) {
                    continue;
                }
                body.push(stmt);
            }
            other => body.push(other),
        }
    }
    body
}

fn is_main_guard(condition: &Expr) -> bool {
    if let Expr::Compare { left, .. } = condition {
        if let Expr::Ident(name) = left.as_ref() {
            return name == "__name__";
        }
    }
    false
}

fn extract_string_arg(args: &[Expr], idx: usize, default: &str) -> String {
    match args.get(idx) {
        Some(Expr::Str(s)) => s.clone(),
        Some(Expr::Ident(name)) => name.clone(),
        _ => default.to_string(),
    }
}

fn extract_number_arg(args: &[Expr], idx: usize, default: f64) -> ParamValue {
    match args.get(idx) {
        Some(Expr::Number(Number::Int(i))) => ParamValue::Int(*i),
        Some(Expr::Number(Number::Float(f))) => ParamValue::Float(*f),
        _ => ParamValue::Float(default),
    }
}

fn extract_int(expr: &Expr, default: i64) -> i64 {
    match expr {
        Expr::Number(Number::Int(i)) => *i,
        Expr::Number(Number::Float(f)) => *f as i64,
        _ => default,
    }
}

/// Extract a literal value from an expression, falling back to the integer 0
/// for anything non-literal.
fn extract_literal(expr: &Expr) -> ParamValue {
    match expr {
        Expr::Number(Number::Int(i)) => ParamValue::Int(*i),
        Expr::Number(Number::Float(f)) => ParamValue::Float(*f),
        Expr::Str(s) => ParamValue::Str(s.clone()),
        Expr::Bool(b) => ParamValue::Bool(*b),
        Expr::Ident(name) => ParamValue::Str(name.clone()),
        _ => ParamValue::Int(0),
    }
}

fn stmt_label(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::Assign { .. } => "Assignment",
        Stmt::Expr { .. } => "ExpressionStatement",
        Stmt::If { .. } => "IfStatement",
        Stmt::While { .. } => "WhileStatement",
        Stmt::ForRange { .. } => "ForRangeStatement",
        Stmt::Def { .. } => "FunctionDef",
        Stmt::Pass => "PassStatement",
        Stmt::Return { .. } => "ReturnStatement",
        Stmt::Break => "BreakStatement",
        Stmt::Continue => "ContinueStatement",
        Stmt::Import { .. } => "ImportStatement",
        Stmt::Comment { .. } => "CommentNode",
        Stmt::Opaque { .. } => "OpaqueBlock",
    }
}
