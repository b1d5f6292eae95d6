// src/dsl/mod.rs
//
// =============================================================================
// ROBOGRAPH: TEXTUAL DSL (restricted program subset)
// =============================================================================
//
// # Philosophy
// The textual side of the workflow editor is a deliberately restricted
// subset: assignments, whitelisted calls, if/elif/else, while,
// `for i in range(...)`, literals, comments. Everything else survives as an
// opaque block so user intent is never silently dropped.
//
// This module defines the AST and the public parse entry point; `lexer` and
// `parser` hold the machinery.

pub mod lexer;
pub mod parser;

pub use lexer::{LexError, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::diagnostics::Diagnostic;

/// Parse DSL source into a module AST plus diagnostics. Never fails: on a
/// fatal lexer error the whole file comes back as a single opaque block.
pub fn parse_source(source: &str) -> (Module, Vec<Diagnostic>) {
    Parser::new(source).parse()
}

// ============================================================================
// 1. AST: EXPRESSIONS
// ============================================================================

/// Numeric literal payload. Ints and floats are kept apart so codegen can
/// reproduce `2` vs `2.0` exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Number),
    Str(String),
    Bool(bool),
    Ident(String),
    /// Dotted name access, e.g. `RobotContext.run_action`.
    Attribute {
        object: Box<Expr>,
        attribute: String,
    },
    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    BoolOp {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Dotted function name, or "unknown" for anything that is not a plain
    /// identifier chain.
    pub fn dotted_name(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::Attribute { object, attribute } => {
                format!("{}.{}", object.dotted_name(), attribute)
            }
            _ => "unknown".to_string(),
        }
    }
}

// ============================================================================
// 2. AST: STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ElifClause {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = expr` (augmented assignments arrive desugared).
    Assign {
        target: String,
        value: Expr,
        line: usize,
    },
    /// Standalone expression, typically a function call.
    Expr { expr: Expr, line: usize },
    If {
        condition: Expr,
        body: Vec<Stmt>,
        elifs: Vec<ElifClause>,
        else_body: Vec<Stmt>,
        line: usize,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    ForRange {
        variable: String,
        start: Expr,
        end: Expr,
        step: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    /// Function definition; only `execute_workflow` matters downstream.
    Def {
        name: String,
        body: Vec<Stmt>,
        line: usize,
    },
    Pass,
    Return { value: Option<Expr> },
    Break,
    Continue,
    Import {
        module: String,
        names: Vec<String>,
        is_from: bool,
    },
    Comment { text: String },
    /// Unparseable code preserved verbatim.
    Opaque { code: String, line: usize },
}

/// Top-level module (entire file).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

// ============================================================================
// 3. PRETTY-PRINTER
// ============================================================================

/// Convert an expression back to source text. This is what the code
/// generator ultimately emits for conditions, so its output must stay
/// stable across releases.
pub fn expr_to_string(expr: &Expr) -> String {
    match expr {
        Expr::Number(Number::Int(i)) => i.to_string(),
        Expr::Number(Number::Float(f)) => crate::ir::fmt_float(*f),
        Expr::Str(s) => repr_str(s),
        Expr::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Expr::Ident(name) => name.clone(),
        Expr::Attribute { object, attribute } => {
            format!("{}.{}", expr_to_string(object), attribute)
        }
        Expr::Binary { left, op, right }
        | Expr::Compare { left, op, right }
        | Expr::BoolOp { left, op, right } => {
            format!("{} {} {}", expr_to_string(left), op, expr_to_string(right))
        }
        Expr::Unary { op, operand } => format!("{}{}", op, expr_to_string(operand)),
        Expr::Not(operand) => format!("not {}", expr_to_string(operand)),
        Expr::Call { func, args } => {
            let rendered: Vec<String> = args.iter().map(expr_to_string).collect();
            format!("{}({})", func.dotted_name(), rendered.join(", "))
        }
    }
}

/// Quote a string the way the generated language expects it.
fn repr_str(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    format!("'{escaped}'")
}
