// src/diagnostics.rs
//
// =============================================================================
// ROBOGRAPH: DIAGNOSTICS (v 0.1 )
// =============================================================================
//
// The uniform message currency of the compiler.
//
// Responsibilities:
// 1. Define the `Diagnostic` value type every stage emits.
// 2. Keep the stable error-code directory (E1xxx syntax, E2xxx semantic,
//    W3xxx warning, I4xxx informational).
//
// No stage throws across its boundary on content errors; it returns its
// (possibly partial) output plus a list of these.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// 1. LEVELS & LOCATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warning,
    #[serde(rename = "info")]
    Info,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warn",
            DiagnosticLevel::Info => "info",
        }
    }
}

/// Location in code or on the canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

// ============================================================================
// 2. THE DIAGNOSTIC VALUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DiagnosticLocation>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofix: Option<serde_json::Value>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, DiagnosticLevel::Error, message)
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, DiagnosticLevel::Warning, message)
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, DiagnosticLevel::Info, message)
    }

    fn new(code: &str, level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            level,
            message: message.into(),
            location: None,
            suggestion: String::new(),
            autofix: None,
        }
    }

    pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.location
            .get_or_insert_with(DiagnosticLocation::default)
            .node_id = Some(node_id.into());
        self
    }

    pub fn at_line(mut self, line: usize, column: usize) -> Self {
        let loc = self.location.get_or_insert_with(DiagnosticLocation::default);
        loc.line = Some(line);
        loc.column = Some(column);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut loc = String::new();
        if let Some(l) = &self.location {
            if let Some(line) = l.line {
                loc = format!(" (line {line})");
            } else if let Some(node) = &l.node_id {
                loc = format!(" (node {node})");
            }
        }
        write!(
            f,
            "[{}] {}{}: {}",
            self.code,
            self.level.as_str().to_uppercase(),
            loc,
            self.message
        )
    }
}

/// True when no error-level diagnostic is present.
pub fn is_clean(diags: &[Diagnostic]) -> bool {
    !diags.iter().any(Diagnostic::is_error)
}

// ============================================================================
// 3. STABLE CODE DIRECTORY
// ============================================================================
//
// Codes are stable identifiers. Adding new codes is additive; changing the
// meaning of an existing code is a breaking change.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: &'static str,
    pub template: &'static str,
}

const CODE_DIRECTORY: &[CodeEntry] = &[
    // ---------- E1xxx: Syntax / Lexer / Parser ----------
    CodeEntry { code: "E1001", category: "syntax", severity: "error", template: "Lexer error: {detail}" },
    CodeEntry { code: "E1002", category: "syntax", severity: "error", template: "Parse error: {detail}" },
    CodeEntry { code: "E1003", category: "syntax", severity: "warn", template: "Unsupported for-loop syntax: only 'for x in range(...)' is supported" },
    CodeEntry { code: "E1004", category: "syntax", severity: "error", template: "Unexpected token: {token}" },
    CodeEntry { code: "E1005", category: "syntax", severity: "error", template: "Indentation error: tabs are not allowed, use spaces" },
    CodeEntry { code: "W1003", category: "syntax", severity: "warn", template: "Condition expression preserved as raw text: {detail}" },
    // ---------- E2xxx: Semantic / Schema ----------
    CodeEntry { code: "E2001", category: "semantic", severity: "error", template: "No schema found for node type '{node_type}'" },
    CodeEntry { code: "E2002", category: "semantic", severity: "error", template: "Missing required parameter '{param}' for node '{schema_id}'" },
    CodeEntry { code: "E2003", category: "semantic", severity: "error", template: "Parameter '{param}' value out of range: {value} (expected {min}-{max})" },
    CodeEntry { code: "E2004", category: "semantic", severity: "error", template: "Parameter '{param}' has invalid value: '{value}' (allowed: {choices})" },
    CodeEntry { code: "E2005", category: "semantic", severity: "error", template: "Dangling edge: node '{node_id}' not found" },
    CodeEntry { code: "E2006", category: "semantic", severity: "error", template: "Dangling edge: target node '{node_id}' not found" },
    CodeEntry { code: "E2007", category: "semantic", severity: "error", template: "Node '{schema_id}' is not compatible with robot '{robot_type}'" },
    CodeEntry { code: "E2008", category: "semantic", severity: "error", template: "Type mismatch on parameter '{param}': expected {expected}, got {actual}" },
    CodeEntry { code: "W2001", category: "lowering", severity: "warn", template: "No schema found for canvas node type '{node_type}'" },
    CodeEntry { code: "W2002", category: "lowering", severity: "warn", template: "Unknown function call '{func_name}' wrapped as opaque block" },
    // ---------- W3xxx: Warnings ----------
    CodeEntry { code: "W3001", category: "lowering", severity: "warn", template: "Skipping edge with unmapped node ID: {from_id} -> {to_id}" },
    CodeEntry { code: "W3002", category: "lowering", severity: "warn", template: "Opaque code block cannot be fully reconstructed on canvas" },
    CodeEntry { code: "W3003", category: "lowering", severity: "warn", template: "Unknown node kind for canvas conversion: {kind}" },
    CodeEntry { code: "W3004", category: "lowering", severity: "warn", template: "Opaque code block cannot be fully reconstructed on canvas" },
    CodeEntry { code: "W3005", category: "codegen", severity: "warn", template: "Unknown node type in code generation: {schema_id}" },
    // ---------- I4xxx: Informational ----------
    CodeEntry { code: "I4001", category: "codegen", severity: "info", template: "Code generated: {node_count} nodes, {edge_count} edges" },
    CodeEntry { code: "I4002", category: "lowering", severity: "info", template: "AST lowered: {node_count} nodes, {edge_count} edges" },
    CodeEntry { code: "I4003", category: "lowering", severity: "info", template: "IR to canvas: {node_count} nodes, {connection_count} connections" },
    CodeEntry { code: "I4004", category: "parser", severity: "info", template: "Function definition captured: {func_name}" },
];

/// Look up a code directory entry.
pub fn code_entry(code: &str) -> Option<&'static CodeEntry> {
    CODE_DIRECTORY.iter().find(|e| e.code == code)
}

/// Every registered code, in directory order.
pub fn all_codes() -> &'static [CodeEntry] {
    CODE_DIRECTORY
}
