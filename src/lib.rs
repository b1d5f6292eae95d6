// src/lib.rs
//
// =============================================================================
// ROBOGRAPH: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports public types.
//
// The crate is a bidirectional workflow compiler: a node-and-edge canvas
// graph and a restricted textual DSL are kept in sync through a canonical
// Intermediate Representation (IR). Both directions meet in `ir`; the
// runtime consumes validated IR.

// 1. Declare Modules
pub mod auditlog;
pub mod canvas;
pub mod codegen;
pub mod diagnostics;
pub mod dsl;
pub mod ir;
pub mod lowering;
pub mod normalizer;
pub mod robot;
pub mod runtime;
pub mod schema;
pub mod validator;

// 2. Re-exports (The Public API)
// These allow `use robograph::WorkflowIR` or `use robograph::Diagnostic`
// to work elsewhere.

pub use diagnostics::{Diagnostic, DiagnosticLevel};
pub use ir::{IREdge, IRNode, NodeKind, ParamValue, WorkflowIR};
pub use normalizer::IRNormalizer;
pub use robot::RobotAdapter;
pub use runtime::RuntimeEngine;
pub use schema::{NodeSchema, SchemaRegistry};
