// src/runtime/eval.rs
//
// =============================================================================
// ROBOGRAPH: CONDITION EVALUATOR (v 0.1 )
// =============================================================================
//
// Evaluates `condition_expr` strings against a restricted namespace. The
// expression is parsed with the crate's own DSL parser and walked here; no
// host-language eval is involved. The namespace carries True/False/None and
// result_<node>_<key> entries harvested from prior node results.
//
// Any parse or evaluation failure yields false; callers log the warning.

use std::collections::HashMap;

use crate::dsl::{self, Expr, Number, Stmt};
use crate::ir::ParamValue;

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Parse(String),
    UnknownName(String),
    Unsupported(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Parse(msg) => write!(f, "parse failed: {msg}"),
            EvalError::UnknownName(name) => write!(f, "unknown name: {name}"),
            EvalError::Unsupported(what) => write!(f, "unsupported expression: {what}"),
        }
    }
}

/// Evaluate a condition expression to a boolean.
pub fn eval_condition(expr: &str, names: &HashMap<String, ParamValue>) -> Result<bool, EvalError> {
    let expr = expr.trim();
    if expr.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if expr.eq_ignore_ascii_case("false") {
        return Ok(false);
    }

    let ast = parse_expression(expr)?;
    let value = eval_expr(&ast, names)?;
    Ok(truthy(&value))
}

/// Parse a standalone expression through the DSL frontend.
fn parse_expression(source: &str) -> Result<Expr, EvalError> {
    let (module, diags) = dsl::parse_source(source);
    if diags.iter().any(|d| d.code == "E1001" || d.code == "E1002") {
        return Err(EvalError::Parse(source.to_string()));
    }
    for stmt in module.body {
        if let Stmt::Expr { expr, .. } = stmt {
            return Ok(expr);
        }
    }
    Err(EvalError::Parse(source.to_string()))
}

fn eval_expr(expr: &Expr, names: &HashMap<String, ParamValue>) -> Result<ParamValue, EvalError> {
    match expr {
        Expr::Number(Number::Int(i)) => Ok(ParamValue::Int(*i)),
        Expr::Number(Number::Float(f)) => Ok(ParamValue::Float(*f)),
        Expr::Str(s) => Ok(ParamValue::Str(s.clone())),
        Expr::Bool(b) => Ok(ParamValue::Bool(*b)),
        Expr::Ident(name) => names
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Not(operand) => {
            let v = eval_expr(operand, names)?;
            Ok(ParamValue::Bool(!truthy(&v)))
        }
        Expr::BoolOp { left, op, right } => {
            let lv = eval_expr(left, names)?;
            match op.as_str() {
                // Short-circuit like the source language.
                "and" => {
                    if !truthy(&lv) {
                        Ok(lv)
                    } else {
                        eval_expr(right, names)
                    }
                }
                "or" => {
                    if truthy(&lv) {
                        Ok(lv)
                    } else {
                        eval_expr(right, names)
                    }
                }
                other => Err(EvalError::Unsupported(format!("bool op {other}"))),
            }
        }
        Expr::Compare { left, op, right } => {
            let lv = eval_expr(left, names)?;
            let rv = eval_expr(right, names)?;
            compare(&lv, op, &rv).map(ParamValue::Bool)
        }
        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, names)?;
            let num = v
                .as_f64()
                .ok_or_else(|| EvalError::Unsupported("unary on non-number".to_string()))?;
            let result = if op == "-" { -num } else { num };
            Ok(number_value(result, matches!(v, ParamValue::Int(_))))
        }
        Expr::Binary { left, op, right } => {
            let lv = eval_expr(left, names)?;
            let rv = eval_expr(right, names)?;
            binary(&lv, op, &rv)
        }
        Expr::Attribute { .. } | Expr::Call { .. } => {
            Err(EvalError::Unsupported("calls and attribute access".to_string()))
        }
    }
}

fn binary(lv: &ParamValue, op: &str, rv: &ParamValue) -> Result<ParamValue, EvalError> {
    // String concatenation is the one non-numeric arithmetic case.
    if op == "+" {
        if let (ParamValue::Str(a), ParamValue::Str(b)) = (lv, rv) {
            return Ok(ParamValue::Str(format!("{a}{b}")));
        }
    }

    let (a, b) = match (lv.as_f64(), rv.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(EvalError::Unsupported(format!(
                "arithmetic on '{}' {} '{}'",
                lv.py_str(),
                op,
                rv.py_str()
            )))
        }
    };
    let both_int = matches!(lv, ParamValue::Int(_)) && matches!(rv, ParamValue::Int(_));

    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Err(EvalError::Unsupported("division by zero".to_string()));
            }
            return Ok(ParamValue::Float(a / b));
        }
        "//" => {
            if b == 0.0 {
                return Err(EvalError::Unsupported("division by zero".to_string()));
            }
            (a / b).floor()
        }
        "%" => {
            if b == 0.0 {
                return Err(EvalError::Unsupported("modulo by zero".to_string()));
            }
            // Floor modulo: result takes the sign of the divisor.
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        "**" => a.powf(b),
        other => return Err(EvalError::Unsupported(format!("operator {other}"))),
    };

    Ok(number_value(result, both_int))
}

fn compare(lv: &ParamValue, op: &str, rv: &ParamValue) -> Result<bool, EvalError> {
    // Numbers compare numerically when both sides coerce.
    if let (Some(a), Some(b)) = (numeric(lv), numeric(rv)) {
        return Ok(match op {
            "==" => a == b,
            "!=" => a != b,
            "<" => a < b,
            ">" => a > b,
            "<=" => a <= b,
            ">=" => a >= b,
            other => return Err(EvalError::Unsupported(format!("comparison {other}"))),
        });
    }

    let (a, b) = (lv.py_str(), rv.py_str());
    Ok(match op {
        "==" => a == b,
        "!=" => a != b,
        "<" => a < b,
        ">" => a > b,
        "<=" => a <= b,
        ">=" => a >= b,
        other => return Err(EvalError::Unsupported(format!("comparison {other}"))),
    })
}

/// Numeric view used for comparisons; strings do not coerce here, matching
/// the source language's strict typing between "5" and 5.
fn numeric(v: &ParamValue) -> Option<f64> {
    match v {
        ParamValue::Int(i) => Some(*i as f64),
        ParamValue::Float(f) => Some(*f),
        ParamValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn number_value(value: f64, prefer_int: bool) -> ParamValue {
    if prefer_int && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        ParamValue::Int(value as i64)
    } else {
        ParamValue::Float(value)
    }
}

/// Source-language truthiness.
pub fn truthy(v: &ParamValue) -> bool {
    match v {
        ParamValue::Bool(b) => *b,
        ParamValue::Int(i) => *i != 0,
        ParamValue::Float(f) => *f != 0.0,
        ParamValue::Str(s) => !s.is_empty(),
        ParamValue::List(items) => !items.is_empty(),
        ParamValue::Json(value) => match value {
            serde_json::Value::Null => false,
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
            serde_json::Value::String(s) => !s.is_empty(),
            serde_json::Value::Array(a) => !a.is_empty(),
            serde_json::Value::Object(o) => !o.is_empty(),
        },
    }
}
