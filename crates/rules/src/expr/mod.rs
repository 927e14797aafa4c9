//! Expression grammar for math rules.
//!
//! An expression is a boolean combination (`&&`, `||`) of comparisons
//! (`==`, `!=`, `<`, `<=`, `>`, `>=`) over `+ - * /` arithmetic with
//! standard precedence. Operands are numeric literals or `[factor]`
//! placeholders bound to scalars at evaluation time.

mod eval;
mod parse;

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

pub(crate) use parse::Ast;

#[derive(Error, Debug)]
pub enum ExprError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("no binding for factor [{0}]")]
    UnboundFactor(String),

    #[error("type error: {0}")]
    Type(String),
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Num(_) => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Bool(_) => None,
        }
    }
}

/// A parsed expression, ready for repeated evaluation.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    ast: Ast,
}

impl CompiledExpr {
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        Ok(Self {
            ast: parse::parse(input)?,
        })
    }

    /// Evaluate under the given factor bindings. A factor without a binding
    /// is an error; the result is boolean for comparison/boolean
    /// expressions and numeric for pure arithmetic.
    pub fn evaluate(&self, bindings: &HashMap<String, f64>) -> Result<Value, ExprError> {
        eval::eval(&self.ast, bindings)
    }
}

/// Extract `[factor]` placeholder names in order of first appearance,
/// deduplicated.
pub fn extract_factors(expr: &str) -> Vec<String> {
    let re = Regex::new(r"\[(.+?)\]").expect("factor regex");
    let mut seen = Vec::new();
    for cap in re.captures_iter(expr) {
        let name = cap[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// The sub-expression left of the first comparison operator, used to report
/// a scalar "current value" with an alert.
///
/// Compound boolean expressions (`&&`/`||`) have no single current value;
/// callers fall back to 0 for those.
pub fn comparison_lhs(expr: &str) -> Option<String> {
    if expr.contains("&&") || expr.contains("||") {
        return None;
    }
    let re = Regex::new(r"==|!=|<=|>=|<|>").expect("comparison regex");
    re.find(expr).map(|m| expr[..m.start()].trim().to_string())
}
