//! Evaluation of parsed expressions under a factor binding.

use std::collections::HashMap;

use super::parse::{Ast, BinOp};
use super::{ExprError, Value};

pub(crate) fn eval(ast: &Ast, bindings: &HashMap<String, f64>) -> Result<Value, ExprError> {
    match ast {
        Ast::Num(n) => Ok(Value::Num(*n)),
        Ast::Factor(name) => bindings
            .get(name)
            .map(|v| Value::Num(*v))
            .ok_or_else(|| ExprError::UnboundFactor(name.clone())),
        Ast::Neg(inner) => {
            let v = eval(inner, bindings)?;
            let n = v
                .as_num()
                .ok_or_else(|| ExprError::Type("cannot negate a boolean".to_string()))?;
            Ok(Value::Num(-n))
        }
        Ast::Bin(op, lhs, rhs) => {
            let l = eval(lhs, bindings)?;
            let r = eval(rhs, bindings)?;
            apply(*op, l, r)
        }
    }
}

fn apply(op: BinOp, l: Value, r: Value) -> Result<Value, ExprError> {
    match op {
        BinOp::Or | BinOp::And => {
            let (a, b) = match (l.as_bool(), r.as_bool()) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(ExprError::Type(format!(
                        "{} requires boolean operands",
                        logic_symbol(op)
                    )))
                }
            };
            Ok(Value::Bool(if op == BinOp::And { a && b } else { a || b }))
        }
        BinOp::Eq | BinOp::Ne => match (l, r) {
            (Value::Num(a), Value::Num(b)) => {
                Ok(Value::Bool(if op == BinOp::Eq { a == b } else { a != b }))
            }
            (Value::Bool(a), Value::Bool(b)) => {
                Ok(Value::Bool(if op == BinOp::Eq { a == b } else { a != b }))
            }
            _ => Err(ExprError::Type(
                "cannot compare a number with a boolean".to_string(),
            )),
        },
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let (a, b) = numeric_operands(op, l, r)?;
            Ok(Value::Bool(match op {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                _ => a >= b,
            }))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let (a, b) = numeric_operands(op, l, r)?;
            Ok(Value::Num(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                // IEEE semantics: division by zero yields an infinity.
                _ => a / b,
            }))
        }
    }
}

fn numeric_operands(op: BinOp, l: Value, r: Value) -> Result<(f64, f64), ExprError> {
    match (l.as_num(), r.as_num()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExprError::Type(format!(
            "{op:?} requires numeric operands"
        ))),
    }
}

fn logic_symbol(op: BinOp) -> &'static str {
    if op == BinOp::And {
        "&&"
    } else {
        "||"
    }
}

#[cfg(test)]
mod tests {
    use super::super::CompiledExpr;
    use super::*;

    #[test]
    fn division_by_zero_is_infinite() {
        let expr = CompiledExpr::parse("1 / 0").unwrap();
        let v = expr.evaluate(&HashMap::new()).unwrap();
        assert_eq!(v.as_num(), Some(f64::INFINITY));
    }

    #[test]
    fn equality_on_bools() {
        let expr = CompiledExpr::parse("(1 > 0) == (2 > 1)").unwrap();
        assert_eq!(expr.evaluate(&HashMap::new()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn mixed_equality_is_type_error() {
        let expr = CompiledExpr::parse("(1 > 0) == 1").unwrap();
        assert!(matches!(
            expr.evaluate(&HashMap::new()),
            Err(ExprError::Type(_))
        ));
    }

    #[test]
    fn ordering_on_bool_is_type_error() {
        let expr = CompiledExpr::parse("(1 > 0) < 2").unwrap();
        assert!(matches!(
            expr.evaluate(&HashMap::new()),
            Err(ExprError::Type(_))
        ));
    }
}
