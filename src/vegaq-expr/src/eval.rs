//! Expression evaluation against a lazy query
//!
//! The evaluator walks the AST and produces a [`Value`]: either a host
//! scalar or a polars column expression. `datum` is bound to the query, so
//! member access on it resolves to columns of the frame's schema. Operators
//! branch on the host/column case pair; whenever one operand is a column,
//! the host side is lifted with `lit` and the result stays a column.

use polars::prelude::*;

use vegaq_shared::{Error, Result};

use crate::ast::{BinaryOp, Expr as Ast, UnaryOp};
use crate::builtins;
use crate::value::Value;

/// Evaluator with the target frame's resolved schema
pub struct Evaluator {
    schema: SchemaRef,
}

impl Evaluator {
    /// Build an evaluator for a lazy frame, resolving its schema once.
    pub fn new(frame: &LazyFrame) -> Result<Self> {
        let schema = frame.clone().collect_schema()?;
        Ok(Self { schema })
    }

    /// Dtype of a field in the target frame, if present.
    pub(crate) fn field_dtype(&self, field: &str) -> Option<&DataType> {
        self.schema.get(field)
    }

    /// Dtype of a column expression when it is a bare column reference.
    pub(crate) fn column_dtype(&self, expr: &polars::prelude::Expr) -> Option<&DataType> {
        match expr {
            polars::prelude::Expr::Column(name) => self.schema.get(name.as_str()),
            _ => None,
        }
    }

    /// Evaluate an expression tree.
    pub fn eval(&self, ast: &Ast) -> Result<Value> {
        match ast {
            Ast::Null => Ok(Value::Null),
            Ast::Bool(b) => Ok(Value::Bool(*b)),
            Ast::Number(n) => Ok(Value::Number(*n)),
            Ast::Str(s) => Ok(Value::Str(s.clone())),
            Ast::Array(items) => Ok(Value::Array(
                items.iter().map(|e| self.eval(e)).collect::<Result<_>>()?,
            )),
            Ast::Object(entries) => Ok(Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.eval(v)?)))
                    .collect::<Result<_>>()?,
            )),
            Ast::Ident(name) => self.resolve_ident(name),
            Ast::Member { base, field } => self.resolve_member(base, field),
            Ast::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>>>()?;
                builtins::call(self, name, values)
            }
            Ast::Unary { op, operand } => self.eval_unary(*op, self.eval(operand)?),
            Ast::Binary { op, left, right } => {
                self.eval_binary(*op, self.eval(left)?, self.eval(right)?)
            }
            Ast::Ternary {
                cond,
                then,
                otherwise,
            } => self.eval_ternary(self.eval(cond)?, self.eval(then)?, self.eval(otherwise)?),
        }
    }

    fn resolve_ident(&self, name: &str) -> Result<Value> {
        let constant = match name {
            "E" => std::f64::consts::E,
            "PI" => std::f64::consts::PI,
            "LN2" => std::f64::consts::LN_2,
            "LN10" => std::f64::consts::LN_10,
            "LOG2E" => std::f64::consts::LOG2_E,
            "LOG10E" => std::f64::consts::LOG10_E,
            "SQRT1_2" => std::f64::consts::FRAC_1_SQRT_2,
            "SQRT2" => std::f64::consts::SQRT_2,
            "MAX_VALUE" => f64::MAX,
            "MIN_VALUE" => f64::MIN_POSITIVE,
            "NaN" => f64::NAN,
            "datum" => {
                return Err(Error::evaluator(
                    "bare 'datum' cannot be used as a value; access a field on it",
                ))
            }
            _ => {
                return Err(Error::evaluator(format!(
                    "unsupported identifier '{name}'"
                )))
            }
        };
        Ok(Value::Number(constant))
    }

    fn resolve_member(&self, base: &Ast, field: &str) -> Result<Value> {
        match base {
            Ast::Ident(name) if name == "datum" => {
                if self.schema.get(field).is_none() {
                    return Err(Error::evaluator(format!(
                        "datum has no field '{field}'"
                    )));
                }
                Ok(Value::Column(col(field)))
            }
            _ => Err(Error::evaluator(
                "member access is only supported on 'datum'",
            )),
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: Value) -> Result<Value> {
        match op {
            UnaryOp::Not => match operand {
                Value::Column(e) => Ok(Value::Column(e.not())),
                host => Ok(Value::Bool(!host.host_truthy().unwrap_or(false))),
            },
            UnaryOp::Neg => match operand {
                Value::Number(n) => Ok(Value::Number(-n)),
                Value::Column(e) => Ok(Value::Column(lit(0.0) - e)),
                other => Err(Error::evaluator(format!(
                    "cannot negate a {} value",
                    other.type_name()
                ))),
            },
            UnaryOp::Pos => match operand {
                Value::Number(n) => Ok(Value::Number(n)),
                Value::Column(e) => Ok(Value::Column(e)),
                other => Err(Error::evaluator(format!(
                    "cannot coerce a {} value to a number",
                    other.type_name()
                ))),
            },
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value> {
        match op {
            BinaryOp::And => self.eval_and(left, right),
            BinaryOp::Or => self.eval_or(left, right),
            BinaryOp::Eq | BinaryOp::StrictEq => self.eval_equality(left, right, false),
            BinaryOp::Ne | BinaryOp::StrictNe => self.eval_equality(left, right, true),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.eval_comparison(op, left, right)
            }
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod => self.eval_arithmetic(op, left, right),
        }
    }

    fn eval_and(&self, left: Value, right: Value) -> Result<Value> {
        match (left, right) {
            (Value::Column(a), Value::Column(b)) => Ok(Value::Column(a.and(b))),
            (Value::Column(a), host) | (host, Value::Column(a)) => {
                // a host literal degrades per short-circuit rules
                match host.host_truthy() {
                    Some(true) => Ok(Value::Column(a)),
                    _ => Ok(Value::Bool(false)),
                }
            }
            (l, r) => Ok(Value::Bool(
                l.host_truthy().unwrap_or(false) && r.host_truthy().unwrap_or(false),
            )),
        }
    }

    fn eval_or(&self, left: Value, right: Value) -> Result<Value> {
        match (left, right) {
            (Value::Column(a), Value::Column(b)) => Ok(Value::Column(a.or(b))),
            (Value::Column(a), host) | (host, Value::Column(a)) => match host.host_truthy() {
                Some(true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Column(a)),
            },
            (l, r) => Ok(Value::Bool(
                l.host_truthy().unwrap_or(false) || r.host_truthy().unwrap_or(false),
            )),
        }
    }

    fn eval_equality(&self, left: Value, right: Value, negated: bool) -> Result<Value> {
        // the backing engine has no null literal in comparisons, so a null
        // operand compiles to an is-null test on the other side
        let value = match (left, right) {
            (Value::Null, Value::Column(e)) | (Value::Column(e), Value::Null) => {
                if negated {
                    Value::Column(e.is_not_null())
                } else {
                    Value::Column(e.is_null())
                }
            }
            (Value::Column(a), rhs) => {
                let b = rhs.into_expr()?;
                Value::Column(if negated { a.neq(b) } else { a.eq(b) })
            }
            (lhs, Value::Column(b)) => {
                let a = lhs.into_expr()?;
                Value::Column(if negated { a.neq(b) } else { a.eq(b) })
            }
            (l, r) => {
                let eq = host_eq(&l, &r);
                Value::Bool(if negated { !eq } else { eq })
            }
        };
        Ok(value)
    }

    fn eval_comparison(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value> {
        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            })),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            })),
            _ => {
                let a = left.into_expr()?;
                let b = right.into_expr()?;
                Ok(Value::Column(match op {
                    BinaryOp::Lt => a.lt(b),
                    BinaryOp::Le => a.lt_eq(b),
                    BinaryOp::Gt => a.gt(b),
                    _ => a.gt_eq(b),
                }))
            }
        }
    }

    fn eval_arithmetic(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value> {
        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })),
            (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
                Ok(Value::Str(format!("{a}{b}")))
            }
            _ => {
                let a = left.into_expr()?;
                let b = right.into_expr()?;
                Ok(Value::Column(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                }))
            }
        }
    }

    fn eval_ternary(&self, cond: Value, then: Value, otherwise: Value) -> Result<Value> {
        match cond {
            Value::Column(c) => {
                let t = then.into_expr()?;
                let o = otherwise.into_expr()?;
                Ok(Value::Column(when(c).then(t).otherwise(o)))
            }
            host => {
                if host.host_truthy().unwrap_or(false) {
                    Ok(then)
                } else {
                    Ok(otherwise)
                }
            }
        }
    }
}

/// Host-side equality; values of different cases are unequal.
fn host_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn frame() -> LazyFrame {
        df!(
            "x" => [Some(1.0f64), None, Some(3.0)],
            "c" => ["x", "y", "x"]
        )
        .unwrap()
        .lazy()
    }

    fn eval_str(text: &str) -> Result<Value> {
        let ast = parser::parse(text).map_err(|e| Error::evaluator(e.to_string()))?;
        Evaluator::new(&frame())?.eval(&ast)
    }

    fn filter_count(text: &str) -> usize {
        let pred = match eval_str(text).unwrap() {
            Value::Column(e) => e,
            other => panic!("expected a column predicate, got {other:?}"),
        };
        frame().filter(pred).collect().unwrap().height()
    }

    #[test]
    fn test_host_arithmetic() {
        match eval_str("1 + 2 * 3").unwrap() {
            Value::Number(n) => assert_eq!(n, 7.0),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_null_equality_compiles_to_is_null() {
        assert_eq!(filter_count("datum.x == null"), 1);
        assert_eq!(filter_count("datum.x != null"), 2);
    }

    #[test]
    fn test_column_comparison() {
        assert_eq!(filter_count("datum.x >= 3"), 1);
        assert_eq!(filter_count("datum.c == 'x'"), 2);
    }

    #[test]
    fn test_boolean_degrade() {
        // host true && column degrades to the column operand
        assert_eq!(filter_count("true && datum.c == 'y'"), 1);
        // host false || column degrades to the column operand
        assert_eq!(filter_count("false || datum.c == 'y'"), 1);
        // host true || column collapses to host true
        match eval_str("true || datum.c == 'y'").unwrap() {
            Value::Bool(true) => {}
            other => panic!("expected host true, got {other:?}"),
        }
    }

    #[test]
    fn test_ternary_on_column() {
        let value = eval_str("datum.c == 'x' ? 1 : 0").unwrap();
        let expr = match value {
            Value::Column(e) => e,
            other => panic!("expected column, got {other:?}"),
        };
        let df = frame().select([expr.alias("flag")]).collect().unwrap();
        let flags: Vec<Option<f64>> = df.column("flag").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(flags, vec![Some(1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_unknown_identifier_errors() {
        assert!(eval_str("someSignal > 2").is_err());
        assert!(eval_str("datum.missing > 2").is_err());
    }
}
