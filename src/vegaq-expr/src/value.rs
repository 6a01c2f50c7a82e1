//! Evaluation values
//!
//! Every evaluated expression is either a host-side value (a JSON-shaped
//! scalar or collection known at evaluation time) or a column expression on
//! the backing query. Operators branch once on the case pair instead of
//! relying on duck-typed dispatch.

use indexmap::IndexMap;
use polars::prelude::{lit, Expr, NULL};

use vegaq_shared::{Error, Result};

/// An evaluated expression value
#[derive(Debug, Clone)]
pub enum Value {
    /// Host null
    Null,
    /// Host boolean
    Bool(bool),
    /// Host number
    Number(f64),
    /// Host string
    Str(String),
    /// Host array (selection stores, substituted parameters)
    Array(Vec<Value>),
    /// Host object (selection store entries)
    Object(IndexMap<String, Value>),
    /// Column expression on the backing query
    Column(Expr),
}

impl Value {
    /// Name of the value's case, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Column(_) => "column",
        }
    }

    /// JS truthiness of a host value; `None` for column expressions.
    pub fn host_truthy(&self) -> Option<bool> {
        match self {
            Value::Null => Some(false),
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0 && !n.is_nan()),
            Value::Str(s) => Some(!s.is_empty()),
            Value::Array(_) | Value::Object(_) => Some(true),
            Value::Column(_) => None,
        }
    }

    /// Lift the value into a column expression.
    ///
    /// Host scalars become literals; arrays and objects have no column
    /// form and error.
    pub fn into_expr(self) -> Result<Expr> {
        match self {
            Value::Null => Ok(lit(NULL)),
            Value::Bool(b) => Ok(lit(b)),
            Value::Number(n) => Ok(lit(n)),
            Value::Str(s) => Ok(lit(s)),
            Value::Column(e) => Ok(e),
            other => Err(Error::evaluator(format!(
                "a {} value has no column form",
                other.type_name()
            ))),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_truthy() {
        assert_eq!(Value::Null.host_truthy(), Some(false));
        assert_eq!(Value::Number(0.0).host_truthy(), Some(false));
        assert_eq!(Value::Number(2.0).host_truthy(), Some(true));
        assert_eq!(Value::Str(String::new()).host_truthy(), Some(false));
        assert_eq!(Value::Array(vec![]).host_truthy(), Some(true));
        assert_eq!(Value::Column(lit(1)).host_truthy(), None);
    }

    #[test]
    fn test_collections_have_no_column_form() {
        assert!(Value::Array(vec![]).into_expr().is_err());
        assert!(Value::Number(1.5).into_expr().is_ok());
    }
}
