//! vegaq-expr: restricted Vega expression language on Polars
//!
//! Parses the slice of the Vega expression language that chart transform
//! specs actually use and evaluates it against a `LazyFrame`, producing
//! either a host value or a polars column expression. Filter predicates and
//! formula columns both come out of [`eval_expression`].
//!
//! ```rust,ignore
//! use polars::prelude::*;
//! use vegaq_expr::{eval_expression, Value};
//!
//! let frame = df!("price" => [5.0, 50.0])?.lazy();
//! match eval_expression("datum.price > 10", &frame)? {
//!     Value::Column(predicate) => { /* frame.filter(predicate) */ }
//!     Value::Bool(true) => { /* vacuous predicate, keep everything */ }
//!     _ => {}
//! }
//! ```

pub mod ast;
mod builtins;
pub mod error;
pub mod eval;
pub mod parser;
mod selection;
pub mod value;

pub use error::{ParseError, ParseResult};
pub use eval::Evaluator;
pub use value::Value;

use polars::prelude::LazyFrame;
use vegaq_shared::{Error, Result};

/// Parse and evaluate an expression against a lazy frame.
pub fn eval_expression(text: &str, frame: &LazyFrame) -> Result<Value> {
    log::trace!("evaluating expression: {text}");
    let ast = parser::parse(text)
        .map_err(|e| Error::evaluator(format!("in '{text}': {e}")))?;
    Evaluator::new(frame)?.eval(&ast)
}
