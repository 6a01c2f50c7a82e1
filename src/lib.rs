//! vegaq: server-side pushdown of Vega transform chains
//!
//! Charts describe data manipulations declaratively; vegaq compiles those
//! chains into single pushdown instructions executed against a lazy Polars
//! query instead of row-by-row in the client.
//!
//! The pieces, front to back:
//!
//! - [`ExprRegistry`] - fingerprinted store of bound `LazyFrame`s
//! - [`rewrite_spec`] / [`empty_spec`] - spec graph rewriting with a
//!   fail-closed fallback document
//! - [`apply`] - ordered transform application onto a `LazyFrame`
//! - [`eval_expression`] - the restricted Vega expression language
//! - [`execute`] / [`execute_with`] - pushdown execution to JSON rows
//!
//! # Quick start
//!
//! ```rust,ignore
//! use polars::prelude::*;
//! use vegaq::{execute, rewrite_spec, ExecuteRequest, ExprRegistry};
//!
//! let registry = ExprRegistry::new();
//! let key = registry.bind(&df!("v" => [1.0, 2.0])?.lazy())?;
//!
//! // chart construction: rewrite the spec around the bound expression
//! let rewritten = rewrite_spec(&registry, &spec, &span)?;
//!
//! // interaction time: run one pushdown instruction
//! let request = ExecuteRequest::from_value(instruction)?;
//! let rows = execute(&registry, &request)?;
//! ```

pub mod config;
pub mod query;

pub use config::QueryConfig;
pub use query::{execute, execute_with, ExecuteRequest};

pub use vegaq_compiler::{empty_spec, rewrite_spec, DATA_NAME_PREFIX, PUSHDOWN_TRANSFORM};
pub use vegaq_expr::{eval_expression, Evaluator, Value};
pub use vegaq_shared::{rows, Error, ExprRegistry, Result};
pub use vegaq_transforms::{apply, TransformOp};
