//! vegaq-shared: common types for the vegaq crates
//!
//! This crate holds the pieces every other vegaq crate depends on:
//!
//! - [`error`] - the error taxonomy and `Result` alias
//! - [`registry`] - the fingerprinted store of bound `LazyFrame` expressions
//! - [`rows`] - `DataFrame` to JSON row conversion for execute responses
//! - [`util`] - small JSON helpers shared by transform parsing

pub mod error;
pub mod registry;
pub mod rows;
pub mod util;

pub use error::{Error, Result};
pub use registry::ExprRegistry;
