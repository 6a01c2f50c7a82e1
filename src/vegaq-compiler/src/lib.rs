//! vegaq-compiler: Vega spec rewriting
//!
//! Rewrites a chart spec so that every data source backed by a registered
//! query expression, plus everything derived from it, is fetched through a
//! single pushdown transform executed by the query service. Rewriting
//! fails closed: on any error the caller ships [`empty_spec`] instead of a
//! half-rewritten document.

mod rewrite;

pub use rewrite::{empty_spec, rewrite_spec, DATA_NAME_PREFIX, PUSHDOWN_TRANSFORM};
