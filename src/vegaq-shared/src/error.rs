//! Error types for vegaq
//!
//! Every failure in the rewrite/apply/execute path maps onto one of these
//! variants. All of them are terminal for the current request; nothing is
//! retried internally.

use polars::error::PolarsError;

/// Result type alias for vegaq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vegaq operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A registry key (or a `polars:`-prefixed data name) that no bound
    /// expression matches.
    #[error("unrecognized expression '{0}'")]
    UnknownExpression(String),

    /// A transform whose `type` has no implementation.
    #[error("transform of type '{0}' is not implemented")]
    UnrecognizedTransform(String),

    /// A recognized transform with an aggregation op we do not handle.
    #[error("unsupported aggregate op '{0}'")]
    UnsupportedOperator(String),

    /// A recognized transform with a unit list or configuration we do not
    /// handle.
    #[error("{0}")]
    UnsupportedUnit(String),

    /// Zipped field/op/alias (or sort field/order) lists of unequal length.
    #[error("mismatched {context} lengths: {left} vs {right}")]
    ArityMismatch {
        /// What was being zipped
        context: &'static str,
        /// Length of the first list
        left: usize,
        /// Length of the second list
        right: usize,
    },

    /// The expression parsed but uses a construct the evaluator does not
    /// implement, or failed to parse at all.
    #[error("expression error: {0}")]
    Evaluator(String),

    /// A transform object missing required keys or carrying values of the
    /// wrong shape.
    #[error("invalid transform: {0}")]
    InvalidTransform(String),

    /// A transform parameter references an extent signal that no extent
    /// transform in the chain publishes.
    #[error("no extent transform publishes signal '{0}'")]
    UnknownSignal(String),

    /// The spec document cannot be rewritten (malformed `data` section).
    #[error("rewrite failed: {0}")]
    Rewrite(String),

    /// Runtime failure while executing the pushdown query.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Errors from the backing polars engine
    #[error(transparent)]
    Polars(#[from] PolarsError),

    /// JSON (de)serialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an evaluator error with a custom message
    pub fn evaluator(msg: impl Into<String>) -> Self {
        Error::Evaluator(msg.into())
    }

    /// Create an invalid-transform error with a custom message
    pub fn invalid_transform(msg: impl Into<String>) -> Self {
        Error::InvalidTransform(msg.into())
    }

    /// Create an execution error with a custom message
    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownExpression("polars:abc".to_string());
        assert_eq!(err.to_string(), "unrecognized expression 'polars:abc'");

        let err = Error::UnsupportedOperator("argmax".to_string());
        assert_eq!(err.to_string(), "unsupported aggregate op 'argmax'");

        let err = Error::ArityMismatch {
            context: "fields/ops",
            left: 2,
            right: 3,
        };
        assert_eq!(err.to_string(), "mismatched fields/ops lengths: 2 vs 3");
    }
}
