//! Parse errors for the Vega expression language

/// Errors produced while parsing an expression string
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// Empty input
    #[error("empty expression")]
    EmptyInput,

    /// The input did not match the grammar
    #[error("invalid expression syntax near '{rest}'")]
    InvalidSyntax {
        /// The unconsumed tail of the input
        rest: String,
    },

    /// Internal nom error
    #[error("parse error: {message}")]
    Nom {
        /// Error message from nom
        message: String,
    },
}

/// Result type for parsing operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

impl From<nom::Err<nom::error::VerboseError<&str>>> for ParseError {
    fn from(err: nom::Err<nom::error::VerboseError<&str>>) -> Self {
        match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                let rest = e
                    .errors
                    .first()
                    .map(|(input, _)| truncate(input))
                    .unwrap_or_default();
                ParseError::InvalidSyntax { rest }
            }
            nom::Err::Incomplete(_) => ParseError::Nom {
                message: "incomplete input".to_string(),
            },
        }
    }
}

fn truncate(input: &str) -> String {
    input.chars().take(40).collect()
}
