//! Runtime configuration for query execution

use serde::Deserialize;

/// Options for the query execution service.
///
/// Deserializable so hosts can ship it alongside their own settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Cap on returned rows, applied as a lazy limit before execution.
    pub max_rows: Option<u32>,

    /// Offload collection onto a dedicated worker per request. Workers do
    /// not share frames across concurrent executions.
    #[cfg(feature = "parallel")]
    pub parallel: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.max_rows, None);
    }

    #[test]
    fn test_deserialize() {
        let config: QueryConfig = serde_json::from_str(r#"{"max_rows": 500}"#).unwrap();
        assert_eq!(config.max_rows, Some(500));
        let config: QueryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_rows, None);
    }
}
