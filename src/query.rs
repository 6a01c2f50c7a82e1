//! Query execution service
//!
//! Resolves a pushdown instruction against the registry, splices runtime
//! parameter values into expression text, applies the transform chain and
//! returns row-oriented data. Parameter splicing is textual on purpose: the
//! instruction's expressions are already serialized strings at this point,
//! and the reference shapes (`data("name")`, `vlSelectionTest("name"`) are
//! fixed by the chart runtime.

use polars::prelude::*;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use vegaq_shared::rows::rows_from_df;
use vegaq_shared::{Error, ExprRegistry, Result};

use crate::config::QueryConfig;

/// Prefix marking a parameter key as a data-backed value.
const DATA_PARAM_PREFIX: char = ':';

/// One pushdown execution request.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    /// Registry key of the root expression.
    pub name: String,
    /// Transform chain to apply before execution.
    #[serde(default)]
    pub transform: Option<Vec<JsonValue>>,
    /// Opaque tracing context; logged, never interpreted.
    #[serde(default)]
    pub span: Option<JsonValue>,
    /// Everything else: bound signal values, plus `:`-prefixed data
    /// parameters holding selection stores.
    #[serde(flatten)]
    pub params: Map<String, JsonValue>,
}

impl ExecuteRequest {
    /// Parse a request from its wire shape.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Execute a request with default options.
pub fn execute(
    registry: &ExprRegistry,
    request: &ExecuteRequest,
) -> Result<Vec<Map<String, JsonValue>>> {
    execute_with(registry, request, &QueryConfig::default())
}

/// Execute a request.
pub fn execute_with(
    registry: &ExprRegistry,
    request: &ExecuteRequest,
    config: &QueryConfig,
) -> Result<Vec<Map<String, JsonValue>>> {
    if let Some(span) = &request.span {
        log::debug!("executing '{}' under span {span}", request.name);
    }

    let mut frame = registry
        .get(&request.name)
        .ok_or_else(|| Error::UnknownExpression(request.name.clone()))?;

    if let Some(transforms) = &request.transform {
        let mut transforms = transforms.clone();
        substitute_params(&mut transforms, &request.params)?;
        frame = vegaq_transforms::apply(frame, &transforms)?;
    }

    if let Some(limit) = config.max_rows {
        frame = frame.limit(limit);
    }

    if log::log_enabled!(log::Level::Trace) {
        if let Ok(plan) = frame.describe_plan() {
            log::trace!("pushdown plan for '{}':\n{plan}", request.name);
        }
    }

    let df = collect_frame(frame, config)?;
    log::debug!(
        "execution of '{}' produced {} row(s)",
        request.name,
        df.height()
    );
    rows_from_df(&df)
}

/// Splice `:`-prefixed parameter values into filter/formula expressions.
fn substitute_params(transforms: &mut [JsonValue], params: &Map<String, JsonValue>) -> Result<()> {
    for (key, value) in params {
        let Some(name) = key.strip_prefix(DATA_PARAM_PREFIX) else {
            continue;
        };
        let encoded = serde_json::to_string(value)?;
        for transform in transforms.iter_mut() {
            let kind = transform.get("type").and_then(JsonValue::as_str);
            if !matches!(kind, Some("filter" | "formula")) {
                continue;
            }
            if let Some(expr) = transform.get("expr").and_then(JsonValue::as_str) {
                let patched = patch_expression(expr, name, &encoded)?;
                transform["expr"] = JsonValue::String(patched);
            }
        }
    }
    Ok(())
}

/// Replace `data("name")` with the value and rewrite
/// `vlSelectionTest("name"` to pass the value directly.
fn patch_expression(expr: &str, name: &str, value: &str) -> Result<String> {
    let escaped = regex::escape(name);
    let data_ref = Regex::new(&format!(r#"data\((?:'{escaped}'|"{escaped}")\)"#))
        .map_err(|e| Error::execution(format!("bad parameter name '{name}': {e}")))?;
    let patched = data_ref.replace_all(expr, regex::NoExpand(value));

    let selection_ref = Regex::new(&format!(r#"vlSelectionTest\((?:'{escaped}'|"{escaped}")"#))
        .map_err(|e| Error::execution(format!("bad parameter name '{name}': {e}")))?;
    let replacement = format!("vlSelectionTest({value}");
    Ok(selection_ref
        .replace_all(&patched, regex::NoExpand(&replacement))
        .into_owned())
}

#[cfg(not(feature = "parallel"))]
fn collect_frame(frame: LazyFrame, _config: &QueryConfig) -> Result<DataFrame> {
    Ok(frame.collect()?)
}

#[cfg(feature = "parallel")]
fn collect_frame(frame: LazyFrame, config: &QueryConfig) -> Result<DataFrame> {
    if !config.parallel {
        return Ok(frame.collect()?);
    }
    let (tx, rx) = std::sync::mpsc::channel();
    rayon::spawn(move || {
        let _ = tx.send(frame.collect());
    });
    let collected = rx
        .recv()
        .map_err(|_| Error::execution("execution worker disconnected"))?;
    Ok(collected?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_expression_both_shapes() {
        let expr = r#"!(length(data("sel_store"))) || (vlSelectionTest("sel_store", datum))"#;
        let patched = patch_expression(expr, "sel_store", "[]").unwrap();
        assert_eq!(patched, "!(length([])) || (vlSelectionTest([], datum))");
    }

    #[test]
    fn test_patch_expression_single_quotes() {
        let patched = patch_expression("length(data('store'))", "store", "[1]").unwrap();
        assert_eq!(patched, "length([1])");
    }

    #[test]
    fn test_patch_leaves_other_names_alone() {
        let expr = r#"data("other")"#;
        assert_eq!(patch_expression(expr, "store", "[]").unwrap(), expr);
    }

    #[test]
    fn test_request_from_value() {
        let request = ExecuteRequest::from_value(json!({
            "name": "abc123",
            "transform": [{"type": "filter", "expr": "datum.v > 1"}],
            "span": {"trace": "t"},
            ":sel_store": [],
            "width": 400
        }))
        .unwrap();
        assert_eq!(request.name, "abc123");
        assert_eq!(request.transform.as_ref().map(Vec::len), Some(1));
        assert!(request.params.contains_key(":sel_store"));
        assert!(request.params.contains_key("width"));
    }

    #[test]
    fn test_unknown_key_is_terminal() {
        let registry = ExprRegistry::new();
        let request = ExecuteRequest::from_value(json!({"name": "missing"})).unwrap();
        assert!(matches!(
            execute(&registry, &request),
            Err(Error::UnknownExpression(_))
        ));
    }
}
