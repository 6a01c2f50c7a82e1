//! Typed transform operations
//!
//! Transform chains arrive as JSON; parsing them into a closed enum up
//! front gives the application fold an exhaustive match instead of a
//! stringly-typed dispatch, and keeps the arity and stray-key rules in one
//! place.

use serde_json::Value as JsonValue;

use vegaq_shared::util::promote_list;
use vegaq_shared::{Error, Result};

/// One declarative transform
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    /// Group and aggregate
    Aggregate(Aggregate),
    /// Histogram bucketing
    Bin(Bin),
    /// Multi-key sort
    Collect(Collect),
    /// Row predicate
    Filter(Filter),
    /// Derived column
    Formula(Formula),
    /// Calendar truncation
    TimeUnit(TimeUnit),
    /// Signal-publishing extent (removed before application)
    Extent(Extent),
    /// Anything else; applying it is an error
    Other(String),
}

/// `{"type": "aggregate", ...}`
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Grouping fields; empty aggregates the whole input
    pub groupby: Vec<String>,
    /// Aggregated fields, `None` applying the op to the whole group
    pub fields: Option<Vec<Option<String>>>,
    /// Aggregation op names
    pub ops: Option<Vec<String>>,
    /// Output aliases
    pub aliases: Option<Vec<Option<String>>>,
}

/// `{"type": "bin", ...}`
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    /// Field to bucket
    pub field: String,
    /// Where the [min, max] extent comes from
    pub extent: ExtentRef,
    /// Bucket count cap
    pub maxbins: u32,
    /// Output column for the left bucket edge
    pub left: String,
    /// Output column for the right bucket edge
    pub right: String,
}

/// Extent parameter of a bin transform
#[derive(Debug, Clone, PartialEq)]
pub enum ExtentRef {
    /// Take min/max of this field
    Field(String),
    /// Resolve through a published extent signal
    Signal(String),
}

/// `{"type": "collect", "sort": {...}}`
#[derive(Debug, Clone, PartialEq)]
pub struct Collect {
    /// Sort keys, outermost first
    pub fields: Vec<String>,
    /// Sort direction per key
    pub orders: Vec<SortOrder>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// `{"type": "filter", "expr": ...}`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Predicate expression text
    pub expr: String,
}

/// `{"type": "formula", "expr": ..., "as": ...}`
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// Value expression text
    pub expr: String,
    /// Output column name
    pub alias: String,
}

/// `{"type": "timeunit", ...}`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnit {
    /// Temporal field to truncate
    pub field: String,
    /// Calendar unit prefix
    pub units: Vec<String>,
    /// Output column for the truncated start
    pub start: String,
    /// Output column for start plus one unit
    pub end: String,
}

/// `{"type": "extent", ...}` - publishes a signal, never alters rows
#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    /// Field whose [min, max] the signal carries
    pub field: String,
    /// Signal name (spec rewriting renames `signal` to `signal_`)
    pub signal: Option<String>,
}

impl TransformOp {
    /// Parse one transform object.
    pub fn from_json(value: &JsonValue) -> Result<TransformOp> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::invalid_transform("transform must be an object"))?;
        let kind = map
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::invalid_transform("transform is missing 'type'"))?;
        match kind {
            "aggregate" => parse_aggregate(map),
            "bin" => parse_bin(map),
            "collect" => parse_collect(map),
            "extent" => parse_extent(map),
            "filter" => parse_filter(map),
            "formula" => parse_formula(map),
            "timeunit" => parse_timeunit(map),
            other => Ok(TransformOp::Other(other.to_string())),
        }
    }
}

type JsonMap = serde_json::Map<String, JsonValue>;

fn require_str(map: &JsonMap, key: &str, kind: &str) -> Result<String> {
    map.get(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_transform(format!("{kind} transform needs a '{key}' string")))
}

fn string_list(value: &JsonValue, context: &str) -> Result<Vec<String>> {
    promote_list(value)
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::invalid_transform(format!("{context} must be strings")))
        })
        .collect()
}

/// List of string-or-null, as aggregate `fields`/`as` allow.
fn nullable_string_list(value: &JsonValue, context: &str) -> Result<Vec<Option<String>>> {
    promote_list(value)
        .iter()
        .map(|v| match v {
            JsonValue::Null => Ok(None),
            JsonValue::String(s) => Ok(Some(s.clone())),
            _ => Err(Error::invalid_transform(format!(
                "{context} must be strings or null"
            ))),
        })
        .collect()
}

fn parse_aggregate(map: &JsonMap) -> Result<TransformOp> {
    let groupby = map
        .get("groupby")
        .map(|v| string_list(v, "aggregate groupby fields"))
        .transpose()?
        .ok_or_else(|| Error::invalid_transform("aggregate transform needs 'groupby'"))?;
    let fields = map
        .get("fields")
        .map(|v| nullable_string_list(v, "aggregate fields"))
        .transpose()?;
    let ops = map
        .get("ops")
        .map(|v| string_list(v, "aggregate ops"))
        .transpose()?;
    let aliases = map
        .get("as")
        .map(|v| nullable_string_list(v, "aggregate aliases"))
        .transpose()?;
    Ok(TransformOp::Aggregate(Aggregate {
        groupby,
        fields,
        ops,
        aliases,
    }))
}

fn parse_bin(map: &JsonMap) -> Result<TransformOp> {
    let field = require_str(map, "field", "bin")?;
    let extent = match map.get("extent") {
        Some(JsonValue::String(f)) => ExtentRef::Field(f.clone()),
        Some(JsonValue::Object(o)) => match o.get("signal").and_then(JsonValue::as_str) {
            Some(signal) => ExtentRef::Signal(signal.to_string()),
            None => {
                return Err(Error::invalid_transform(
                    "bin extent object needs a 'signal'",
                ))
            }
        },
        _ => return Err(Error::invalid_transform("bin transform needs an 'extent'")),
    };
    let maxbins = map
        .get("maxbins")
        .and_then(JsonValue::as_f64)
        .filter(|n| *n >= 1.0)
        .ok_or_else(|| Error::invalid_transform("bin transform needs a positive 'maxbins'"))?
        as u32;
    let aliases = map
        .get("as")
        .map(|v| string_list(v, "bin aliases"))
        .transpose()?
        .ok_or_else(|| Error::invalid_transform("bin transform needs 'as'"))?;
    if aliases.len() != 2 {
        return Err(Error::ArityMismatch {
            context: "bin output aliases",
            left: aliases.len(),
            right: 2,
        });
    }
    let mut aliases = aliases.into_iter();
    Ok(TransformOp::Bin(Bin {
        field,
        extent,
        maxbins,
        left: aliases.next().expect("checked length"),
        right: aliases.next().expect("checked length"),
    }))
}

fn parse_collect(map: &JsonMap) -> Result<TransformOp> {
    let sort = map
        .get("sort")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| Error::invalid_transform("collect transform needs a 'sort' object"))?;
    let fields = sort
        .get("field")
        .map(|v| string_list(v, "collect sort fields"))
        .transpose()?
        .ok_or_else(|| Error::invalid_transform("collect sort needs 'field'"))?;
    let orders = match sort.get("order") {
        None => vec![SortOrder::Ascending; fields.len()],
        Some(v) => string_list(v, "collect sort orders")?
            .into_iter()
            .map(|o| {
                if o == "ascending" {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                }
            })
            .collect(),
    };
    if fields.len() != orders.len() {
        return Err(Error::ArityMismatch {
            context: "collect sort field/order",
            left: fields.len(),
            right: orders.len(),
        });
    }
    Ok(TransformOp::Collect(Collect { fields, orders }))
}

fn parse_filter(map: &JsonMap) -> Result<TransformOp> {
    Ok(TransformOp::Filter(Filter {
        expr: require_str(map, "expr", "filter")?,
    }))
}

fn parse_formula(map: &JsonMap) -> Result<TransformOp> {
    Ok(TransformOp::Formula(Formula {
        expr: require_str(map, "expr", "formula")?,
        alias: require_str(map, "as", "formula")?,
    }))
}

fn parse_timeunit(map: &JsonMap) -> Result<TransformOp> {
    let stray: Vec<&String> = map
        .keys()
        .filter(|k| !matches!(k.as_str(), "type" | "field" | "units" | "as"))
        .collect();
    if !stray.is_empty() {
        return Err(Error::UnsupportedUnit(format!(
            "timeunit transform: {stray:?} keys are not supported"
        )));
    }
    let field = require_str(map, "field", "timeunit")?;
    let units = map
        .get("units")
        .map(|v| string_list(v, "timeunit units"))
        .transpose()?
        .ok_or_else(|| Error::invalid_transform("timeunit transform needs 'units'"))?;
    let aliases = map
        .get("as")
        .map(|v| string_list(v, "timeunit aliases"))
        .transpose()?
        .ok_or_else(|| Error::invalid_transform("timeunit transform needs 'as'"))?;
    if aliases.len() != 2 {
        return Err(Error::ArityMismatch {
            context: "timeunit output aliases",
            left: aliases.len(),
            right: 2,
        });
    }
    let mut aliases = aliases.into_iter();
    Ok(TransformOp::TimeUnit(TimeUnit {
        field,
        units,
        start: aliases.next().expect("checked length"),
        end: aliases.next().expect("checked length"),
    }))
}

fn parse_extent(map: &JsonMap) -> Result<TransformOp> {
    let signal = map
        .get("signal_")
        .or_else(|| map.get("signal"))
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    Ok(TransformOp::Extent(Extent {
        field: require_str(map, "field", "extent")?,
        signal,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_aggregate() {
        let op = TransformOp::from_json(&json!({
            "type": "aggregate",
            "groupby": ["g"],
            "ops": ["count"],
            "fields": [null],
            "as": ["n"]
        }))
        .unwrap();
        assert_eq!(
            op,
            TransformOp::Aggregate(Aggregate {
                groupby: vec!["g".to_string()],
                fields: Some(vec![None]),
                ops: Some(vec!["count".to_string()]),
                aliases: Some(vec![Some("n".to_string())]),
            })
        );
    }

    #[test]
    fn test_parse_bin_with_signal_extent() {
        let op = TransformOp::from_json(&json!({
            "type": "bin",
            "field": "v",
            "extent": {"signal": "v_extent"},
            "maxbins": 10,
            "as": ["bin0", "bin1"],
            "signal_": "bins"
        }))
        .unwrap();
        match op {
            TransformOp::Bin(bin) => {
                assert_eq!(bin.extent, ExtentRef::Signal("v_extent".to_string()));
                assert_eq!(bin.maxbins, 10);
            }
            other => panic!("expected bin, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_collect_promotes_scalars() {
        let op = TransformOp::from_json(&json!({
            "type": "collect",
            "sort": {"field": "a", "order": "descending"}
        }))
        .unwrap();
        assert_eq!(
            op,
            TransformOp::Collect(Collect {
                fields: vec!["a".to_string()],
                orders: vec![SortOrder::Descending],
            })
        );
    }

    #[test]
    fn test_parse_timeunit_rejects_stray_keys() {
        let err = TransformOp::from_json(&json!({
            "type": "timeunit",
            "field": "t",
            "units": ["year"],
            "as": ["u0", "u1"],
            "interval": false
        }))
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedUnit(_)));
    }

    #[test]
    fn test_parse_unknown_type_is_other() {
        let op = TransformOp::from_json(&json!({"type": "lookup", "from": "x"})).unwrap();
        assert_eq!(op, TransformOp::Other("lookup".to_string()));
    }

    #[test]
    fn test_collect_arity_mismatch() {
        let err = TransformOp::from_json(&json!({
            "type": "collect",
            "sort": {"field": ["a", "b"], "order": ["ascending"]}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
    }
}
