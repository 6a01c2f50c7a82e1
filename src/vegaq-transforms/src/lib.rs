//! vegaq-transforms: transform application onto lazy Polars queries
//!
//! Applies an ordered list of declarative Vega transforms to a `LazyFrame`.
//! Transform JSON is parsed into the closed [`TransformOp`] enum, two
//! preprocessing passes run (bin source materialization, extent signal
//! resolution), and the list is folded left to right. Any unsupported op,
//! arity mismatch or evaluator failure aborts the whole chain; nothing is
//! partially applied.

use std::collections::HashMap;

use polars::prelude::*;
use serde_json::Value as JsonValue;

use vegaq_shared::{Error, Result};

mod aggregate;
mod bin;
mod collect;
mod filter;
mod formula;
pub mod op;
mod timeunit;

pub use op::{ExtentRef, SortOrder, TransformOp};

/// Apply a transform chain to a lazy frame.
pub fn apply(frame: LazyFrame, transforms: &[JsonValue]) -> Result<LazyFrame> {
    let mut ops = transforms
        .iter()
        .map(TransformOp::from_json)
        .collect::<Result<Vec<_>>>()?;
    log::debug!("applying {} transform(s)", ops.len());

    let mut frame = frame;

    // Bin source fields are projected up front so a later filter can still
    // reference the pre-bin column name.
    for op in &ops {
        if let TransformOp::Bin(b) = op {
            frame = frame.with_column(col(b.field.as_str()));
        }
    }

    // Extent transforms only publish a signal. Harvest their field names,
    // drop them from the chain, and resolve any bin that references an
    // extent by signal name.
    let mut signals: HashMap<String, String> = HashMap::new();
    ops.retain(|op| match op {
        TransformOp::Extent(extent) => {
            if let Some(signal) = &extent.signal {
                signals.insert(signal.clone(), extent.field.clone());
            }
            false
        }
        _ => true,
    });
    for op in &mut ops {
        if let TransformOp::Bin(b) = op {
            if let ExtentRef::Signal(signal) = &b.extent {
                let field = signals
                    .get(signal)
                    .ok_or_else(|| Error::UnknownSignal(signal.clone()))?;
                b.extent = ExtentRef::Field(field.clone());
            }
        }
    }

    for op in &ops {
        frame = match op {
            TransformOp::Aggregate(t) => aggregate::aggregate(t, frame)?,
            TransformOp::Bin(t) => bin::bin(t, frame)?,
            TransformOp::Collect(t) => collect::collect(t, frame)?,
            TransformOp::Filter(t) => filter::filter(t, frame)?,
            TransformOp::Formula(t) => formula::formula(t, frame)?,
            TransformOp::TimeUnit(t) => timeunit::timeunit(t, frame)?,
            TransformOp::Extent(_) => frame,
            TransformOp::Other(kind) => {
                return Err(Error::UnrecognizedTransform(kind.clone()))
            }
        };
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame() -> LazyFrame {
        df!(
            "g" => ["a", "a", "b", "b"],
            "v" => [1.0f64, 2.0, 3.0, 4.0]
        )
        .unwrap()
        .lazy()
    }

    #[test]
    fn test_chain_application_order() {
        let transforms = vec![
            json!({"type": "filter", "expr": "datum.v > 1"}),
            json!({"type": "aggregate", "groupby": ["g"], "ops": ["count"], "fields": [null], "as": ["n"]}),
            json!({"type": "collect", "sort": {"field": "g"}}),
        ];
        let df = apply(frame(), &transforms).unwrap().collect().unwrap();
        let names: Vec<Option<&str>> = df.column("g").unwrap().str().unwrap().into_iter().collect();
        let counts: Vec<Option<u32>> = df.column("n").unwrap().u32().unwrap().into_iter().collect();
        assert_eq!(names, vec![Some("a"), Some("b")]);
        assert_eq!(counts, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_extent_signal_feeds_bin() {
        let transforms = vec![
            json!({"type": "extent", "field": "v", "signal_": "v_extent"}),
            json!({
                "type": "bin",
                "field": "v",
                "extent": {"signal": "v_extent"},
                "maxbins": 3,
                "as": ["bin0", "bin1"]
            }),
        ];
        let df = apply(frame(), &transforms).unwrap().collect().unwrap();
        assert!(df.column("bin0").is_ok());
        assert!(df.column("bin1").is_ok());
        // the extent transform itself adds no columns
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_filter_after_bin_sees_source_field() {
        let transforms = vec![
            json!({
                "type": "bin",
                "field": "v",
                "extent": "v",
                "maxbins": 2,
                "as": ["bin0", "bin1"]
            }),
            json!({"type": "filter", "expr": "datum.v < 3"}),
        ];
        let df = apply(frame(), &transforms).unwrap().collect().unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_unrecognized_transform_aborts() {
        let transforms = vec![
            json!({"type": "filter", "expr": "datum.v > 1"}),
            json!({"type": "lookup", "from": "other"}),
        ];
        assert!(matches!(
            apply(frame(), &transforms),
            Err(Error::UnrecognizedTransform(_))
        ));
    }

    #[test]
    fn test_unpublished_signal_errors() {
        let transforms = vec![json!({
            "type": "bin",
            "field": "v",
            "extent": {"signal": "missing"},
            "maxbins": 2,
            "as": ["bin0", "bin1"]
        })];
        assert!(matches!(
            apply(frame(), &transforms),
            Err(Error::UnknownSignal(_))
        ));
    }
}
