//! Row filtering through the expression evaluator

use polars::prelude::*;

use vegaq_expr::{eval_expression, Value};
use vegaq_shared::{Error, Result};

use crate::op::Filter;

pub(crate) fn filter(t: &Filter, frame: LazyFrame) -> Result<LazyFrame> {
    match eval_expression(&t.expr, &frame)? {
        // vacuous predicate, e.g. an empty selection store
        Value::Bool(true) => Ok(frame),
        Value::Bool(b) => Ok(frame.filter(lit(b))),
        Value::Column(predicate) => Ok(frame.filter(predicate)),
        other => Err(Error::evaluator(format!(
            "filter expression '{}' produced a {}, not a predicate",
            t.expr,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::TransformOp;
    use serde_json::json;

    fn filter_op(expr: &str) -> Filter {
        match TransformOp::from_json(&json!({"type": "filter", "expr": expr})).unwrap() {
            TransformOp::Filter(t) => t,
            other => panic!("expected filter, got {other:?}"),
        }
    }

    fn frame() -> LazyFrame {
        df!("c" => ["x", "y", "x"], "v" => [1.0f64, 2.0, 3.0])
            .unwrap()
            .lazy()
    }

    #[test]
    fn test_predicate_filter() {
        let df = filter(&filter_op("datum.v >= 2"), frame())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_selection_store_filter() {
        let expr = r#"!(length([])) || (vlSelectionTest([{"fields": [{"field": "c", "type": "E"}], "values": ["x"]}], datum))"#;
        let df = filter(&filter_op(expr), frame()).unwrap().collect().unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_vacuous_true_passes_through() {
        let df = filter(&filter_op("true"), frame()).unwrap().collect().unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn test_unsubstituted_data_reference_errors() {
        let result = filter(&filter_op(r#"length(data("store")) > 0"#), frame());
        assert!(matches!(result, Err(Error::Evaluator(_))));
    }
}
