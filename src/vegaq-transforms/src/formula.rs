//! Derived columns through the expression evaluator

use polars::prelude::*;

use vegaq_expr::eval_expression;
use vegaq_shared::Result;

use crate::op::Formula;

pub(crate) fn formula(t: &Formula, frame: LazyFrame) -> Result<LazyFrame> {
    let value = eval_expression(&t.expr, &frame)?;
    let column = value.into_expr()?;
    Ok(frame.with_column(column.alias(t.alias.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::TransformOp;
    use serde_json::json;

    fn formula_op(expr: &str, alias: &str) -> Formula {
        let spec = json!({"type": "formula", "expr": expr, "as": alias});
        match TransformOp::from_json(&spec).unwrap() {
            TransformOp::Formula(t) => t,
            other => panic!("expected formula, got {other:?}"),
        }
    }

    #[test]
    fn test_derived_column() {
        let frame = df!("v" => [1.0f64, 2.0]).unwrap().lazy();
        let df = formula(&formula_op("datum.v * 10", "scaled"), frame)
            .unwrap()
            .collect()
            .unwrap();
        let scaled: Vec<Option<f64>> = df
            .column("scaled")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(scaled, vec![Some(10.0), Some(20.0)]);
    }

    #[test]
    fn test_replaces_existing_column() {
        let frame = df!("v" => [1.0f64, 2.0]).unwrap().lazy();
        let df = formula(&formula_op("datum.v + 1", "v"), frame)
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(df.width(), 1);
        let v: Vec<Option<f64>> = df.column("v").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(v, vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_host_scalar_becomes_literal_column() {
        let frame = df!("v" => [1.0f64, 2.0]).unwrap().lazy();
        let df = formula(&formula_op("'label'", "tag"), frame)
            .unwrap()
            .collect()
            .unwrap();
        let tags: Vec<Option<&str>> = df.column("tag").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(tags, vec![Some("label"), Some("label")]);
    }
}
