//! Multi-field selection test
//!
//! `vlSelectionTest(store, datum, op)` checks each row against the entries
//! of an interval or point selection store. Every entry contributes one
//! predicate per selected field; entries combine with OR (`union`, the
//! default) or AND (`intersect`). An empty store passes everything through.

use polars::prelude::*;

use vegaq_shared::{Error, Result};

use crate::builtins::parse_datetime;
use crate::eval::Evaluator;
use crate::value::Value;

pub(crate) fn vl_selection_test(ev: &Evaluator, args: &[Value]) -> Result<Value> {
    if args.len() < 2 || args.len() > 3 {
        return Err(Error::evaluator(format!(
            "vlSelectionTest() expects 2 or 3 arguments, got {}",
            args.len()
        )));
    }
    let entries = match &args[0] {
        Value::Array(entries) => entries,
        other => {
            return Err(Error::evaluator(format!(
                "vlSelectionTest() expects a selection store, got {}",
                other.type_name()
            )))
        }
    };
    let intersect = match args.get(2) {
        None => false,
        Some(Value::Str(op)) if op == "union" => false,
        Some(Value::Str(op)) if op == "intersect" => true,
        Some(other) => {
            return Err(Error::evaluator(format!(
                "vlSelectionTest() op must be 'union' or 'intersect', got {}",
                other.type_name()
            )))
        }
    };

    if entries.is_empty() {
        return Ok(Value::Bool(true));
    }

    let mut combined: Option<Expr> = None;
    for entry in entries {
        let predicate = entry_predicate(ev, entry)?;
        combined = Some(match combined {
            None => predicate,
            Some(acc) => {
                if intersect {
                    acc.and(predicate)
                } else {
                    acc.or(predicate)
                }
            }
        });
    }
    Ok(Value::Column(combined.expect("non-empty entries")))
}

/// AND together one predicate per selected field of a store entry.
fn entry_predicate(ev: &Evaluator, entry: &Value) -> Result<Expr> {
    let Value::Object(entry) = entry else {
        return Err(Error::evaluator("selection store entries must be objects"));
    };
    let fields = match entry.get("fields") {
        Some(Value::Array(fields)) => fields,
        _ => return Err(Error::evaluator("selection entry is missing 'fields'")),
    };
    let values = match entry.get("values") {
        Some(Value::Array(values)) => values,
        _ => return Err(Error::evaluator("selection entry is missing 'values'")),
    };
    if fields.len() != values.len() {
        return Err(Error::ArityMismatch {
            context: "selection fields/values",
            left: fields.len(),
            right: values.len(),
        });
    }

    let mut combined: Option<Expr> = None;
    for (field, value) in fields.iter().zip(values) {
        let predicate = field_predicate(ev, field, value)?;
        combined = Some(match combined {
            None => predicate,
            Some(acc) => acc.and(predicate),
        });
    }
    combined.ok_or_else(|| Error::evaluator("selection entry has no fields"))
}

fn field_predicate(ev: &Evaluator, field: &Value, value: &Value) -> Result<Expr> {
    let Value::Object(field) = field else {
        return Err(Error::evaluator("selection field specs must be objects"));
    };
    let name = match field.get("field") {
        Some(Value::Str(name)) => name,
        _ => return Err(Error::evaluator("selection field spec is missing 'field'")),
    };
    let mut kind = match field.get("type") {
        Some(Value::Str(kind)) => kind.as_str(),
        _ => "E",
    };

    let temporal = ev
        .field_dtype(name)
        .is_some_and(|dt| matches!(dt, DataType::Date | DataType::Datetime(_, _)));

    // a point selection over a temporal column really holds an interval:
    // its value pair is a closed range of timestamps
    if kind == "E" && temporal {
        kind = "R";
    }

    let column = col(name.as_str());
    match kind {
        "E" => match value {
            Value::Array(items) => {
                let mut membership: Option<Expr> = None;
                for item in items {
                    let test = column.clone().eq(item.clone().into_expr()?);
                    membership = Some(match membership {
                        None => test,
                        Some(acc) => acc.or(test),
                    });
                }
                membership.map_or_else(|| Ok(lit(false)), Ok)
            }
            scalar => Ok(column.eq(scalar.clone().into_expr()?)),
        },
        "R" | "R-RE" | "R-LE" => {
            let (low, high) = range_bounds(value, temporal)?;
            let lower = if kind == "R-LE" {
                column.clone().gt(low)
            } else {
                column.clone().gt_eq(low)
            };
            let upper = if kind == "R-RE" {
                column.lt(high)
            } else {
                column.lt_eq(high)
            };
            Ok(lower.and(upper))
        }
        other => Err(Error::evaluator(format!(
            "unsupported selection predicate type '{other}'"
        ))),
    }
}

/// Extract the [low, high] pair of a range selection value.
fn range_bounds(value: &Value, temporal: bool) -> Result<(Expr, Expr)> {
    let Value::Array(bounds) = value else {
        return Err(Error::evaluator(
            "range selections expect a [low, high] value pair",
        ));
    };
    if bounds.len() != 2 {
        return Err(Error::ArityMismatch {
            context: "selection range bounds",
            left: bounds.len(),
            right: 2,
        });
    }
    Ok((
        bound_expr(&bounds[0], temporal)?,
        bound_expr(&bounds[1], temporal)?,
    ))
}

fn bound_expr(value: &Value, temporal: bool) -> Result<Expr> {
    if temporal {
        match value {
            Value::Str(s) => Ok(lit(parse_datetime(s)?)),
            Value::Number(millis) => {
                let dt = chrono::DateTime::from_timestamp_millis(*millis as i64)
                    .ok_or_else(|| Error::evaluator(format!("timestamp {millis} out of range")))?;
                Ok(lit(dt.naive_utc()))
            }
            other => Err(Error::evaluator(format!(
                "temporal range bounds must be timestamps, got {}",
                other.type_name()
            ))),
        }
    } else {
        value.clone().into_expr()
    }
}
