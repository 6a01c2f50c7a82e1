//! Group-and-aggregate application
//!
//! Fields, ops and aliases are zipped positionally. A missing `ops` list
//! defaults to a single row count; a `null` field applies the op to the
//! whole group. Aliases default to Vega's derived names (`count`,
//! `{op}_{field}`).

use polars::prelude::*;

use vegaq_shared::{Error, Result};

use crate::op::Aggregate;

pub(crate) fn aggregate(t: &Aggregate, frame: LazyFrame) -> Result<LazyFrame> {
    let ops = t
        .ops
        .clone()
        .unwrap_or_else(|| vec!["count".to_string()]);
    let fields = t.fields.clone().unwrap_or_else(|| vec![None; ops.len()]);
    let aliases = t.aliases.clone().unwrap_or_else(|| vec![None; ops.len()]);

    if fields.len() != ops.len() {
        return Err(Error::ArityMismatch {
            context: "aggregate fields/ops",
            left: fields.len(),
            right: ops.len(),
        });
    }
    if aliases.len() != ops.len() {
        return Err(Error::ArityMismatch {
            context: "aggregate ops/aliases",
            left: ops.len(),
            right: aliases.len(),
        });
    }

    let aggs = fields
        .iter()
        .zip(&ops)
        .zip(&aliases)
        .map(|((field, op), alias)| agg_expr(field.as_deref(), op, alias.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    if t.groupby.is_empty() {
        Ok(frame.select(aggs))
    } else {
        let keys: Vec<Expr> = t.groupby.iter().map(col).collect();
        Ok(frame.group_by(keys).agg(aggs))
    }
}

/// One aggregation column from a (field, op, alias) triple.
fn agg_expr(field: Option<&str>, op: &str, alias: Option<&str>) -> Result<Expr> {
    let agg = match (op, field) {
        ("count", None) => len(),
        ("count", Some(f)) => col(f).count(),
        ("distinct", Some(f)) => col(f).n_unique(),
        ("sum", Some(f)) => col(f).sum(),
        ("mean" | "average", Some(f)) => col(f).mean(),
        ("variance", Some(f)) => col(f).var(1),
        ("stdev", Some(f)) => col(f).std(1),
        ("median", Some(f)) => col(f).median(),
        ("min", Some(f)) => col(f).min(),
        ("max", Some(f)) => col(f).max(),
        (_, None) => {
            return Err(Error::UnsupportedOperator(format!(
                "{op} (without a field)"
            )))
        }
        _ => return Err(Error::UnsupportedOperator(op.to_string())),
    };
    let name = match (alias, field) {
        (Some(name), _) => name.to_string(),
        (None, Some(f)) => format!("{op}_{f}"),
        (None, None) => op.to_string(),
    };
    Ok(agg.alias(name))
}
