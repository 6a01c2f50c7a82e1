//! Multi-key stable sort

use polars::prelude::*;

use vegaq_shared::Result;

use crate::op::{Collect, SortOrder};

pub(crate) fn collect(t: &Collect, frame: LazyFrame) -> Result<LazyFrame> {
    let keys: Vec<Expr> = t.fields.iter().map(col).collect();
    let descending: Vec<bool> = t
        .orders
        .iter()
        .map(|o| matches!(o, SortOrder::Descending))
        .collect();
    let options = SortMultipleOptions::default()
        .with_order_descending_multi(descending)
        .with_maintain_order(true);
    Ok(frame.sort_by_exprs(keys, options))
}
