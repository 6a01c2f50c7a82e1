//! Histogram bucketing
//!
//! Bucket boundaries cannot stay lazy: the extent's min and max are forced
//! through one synchronous round-trip before the bucket columns are built.
//! All bucket arithmetic runs in 32-bit floats to match the backing
//! engine's comparison behavior; values sitting exactly on the upper extent
//! belong to the last bucket.

use polars::prelude::*;

use vegaq_shared::{Error, Result};

use crate::op::{Bin, ExtentRef};

pub(crate) fn bin(t: &Bin, frame: LazyFrame) -> Result<LazyFrame> {
    let extent_field = match &t.extent {
        ExtentRef::Field(field) => field.as_str(),
        ExtentRef::Signal(signal) => return Err(Error::UnknownSignal(signal.clone())),
    };

    let (lo, hi) = extent_bounds(&frame, extent_field)?;
    let maxbins = t.maxbins as f32;
    let width = (hi - lo) / maxbins;
    if !width.is_finite() || width <= 0.0 {
        return Err(Error::execution(format!(
            "degenerate bin extent [{lo}, {hi}] for field '{}'",
            t.field
        )));
    }

    let index = ((col(&t.field).cast(DataType::Float32) - lit(lo)) / lit(width)).floor();
    let index = when(index.clone().gt_eq(lit(maxbins)))
        .then(lit(maxbins - 1.0))
        .otherwise(index);
    let left = lit(lo) + index * lit(width);

    Ok(frame.with_columns([
        left.clone().alias(t.left.as_str()),
        (left + lit(width)).alias(t.right.as_str()),
    ]))
}

/// Materialize the extent field's min and max.
fn extent_bounds(frame: &LazyFrame, field: &str) -> Result<(f32, f32)> {
    let bounds = frame
        .clone()
        .select([
            col(field).min().alias("lo"),
            col(field).max().alias("hi"),
        ])
        .collect()?;
    Ok((scalar_f32(&bounds, "lo")?, scalar_f32(&bounds, "hi")?))
}

fn scalar_f32(df: &DataFrame, name: &str) -> Result<f32> {
    df.column(name)?
        .as_materialized_series()
        .cast(&DataType::Float32)?
        .f32()?
        .get(0)
        .ok_or_else(|| Error::execution(format!("bin extent '{name}' is empty")))
}
