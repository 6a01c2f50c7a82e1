//! `DataFrame` to row-oriented JSON conversion
//!
//! Execute responses are shipped to the chart as an array of row objects
//! holding JSON scalars only. Temporal columns are rendered as ISO-8601
//! strings; any dtype outside that set is an execution error rather than a
//! lossy best-effort encoding.

use chrono::{DateTime, Duration, NaiveDate};
use polars::prelude::*;
use serde_json::{Map, Number as JsonNumber, Value as JsonValue};

use crate::error::{Error, Result};

/// Format used for datetime values in execute responses.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Convert a materialized frame into an ordered list of row objects.
pub fn rows_from_df(df: &DataFrame) -> Result<Vec<Map<String, JsonValue>>> {
    let height = df.height();
    let mut rows: Vec<Map<String, JsonValue>> = (0..height).map(|_| Map::new()).collect();

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().to_string();
        let values = series_to_json_values(series)?;
        for (row, value) in rows.iter_mut().zip(values) {
            row.insert(name.clone(), value);
        }
    }

    Ok(rows)
}

/// Convert one column into JSON scalars, dispatching on dtype once.
fn series_to_json_values(series: &Series) -> Result<Vec<JsonValue>> {
    match series.dtype() {
        DataType::Null => Ok(vec![JsonValue::Null; series.len()]),
        DataType::Boolean => {
            let ca = series.bool()?;
            Ok(ca
                .into_iter()
                .map(|v| v.map_or(JsonValue::Null, JsonValue::Bool))
                .collect())
        }
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let casted = series.cast(&DataType::Int64)?;
            let ca = casted.i64()?;
            Ok(ca
                .into_iter()
                .map(|v| v.map_or(JsonValue::Null, |i| JsonValue::Number(JsonNumber::from(i))))
                .collect())
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let casted = series.cast(&DataType::UInt64)?;
            let ca = casted.u64()?;
            Ok(ca
                .into_iter()
                .map(|v| v.map_or(JsonValue::Null, |i| JsonValue::Number(JsonNumber::from(i))))
                .collect())
        }
        DataType::Float32 | DataType::Float64 => {
            let casted = series.cast(&DataType::Float64)?;
            let ca = casted.f64()?;
            Ok(ca
                .into_iter()
                .map(|v| {
                    // NaN and infinities have no JSON number form
                    v.and_then(JsonNumber::from_f64)
                        .map_or(JsonValue::Null, JsonValue::Number)
                })
                .collect())
        }
        DataType::String => {
            let ca = series.str()?;
            Ok(ca
                .into_iter()
                .map(|v| v.map_or(JsonValue::Null, |s| JsonValue::String(s.to_string())))
                .collect())
        }
        DataType::Date => {
            let ca = series.date()?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date");
            Ok(ca
                .phys
                .into_iter()
                .map(|v| {
                    v.map_or(JsonValue::Null, |days| {
                        let date = epoch + Duration::days(i64::from(days));
                        JsonValue::String(date.format("%Y-%m-%d").to_string())
                    })
                })
                .collect())
        }
        DataType::Datetime(time_unit, _) => {
            let factor = match time_unit {
                TimeUnit::Nanoseconds => 1_000_000,
                TimeUnit::Microseconds => 1_000,
                TimeUnit::Milliseconds => 1,
            };
            let ca = series.datetime()?;
            ca.phys
                .into_iter()
                .map(|v| match v {
                    None => Ok(JsonValue::Null),
                    Some(raw) => {
                        let millis = raw / factor;
                        let dt = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                            Error::execution(format!("timestamp {millis}ms out of range"))
                        })?;
                        Ok(JsonValue::String(
                            dt.naive_utc().format(DATETIME_FORMAT).to_string(),
                        ))
                    }
                })
                .collect()
        }
        dtype => Err(Error::execution(format!(
            "column '{}' has non-JSON dtype {dtype}",
            series.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_scalar_rows() {
        let df = df!(
            "name" => ["a", "b"],
            "count" => [1i64, 2],
            "score" => [0.5f64, 1.5],
            "flag" => [true, false]
        )
        .unwrap();

        let rows = rows_from_df(&df).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], JsonValue::String("a".to_string()));
        assert_eq!(rows[0]["count"], serde_json::json!(1));
        assert_eq!(rows[1]["score"], serde_json::json!(1.5));
        assert_eq!(rows[1]["flag"], JsonValue::Bool(false));
    }

    #[test]
    fn test_null_and_nan_render_as_null() {
        let df = df!("x" => [Some(1.0f64), None, Some(f64::NAN)]).unwrap();
        let rows = rows_from_df(&df).unwrap();
        assert_eq!(rows[0]["x"], serde_json::json!(1.0));
        assert_eq!(rows[1]["x"], JsonValue::Null);
        assert_eq!(rows[2]["x"], JsonValue::Null);
    }

    #[test]
    fn test_datetime_renders_iso() {
        let stamps = vec![NaiveDate::from_ymd_opt(2020, 3, 15)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap()];
        let df = DataFrame::new(vec![Column::new("t".into(), stamps)]).unwrap();
        let rows = rows_from_df(&df).unwrap();
        assert_eq!(
            rows[0]["t"],
            JsonValue::String("2020-03-15T12:30:45.000".to_string())
        );
    }
}
