//! Calendar truncation
//!
//! `units` must be an ordered prefix of the calendar hierarchy; the longest
//! matching prefix picks the truncation granularity. The start column is
//! the truncated timestamp, the end column is start plus one unit.

use polars::prelude::*;

use vegaq_shared::{Error, Result};

use crate::op::TimeUnit;

/// Calendar hierarchy and the matching polars duration strings.
const UNITS: [(&str, &str); 7] = [
    ("year", "1y"),
    ("month", "1mo"),
    ("date", "1d"),
    ("hours", "1h"),
    ("minutes", "1m"),
    ("seconds", "1s"),
    ("milliseconds", "1ms"),
];

pub(crate) fn timeunit(t: &TimeUnit, frame: LazyFrame) -> Result<LazyFrame> {
    let every = granularity(&t.units)?;
    let start = col(&t.field).dt().truncate(lit(every));
    let end = start.clone().dt().offset_by(lit(every));
    Ok(frame.with_columns([
        start.alias(t.start.as_str()),
        end.alias(t.end.as_str()),
    ]))
}

fn granularity(units: &[String]) -> Result<&'static str> {
    let supported = !units.is_empty()
        && units.len() <= UNITS.len()
        && units
            .iter()
            .zip(&UNITS)
            .all(|(unit, (expected, _))| unit == expected);
    if !supported {
        return Err(Error::UnsupportedUnit(format!(
            "timeunit transform: {units:?} units are not supported"
        )));
    }
    Ok(UNITS[units.len() - 1].1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::TransformOp;
    use chrono::NaiveDate;
    use serde_json::json;

    fn timeunit_op(units: serde_json::Value) -> TimeUnit {
        let spec = json!({
            "type": "timeunit",
            "field": "t",
            "units": units,
            "as": ["unit0", "unit1"]
        });
        match TransformOp::from_json(&spec).unwrap() {
            TransformOp::TimeUnit(t) => t,
            other => panic!("expected timeunit, got {other:?}"),
        }
    }

    fn frame() -> LazyFrame {
        let stamps = vec![NaiveDate::from_ymd_opt(2020, 3, 15)
            .unwrap()
            .and_hms_opt(14, 40, 10)
            .unwrap()];
        DataFrame::new(vec![Column::new("t".into(), stamps)])
            .unwrap()
            .lazy()
    }

    fn first_bounds(df: &DataFrame) -> (String, String) {
        let fetch = |name: &str| {
            let millis = df
                .column(name)
                .unwrap()
                .as_materialized_series()
                .cast(&DataType::Datetime(
                    polars::prelude::TimeUnit::Milliseconds,
                    None,
                ))
                .unwrap()
                .datetime()
                .unwrap()
                .phys
                .get(0)
                .unwrap();
            chrono::DateTime::from_timestamp_millis(millis)
                .unwrap()
                .naive_utc()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        };
        (fetch("unit0"), fetch("unit1"))
    }

    #[test]
    fn test_year_month_truncation() {
        let t = timeunit_op(json!(["year", "month"]));
        let df = timeunit(&t, frame()).unwrap().collect().unwrap();
        let (start, end) = first_bounds(&df);
        assert_eq!(start, "2020-03-01 00:00:00");
        assert_eq!(end, "2020-04-01 00:00:00");
    }

    #[test]
    fn test_year_truncation() {
        let t = timeunit_op(json!(["year"]));
        let df = timeunit(&t, frame()).unwrap().collect().unwrap();
        let (start, end) = first_bounds(&df);
        assert_eq!(start, "2020-01-01 00:00:00");
        assert_eq!(end, "2021-01-01 00:00:00");
    }

    #[test]
    fn test_full_prefix_truncation() {
        let t = timeunit_op(json!([
            "year", "month", "date", "hours", "minutes", "seconds", "milliseconds"
        ]));
        let df = timeunit(&t, frame()).unwrap().collect().unwrap();
        let (start, _) = first_bounds(&df);
        assert_eq!(start, "2020-03-15 14:40:10");
    }

    #[test]
    fn test_non_prefix_units_error() {
        for units in [json!(["month"]), json!(["year", "date"]), json!([])] {
            let t = timeunit_op(units);
            assert!(matches!(
                timeunit(&t, frame()),
                Err(Error::UnsupportedUnit(_))
            ));
        }
    }
}
