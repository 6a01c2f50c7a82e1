//! Built-in function namespace for the expression evaluator
//!
//! Only the functions reachable from chart transform specs are implemented.
//! Each builtin branches on the host/column case of its arguments; math
//! builtins map onto the matching polars expression functions, calendar
//! builtins onto the `dt` namespace with Vega's offsets (0-based month and
//! quarter, Sunday-0 day of week).

use chrono::{NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;

use vegaq_shared::{Error, Result};

use crate::eval::Evaluator;
use crate::selection;
use crate::value::Value;

/// Dispatch a builtin call.
pub(crate) fn call(ev: &Evaluator, name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "if" => ternary_if(args),

        "isArray" | "isRegExp" => Ok(Value::Bool(false)),
        "isBoolean" => type_predicate(ev, args, |v, dt| match v {
            Value::Bool(_) => true,
            Value::Column(_) => matches!(dt, Some(DataType::Boolean)),
            _ => false,
        }),
        "isNumber" => type_predicate(ev, args, |v, dt| match v {
            Value::Number(_) => true,
            Value::Column(_) => dt.is_some_and(is_numeric_dtype),
            _ => false,
        }),
        "isString" => type_predicate(ev, args, |v, dt| match v {
            Value::Str(_) => true,
            Value::Column(_) => matches!(dt, Some(DataType::String)),
            _ => false,
        }),
        "isDate" => type_predicate(ev, args, |v, dt| match v {
            Value::Column(_) => dt.is_some_and(is_temporal_dtype),
            _ => false,
        }),
        "isObject" => type_predicate(ev, args, |v, _| {
            matches!(v, Value::Null | Value::Object(_))
        }),

        "toBoolean" => to_boolean(args),
        "toNumber" => to_number(args),
        "toString" => to_string(args),
        "toDate" => to_date(args),

        "abs" => math1(name, args, f64::abs, |e| e.abs()),
        "acos" => math1(name, args, f64::acos, |e| e.arccos()),
        "asin" => math1(name, args, f64::asin, |e| e.arcsin()),
        "atan" => math1(name, args, f64::atan, |e| e.arctan()),
        "atan2" => math2(name, args, f64::atan2, |a, b| a.arctan2(b)),
        "ceil" => math1(name, args, f64::ceil, |e| e.ceil()),
        "cos" => math1(name, args, f64::cos, |e| e.cos()),
        "exp" => math1(name, args, f64::exp, |e| e.exp()),
        "floor" => math1(name, args, f64::floor, |e| e.floor()),
        "log" => math1(name, args, f64::ln, |e| e.log(lit(std::f64::consts::E))),
        "pow" => math2(name, args, f64::powf, |a, b| a.pow(b)),
        // Math.round: half-up, toward positive infinity
        "round" => math1(name, args, |n| (n + 0.5).floor(), |e| (e + lit(0.5)).floor()),
        "sin" => math1(name, args, f64::sin, |e| e.sin()),
        "sqrt" => math1(name, args, f64::sqrt, |e| e.sqrt()),
        "tan" => math1(name, args, f64::tan, |e| e.tan()),
        "max" => fold_extremum(name, args, f64::max, |a, b| {
            when(a.clone().gt(b.clone())).then(a).otherwise(b)
        }),
        "min" => fold_extremum(name, args, f64::min, |a, b| {
            when(a.clone().lt(b.clone())).then(a).otherwise(b)
        }),

        "year" => calendar(name, args, |e| e.dt().year()),
        "quarter" => calendar(name, args, |e| e.dt().quarter() - lit(1)),
        "month" => calendar(name, args, |e| e.dt().month() - lit(1)),
        "date" => calendar(name, args, |e| e.dt().day()),
        "day" => calendar(name, args, |e| e.dt().weekday() % lit(7)),
        "hours" => calendar(name, args, |e| e.dt().hour()),
        "minutes" => calendar(name, args, |e| e.dt().minute()),
        "seconds" => calendar(name, args, |e| e.dt().second()),
        "milliseconds" => calendar(name, args, |e| e.dt().millisecond()),
        "time" => calendar(name, args, |e| e.dt().timestamp(TimeUnit::Milliseconds)),
        "now" => {
            expect_args(name, &args, 0)?;
            Ok(Value::Column(lit(Utc::now().naive_utc())))
        }

        "isValid" => {
            expect_args(name, &args, 1)?;
            match args.into_iter().next().expect("checked arity") {
                Value::Column(e) => Ok(Value::Column(e.is_not_null())),
                Value::Null => Ok(Value::Bool(false)),
                Value::Number(n) => Ok(Value::Bool(!n.is_nan())),
                _ => Ok(Value::Bool(true)),
            }
        }
        "isFinite" => {
            expect_args(name, &args, 1)?;
            match args.into_iter().next().expect("checked arity") {
                Value::Column(e) => Ok(Value::Column(e.is_finite())),
                Value::Number(n) => Ok(Value::Bool(n.is_finite())),
                _ => Ok(Value::Bool(false)),
            }
        }
        "isNan" => {
            expect_args(name, &args, 1)?;
            match args.into_iter().next().expect("checked arity") {
                Value::Column(e) => Ok(Value::Column(e.is_nan())),
                Value::Number(n) => Ok(Value::Bool(n.is_nan())),
                _ => Ok(Value::Bool(false)),
            }
        }

        "length" => {
            expect_args(name, &args, 1)?;
            match &args[0] {
                Value::Array(items) => Ok(Value::Number(items.len() as f64)),
                Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
                other => Err(Error::evaluator(format!(
                    "length() expects a list-shaped argument, got {}",
                    other.type_name()
                ))),
            }
        }

        "vlSelectionTest" => selection::vl_selection_test(ev, &args),

        "data" => Err(Error::evaluator(
            "data(...) reference was not substituted with a parameter value",
        )),

        "datetime" | "utc" | "timezoneoffset" => Err(Error::evaluator(format!(
            "{name}() is not implemented"
        ))),

        _ => Err(Error::evaluator(format!("unsupported function '{name}'"))),
    }
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(Error::evaluator(format!(
            "{name}() expects {count} argument(s), got {}",
            args.len()
        )))
    }
}

fn ternary_if(args: Vec<Value>) -> Result<Value> {
    expect_args("if", &args, 3)?;
    let mut args = args.into_iter();
    let cond = args.next().expect("checked arity");
    let then = args.next().expect("checked arity");
    let otherwise = args.next().expect("checked arity");
    match cond {
        Value::Column(c) => Ok(Value::Column(
            when(c).then(then.into_expr()?).otherwise(otherwise.into_expr()?),
        )),
        host => {
            if host.host_truthy().unwrap_or(false) {
                Ok(then)
            } else {
                Ok(otherwise)
            }
        }
    }
}

fn type_predicate(
    ev: &Evaluator,
    args: Vec<Value>,
    pred: impl Fn(&Value, Option<&DataType>) -> bool,
) -> Result<Value> {
    expect_args("type predicate", &args, 1)?;
    let dtype = match &args[0] {
        Value::Column(e) => ev.column_dtype(e),
        _ => None,
    };
    Ok(Value::Bool(pred(&args[0], dtype)))
}

fn is_numeric_dtype(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_temporal_dtype(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Date | DataType::Datetime(_, _) | DataType::Time
    )
}

fn math1(
    name: &str,
    args: Vec<Value>,
    host: impl Fn(f64) -> f64,
    column: impl FnOnce(Expr) -> Expr,
) -> Result<Value> {
    expect_args(name, &args, 1)?;
    match args.into_iter().next().expect("checked arity") {
        Value::Number(n) => Ok(Value::Number(host(n))),
        Value::Column(e) => Ok(Value::Column(column(e))),
        other => Err(Error::evaluator(format!(
            "{name}() expects a numeric argument, got {}",
            other.type_name()
        ))),
    }
}

fn math2(
    name: &str,
    args: Vec<Value>,
    host: impl Fn(f64, f64) -> f64,
    column: impl FnOnce(Expr, Expr) -> Expr,
) -> Result<Value> {
    expect_args(name, &args, 2)?;
    let mut args = args.into_iter();
    let a = args.next().expect("checked arity");
    let b = args.next().expect("checked arity");
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(host(a, b))),
        (a, b) => Ok(Value::Column(column(a.into_expr()?, b.into_expr()?))),
    }
}

fn fold_extremum(
    name: &str,
    args: Vec<Value>,
    host: impl Fn(f64, f64) -> f64,
    column: impl Fn(Expr, Expr) -> Expr,
) -> Result<Value> {
    if args.is_empty() {
        return Err(Error::evaluator(format!(
            "{name}() expects at least one argument"
        )));
    }
    let all_host = args.iter().all(|a| matches!(a, Value::Number(_)));
    if all_host {
        let mut acc = f64::NAN;
        let mut first = true;
        for arg in args {
            if let Value::Number(n) = arg {
                acc = if first { n } else { host(acc, n) };
                first = false;
            }
        }
        Ok(Value::Number(acc))
    } else {
        let mut exprs = args.into_iter().map(Value::into_expr);
        let mut acc = exprs.next().expect("non-empty args")?;
        for e in exprs {
            acc = column(acc, e?);
        }
        Ok(Value::Column(acc))
    }
}

fn calendar(name: &str, args: Vec<Value>, column: impl FnOnce(Expr) -> Expr) -> Result<Value> {
    expect_args(name, &args, 1)?;
    match args.into_iter().next().expect("checked arity") {
        Value::Column(e) => Ok(Value::Column(column(e))),
        other => Err(Error::evaluator(format!(
            "{name}() expects a column-backed datetime, got {}",
            other.type_name()
        ))),
    }
}

fn to_boolean(args: Vec<Value>) -> Result<Value> {
    expect_args("toBoolean", &args, 1)?;
    match args.into_iter().next().expect("checked arity") {
        Value::Null => Ok(Value::Null),
        Value::Column(e) => Ok(Value::Column(e.cast(DataType::Boolean))),
        host => Ok(Value::Bool(host.host_truthy().unwrap_or(false))),
    }
}

fn to_number(args: Vec<Value>) -> Result<Value> {
    expect_args("toNumber", &args, 1)?;
    match args.into_iter().next().expect("checked arity") {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => Ok(Value::Number(n)),
        Value::Bool(b) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
        Value::Str(s) => Ok(Value::Number(s.trim().parse().unwrap_or(f64::NAN))),
        Value::Column(e) => Ok(Value::Column(e.cast(DataType::Float64))),
        other => Err(Error::evaluator(format!(
            "cannot coerce a {} value to a number",
            other.type_name()
        ))),
    }
}

fn to_string(args: Vec<Value>) -> Result<Value> {
    expect_args("toString", &args, 1)?;
    match args.into_iter().next().expect("checked arity") {
        Value::Null => Ok(Value::Null),
        Value::Str(s) => Ok(Value::Str(s)),
        Value::Number(n) => Ok(Value::Str(format!("{n}"))),
        Value::Bool(b) => Ok(Value::Str(b.to_string())),
        Value::Column(e) => Ok(Value::Column(e.cast(DataType::String))),
        other => Err(Error::evaluator(format!(
            "cannot coerce a {} value to a string",
            other.type_name()
        ))),
    }
}

fn to_date(args: Vec<Value>) -> Result<Value> {
    expect_args("toDate", &args, 1)?;
    match args.into_iter().next().expect("checked arity") {
        Value::Null => Ok(Value::Null),
        Value::Str(s) => Ok(Value::Column(lit(parse_datetime(&s)?))),
        Value::Number(millis) => {
            let dt = chrono::DateTime::from_timestamp_millis(millis as i64)
                .ok_or_else(|| Error::evaluator(format!("timestamp {millis} out of range")))?;
            Ok(Value::Column(lit(dt.naive_utc())))
        }
        Value::Column(e) => Ok(Value::Column(
            e.cast(DataType::Datetime(TimeUnit::Milliseconds, None)),
        )),
        other => Err(Error::evaluator(format!(
            "cannot coerce a {} value to a date",
            other.type_name()
        ))),
    }
}

/// Parse a datetime string in the ISO-8601 forms charts emit.
pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(Error::evaluator(format!("cannot parse '{s}' as a datetime")))
}
