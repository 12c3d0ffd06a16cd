use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::modules::BuiltinModule;
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::func_helpers::{arg_int, arg_str};

fn arg_time(args: &[Value], index: usize, name: &'static str) -> Result<DateTime<Utc>, RuntimeError> {
    match args.get(index) {
        Some(Value::Time(t)) => Ok(*t),
        Some(other) => Err(RuntimeError::InvalidArgumentType {
            name,
            expected: "time",
            found: other.type_name(),
        }),
        None => Err(RuntimeError::WrongNumArguments),
    }
}

fn time_field(name: &'static str, f: fn(&DateTime<Utc>) -> i64) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 1 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let t = arg_time(args, 0, "first")?;
        Ok(Value::Int(f(&t)))
    }))
}

fn duration_field(name: &'static str, f: fn(i64) -> Value) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 1 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let d = arg_int(args, 0, "first")?;
        Ok(f(d))
    }))
}

pub(super) fn module() -> BuiltinModule {
    let mut attrs: HashMap<String, Value> = HashMap::new();

    attrs.insert("nanosecond".into(), Value::Int(1));
    attrs.insert("microsecond".into(), Value::Int(1_000));
    attrs.insert("millisecond".into(), Value::Int(1_000_000));
    attrs.insert("second".into(), Value::Int(1_000_000_000));
    attrs.insert("minute".into(), Value::Int(60 * 1_000_000_000));
    attrs.insert("hour".into(), Value::Int(3_600 * 1_000_000_000));

    for (i, month) in MONTH_NAMES.iter().enumerate() {
        attrs.insert(month.to_lowercase(), Value::Int(i as i64 + 1));
    }

    attrs.insert(
        "now".into(),
        Value::user_function(UserFunction::new("now", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(Value::Time(Utc::now()))
        })),
    );

    attrs.insert(
        "sleep".into(),
        Value::user_function(UserFunction::new("sleep", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let d = arg_int(args, 0, "first")?;
            if d > 0 {
                std::thread::sleep(std::time::Duration::from_nanos(d as u64));
            }
            Ok(Value::Undefined)
        })),
    );

    attrs.insert(
        "unix".into(),
        Value::user_function(UserFunction::new("unix", |args| {
            if args.is_empty() || args.len() > 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let sec = arg_int(args, 0, "first")?;
            let nsec = match args.get(1) {
                None => 0,
                Some(Value::Int(v)) => *v,
                Some(other) => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "second",
                        expected: "int",
                        found: other.type_name(),
                    });
                }
            };
            match Utc.timestamp_opt(sec, nsec as u32).single() {
                Some(t) => Ok(Value::Time(t)),
                None => Ok(Value::Undefined),
            }
        })),
    );

    attrs.insert(
        "date".into(),
        Value::user_function(UserFunction::new("date", |args| {
            if args.len() != 7 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let names = ["first", "second", "third", "fourth", "fifth", "sixth", "seventh"];
            let mut parts = [0i64; 7];
            for i in 0..7 {
                parts[i] = match &args[i] {
                    Value::Int(v) => *v,
                    other => {
                        return Err(RuntimeError::InvalidArgumentType {
                            name: names[i],
                            expected: "int",
                            found: other.type_name(),
                        });
                    }
                };
            }
            let [year, month, day, hour, minute, second, nanosecond] = parts;
            let built = Utc
                .with_ymd_and_hms(
                    year as i32,
                    month as u32,
                    day as u32,
                    hour as u32,
                    minute as u32,
                    second as u32,
                )
                .single()
                .map(|t| t + Duration::nanoseconds(nanosecond));
            match built {
                Some(t) => Ok(Value::Time(t)),
                None => Ok(Value::Undefined),
            }
        })),
    );

    attrs.insert(
        "parse".into(),
        Value::user_function(UserFunction::new("parse", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            match DateTime::parse_from_rfc3339(&s) {
                Ok(t) => Ok(Value::Time(t.with_timezone(&Utc))),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    attrs.insert(
        "parse_duration".into(),
        Value::user_function(UserFunction::new("parse_duration", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            match parse_duration(&s) {
                Ok(d) => Ok(Value::Int(d)),
                Err(e) => Ok(Value::error(Value::string(e))),
            }
        })),
    );

    attrs.insert(
        "since".into(),
        time_field("since", |t| {
            (Utc::now() - *t).num_nanoseconds().unwrap_or(i64::MAX)
        }),
    );
    attrs.insert(
        "until".into(),
        time_field("until", |t| {
            (*t - Utc::now()).num_nanoseconds().unwrap_or(i64::MAX)
        }),
    );

    attrs.insert(
        "add".into(),
        Value::user_function(UserFunction::new("add", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t = arg_time(args, 0, "first")?;
            let d = arg_int(args, 1, "second")?;
            Ok(Value::Time(t + Duration::nanoseconds(d)))
        })),
    );

    attrs.insert(
        "sub".into(),
        Value::user_function(UserFunction::new("sub", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t1 = arg_time(args, 0, "first")?;
            let t2 = arg_time(args, 1, "second")?;
            Ok(Value::Int(
                (t1 - t2).num_nanoseconds().unwrap_or(i64::MAX),
            ))
        })),
    );

    attrs.insert(
        "add_date".into(),
        Value::user_function(UserFunction::new("add_date", |args| {
            if args.len() != 4 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t = arg_time(args, 0, "first")?;
            let years = arg_int(args, 1, "second")?;
            let months = arg_int(args, 2, "third")?;
            let days = arg_int(args, 3, "fourth")?;
            let total_months = years * 12 + months;
            let shifted = if total_months >= 0 {
                t.checked_add_months(chrono::Months::new(total_months as u32))
            } else {
                t.checked_sub_months(chrono::Months::new((-total_months) as u32))
            };
            match shifted.map(|t| t + Duration::days(days)) {
                Some(t) => Ok(Value::Time(t)),
                None => Ok(Value::Undefined),
            }
        })),
    );

    attrs.insert(
        "after".into(),
        Value::user_function(UserFunction::new("after", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t1 = arg_time(args, 0, "first")?;
            let t2 = arg_time(args, 1, "second")?;
            Ok(Value::Bool(t1 > t2))
        })),
    );
    attrs.insert(
        "before".into(),
        Value::user_function(UserFunction::new("before", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t1 = arg_time(args, 0, "first")?;
            let t2 = arg_time(args, 1, "second")?;
            Ok(Value::Bool(t1 < t2))
        })),
    );

    attrs.insert(
        "duration_hours".into(),
        duration_field("duration_hours", |d| {
            Value::Float(d as f64 / 3_600_000_000_000.0)
        }),
    );
    attrs.insert(
        "duration_minutes".into(),
        duration_field("duration_minutes", |d| {
            Value::Float(d as f64 / 60_000_000_000.0)
        }),
    );
    attrs.insert(
        "duration_seconds".into(),
        duration_field("duration_seconds", |d| {
            Value::Float(d as f64 / 1_000_000_000.0)
        }),
    );
    attrs.insert(
        "duration_nanoseconds".into(),
        duration_field("duration_nanoseconds", Value::Int),
    );
    attrs.insert(
        "duration_string".into(),
        duration_field("duration_string", |d| Value::string(format_duration(d))),
    );

    attrs.insert(
        "month_string".into(),
        Value::user_function(UserFunction::new("month_string", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let m = arg_int(args, 0, "first")?;
            match usize::try_from(m - 1).ok().and_then(|i| MONTH_NAMES.get(i)) {
                Some(name) => Ok(Value::string(*name)),
                None => Ok(Value::error(Value::string(format!("invalid month {}", m)))),
            }
        })),
    );

    attrs.insert(
        "time_format".into(),
        Value::user_function(UserFunction::new("time_format", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t = arg_time(args, 0, "first")?;
            let layout = arg_str(args, 1, "second")?;
            Ok(Value::string(t.format(&layout).to_string()))
        })),
    );
    attrs.insert(
        "time_string".into(),
        Value::user_function(UserFunction::new("time_string", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t = arg_time(args, 0, "first")?;
            Ok(Value::string(t.to_rfc3339()))
        })),
    );

    attrs.insert("time_unix".into(), time_field("time_unix", |t| t.timestamp()));
    attrs.insert(
        "time_unix_nano".into(),
        time_field("time_unix_nano", |t| t.timestamp_nanos_opt().unwrap_or(0)),
    );
    attrs.insert("time_year".into(), time_field("time_year", |t| t.year() as i64));
    attrs.insert("time_month".into(), time_field("time_month", |t| t.month() as i64));
    attrs.insert("time_day".into(), time_field("time_day", |t| t.day() as i64));
    attrs.insert(
        "time_weekday".into(),
        time_field("time_weekday", |t| {
            t.weekday().num_days_from_sunday() as i64
        }),
    );
    attrs.insert("time_hour".into(), time_field("time_hour", |t| t.hour() as i64));
    attrs.insert(
        "time_minute".into(),
        time_field("time_minute", |t| t.minute() as i64),
    );
    attrs.insert(
        "time_second".into(),
        time_field("time_second", |t| t.second() as i64),
    );
    attrs.insert(
        "time_nanosecond".into(),
        time_field("time_nanosecond", |t| t.nanosecond() as i64),
    );

    attrs.insert(
        "is_zero".into(),
        Value::user_function(UserFunction::new("is_zero", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let t = arg_time(args, 0, "first")?;
            Ok(Value::Bool(t == Utc.timestamp_opt(0, 0).unwrap()))
        })),
    );

    BuiltinModule::new(attrs)
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Parses `1h30m`, `-2.5s`, `150ms` and friends into nanoseconds.
fn parse_duration(s: &str) -> Result<i64, String> {
    let original = s;
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if s == "0" {
        return Ok(0);
    }
    if s.is_empty() {
        return Err(format!("invalid duration {:?}", original));
    }

    let mut total: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration {:?}", original));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", original))?;
        rest = &rest[number_len..];

        let unit_ns = if let Some(r) = rest.strip_prefix("ns") {
            rest = r;
            1.0
        } else if let Some(r) = rest.strip_prefix("us").or(rest.strip_prefix("µs")) {
            rest = r;
            1_000.0
        } else if let Some(r) = rest.strip_prefix("ms") {
            rest = r;
            1_000_000.0
        } else if let Some(r) = rest.strip_prefix('s') {
            rest = r;
            1_000_000_000.0
        } else if let Some(r) = rest.strip_prefix('m') {
            rest = r;
            60_000_000_000.0
        } else if let Some(r) = rest.strip_prefix('h') {
            rest = r;
            3_600_000_000_000.0
        } else {
            return Err(format!("unknown unit in duration {:?}", original));
        };
        total += number * unit_ns;
    }

    let total = if negative { -total } else { total };
    Ok(total as i64)
}

/// Compact textual form: `1h2m3.5s`, `150ms`, `0s`.
fn format_duration(ns: i64) -> String {
    if ns == 0 {
        return "0s".to_string();
    }
    let sign = if ns < 0 { "-" } else { "" };
    let n = ns.unsigned_abs();

    if n < 1_000 {
        return format!("{}{}ns", sign, n);
    }
    if n < 1_000_000 {
        return format!("{}{}µs", sign, sub_unit(n, 1_000));
    }
    if n < 1_000_000_000 {
        return format!("{}{}ms", sign, sub_unit(n, 1_000_000));
    }

    let total_seconds = n / 1_000_000_000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds / 60) % 60;
    let seconds_ns = n % 60_000_000_000;
    let seconds = format!("{}s", sub_unit(seconds_ns, 1_000_000_000));
    match (hours, minutes) {
        (0, 0) => format!("{}{}", sign, seconds),
        (0, m) => format!("{}{}m{}", sign, m, seconds),
        (h, m) => format!("{}{}h{}m{}", sign, h, m, seconds),
    }
}

/// `value / unit` with the fraction trimmed of trailing zeros.
fn sub_unit(value: u64, unit: u64) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let frac = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
