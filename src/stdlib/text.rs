use std::collections::HashMap;

use crate::modules::BuiltinModule;
use crate::runtime::MAX_STRING_LEN;
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::func_helpers::{arg_int, arg_str, func_asrs, func_assrb, func_assrs};
use super::text_regexp;

pub(super) fn module() -> BuiltinModule {
    let mut attrs: HashMap<String, Value> = HashMap::new();

    attrs.insert("to_lower".into(), func_asrs("to_lower", |s| s.to_lowercase()));
    attrs.insert("to_upper".into(), func_asrs("to_upper", |s| s.to_uppercase()));
    attrs.insert("trim_space".into(), func_asrs("trim_space", |s| s.trim().to_string()));

    attrs.insert("contains".into(), func_assrb("contains", |s, sub| s.contains(sub)));
    attrs.insert("has_prefix".into(), func_assrb("has_prefix", |s, p| s.starts_with(p)));
    attrs.insert("has_suffix".into(), func_assrb("has_suffix", |s, p| s.ends_with(p)));
    attrs.insert(
        "trim_prefix".into(),
        func_assrs("trim_prefix", |s, p| s.strip_prefix(p).unwrap_or(s).to_string()),
    );
    attrs.insert(
        "trim_suffix".into(),
        func_assrs("trim_suffix", |s, p| s.strip_suffix(p).unwrap_or(s).to_string()),
    );
    attrs.insert(
        "trim".into(),
        func_assrs("trim", |s, cutset| {
            s.trim_matches(|c| cutset.contains(c)).to_string()
        }),
    );

    attrs.insert(
        "index".into(),
        Value::user_function(UserFunction::new("index", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let sub = arg_str(args, 1, "second")?;
            // Character index, matching the language's string indexing.
            match s.find(&sub) {
                Some(byte_idx) => Ok(Value::Int(s[..byte_idx].chars().count() as i64)),
                None => Ok(Value::Int(-1)),
            }
        })),
    );

    attrs.insert(
        "split".into(),
        Value::user_function(UserFunction::new("split", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let sep = arg_str(args, 1, "second")?;
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::string(c.to_string())).collect()
            } else {
                s.split(&sep).map(Value::string).collect()
            };
            Ok(Value::array(parts))
        })),
    );

    attrs.insert(
        "join".into(),
        Value::user_function(UserFunction::new("join", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let elements = match &args[0] {
                Value::Array(v) => v.borrow().clone(),
                Value::ImmutableArray(v) => v.as_ref().clone(),
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "first",
                        expected: "array",
                        found: other.type_name(),
                    });
                }
            };
            let sep = arg_str(args, 1, "second")?;
            let parts: Vec<String> = elements.iter().map(Value::plain_string).collect();
            Ok(Value::string(parts.join(&sep)))
        })),
    );

    attrs.insert(
        "replace".into(),
        Value::user_function(UserFunction::new("replace", |args| {
            if args.len() != 3 && args.len() != 4 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let old = arg_str(args, 1, "second")?;
            let new = arg_str(args, 2, "third")?;
            let result = match args.get(3) {
                Some(Value::Int(n)) if *n >= 0 => s.replacen(&old, &new, *n as usize),
                Some(Value::Int(_)) | None => s.replace(&old, &new),
                Some(other) => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "fourth",
                        expected: "int",
                        found: other.type_name(),
                    });
                }
            };
            Ok(Value::string(result))
        })),
    );

    attrs.insert(
        "repeat".into(),
        Value::user_function(UserFunction::new("repeat", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let count = arg_int(args, 1, "second")?;
            let count = usize::try_from(count).map_err(|_| RuntimeError::IndexOutOfBounds)?;
            if s.len().saturating_mul(count) > MAX_STRING_LEN {
                return Err(RuntimeError::StringLimit);
            }
            Ok(Value::string(s.repeat(count)))
        })),
    );

    attrs.insert(
        "fields".into(),
        Value::user_function(UserFunction::new("fields", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            Ok(Value::array(
                s.split_whitespace().map(Value::string).collect(),
            ))
        })),
    );

    attrs.insert(
        "count".into(),
        Value::user_function(UserFunction::new("count", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let sub = arg_str(args, 1, "second")?;
            // An empty needle counts the gaps between characters.
            let n = if sub.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(&sub).count()
            };
            Ok(Value::Int(n as i64))
        })),
    );

    attrs.insert(
        "equal_fold".into(),
        func_assrb("equal_fold", |a, b| a.to_lowercase() == b.to_lowercase()),
    );

    attrs.insert(
        "last_index".into(),
        Value::user_function(UserFunction::new("last_index", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let sub = arg_str(args, 1, "second")?;
            match s.rfind(&sub) {
                Some(byte_idx) => Ok(Value::Int(s[..byte_idx].chars().count() as i64)),
                None => Ok(Value::Int(-1)),
            }
        })),
    );

    attrs.insert(
        "trim_left".into(),
        func_assrs("trim_left", |s, cutset| {
            s.trim_start_matches(|c| cutset.contains(c)).to_string()
        }),
    );
    attrs.insert(
        "trim_right".into(),
        func_assrs("trim_right", |s, cutset| {
            s.trim_end_matches(|c| cutset.contains(c)).to_string()
        }),
    );

    attrs.insert(
        "substr".into(),
        Value::user_function(UserFunction::new("substr", |args| {
            if args.len() != 2 && args.len() != 3 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let chars: Vec<char> = s.chars().collect();
            let begin = arg_int(args, 1, "second")?;
            let end = match args.get(2) {
                None => chars.len() as i64,
                Some(Value::Int(v)) => *v,
                Some(other) => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "third",
                        expected: "int",
                        found: other.type_name(),
                    });
                }
            };
            if begin > end {
                return Err(RuntimeError::InvalidIndexType);
            }
            let clamp = |i: i64| (i.max(0) as usize).min(chars.len());
            Ok(Value::string(
                chars[clamp(begin)..clamp(end)].iter().collect::<String>(),
            ))
        })),
    );

    attrs.insert("pad_left".into(), pad_fn("pad_left", true));
    attrs.insert("pad_right".into(), pad_fn("pad_right", false));

    attrs.insert(
        "format_bool".into(),
        Value::user_function(UserFunction::new("format_bool", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            match &args[0] {
                Value::Bool(v) => Ok(Value::string(if *v { "true" } else { "false" })),
                other => Err(RuntimeError::InvalidArgumentType {
                    name: "first",
                    expected: "bool",
                    found: other.type_name(),
                }),
            }
        })),
    );

    attrs.insert(
        "format_float".into(),
        Value::user_function(UserFunction::new("format_float", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let v = match &args[0] {
                Value::Float(v) => *v,
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "first",
                        expected: "float",
                        found: other.type_name(),
                    });
                }
            };
            let prec = arg_int(args, 1, "second")?;
            if prec < 0 {
                Ok(Value::string(v.to_string()))
            } else {
                Ok(Value::string(format!("{:.*}", prec as usize, v)))
            }
        })),
    );

    attrs.insert(
        "format_int".into(),
        Value::user_function(UserFunction::new("format_int", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let v = arg_int(args, 0, "first")?;
            let base = arg_int(args, 1, "second")?;
            format_int(v, base).map(Value::string)
        })),
    );

    attrs.insert(
        "itoa".into(),
        Value::user_function(UserFunction::new("itoa", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let v = arg_int(args, 0, "first")?;
            Ok(Value::string(v.to_string()))
        })),
    );

    attrs.insert(
        "parse_bool".into(),
        Value::user_function(UserFunction::new("parse_bool", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            match s.as_str() {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
                "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
                _ => Ok(Value::error(Value::string(format!(
                    "invalid syntax: {:?}",
                    s
                )))),
            }
        })),
    );

    attrs.insert(
        "parse_float".into(),
        Value::user_function(UserFunction::new("parse_float", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            match s.trim().parse::<f64>() {
                Ok(v) => Ok(Value::Float(v)),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    attrs.insert(
        "parse_int".into(),
        Value::user_function(UserFunction::new("parse_int", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            let base = arg_int(args, 1, "second")?;
            Ok(parse_int(&s, base))
        })),
    );

    attrs.insert(
        "atoi".into(),
        Value::user_function(UserFunction::new("atoi", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            Ok(parse_int(&s, 10))
        })),
    );

    text_regexp::add_regexp_fns(&mut attrs);

    BuiltinModule::new(attrs)
}

/// Pads to `total` characters with the pad string (default a space),
/// repeating and truncating it on the padded side like the original does.
fn pad_fn(name: &'static str, left: bool) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 2 && args.len() != 3 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let s = arg_str(args, 0, "first")?;
        let total = usize::try_from(arg_int(args, 1, "second")?).unwrap_or(0);
        if total > MAX_STRING_LEN {
            return Err(RuntimeError::StringLimit);
        }
        let chars: Vec<char> = s.chars().collect();
        if chars.len() >= total {
            return Ok(Value::string(s));
        }
        let pad = match args.get(2) {
            None => " ".to_string(),
            Some(Value::String(p)) => p.to_string(),
            Some(other) => {
                return Err(RuntimeError::InvalidArgumentType {
                    name: "third",
                    expected: "string",
                    found: other.type_name(),
                });
            }
        };
        if pad.is_empty() {
            return Ok(Value::string(s));
        }
        let mut padding: Vec<char> = Vec::with_capacity(total - chars.len());
        while padding.len() < total - chars.len() {
            padding.extend(pad.chars());
        }
        padding.truncate(total - chars.len());
        let out: String = if left {
            padding.into_iter().chain(chars).collect()
        } else {
            chars.into_iter().chain(padding).collect()
        };
        Ok(Value::string(out))
    }))
}

fn format_int(v: i64, base: i64) -> Result<String, RuntimeError> {
    if !(2..=36).contains(&base) {
        return Err(RuntimeError::host(format!("invalid base {}", base)));
    }
    let digits = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let negative = v < 0;
    let mut n = (v as i128).unsigned_abs();
    let base = base as u128;
    let mut out = Vec::new();
    loop {
        out.push(digits[(n % base) as usize]);
        n /= base;
        if n == 0 {
            break;
        }
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    Ok(String::from_utf8(out).expect("ascii digits"))
}

/// Base 0 auto-detects a `0x`/`0o`/`0b` prefix, like the original.
fn parse_int(s: &str, base: i64) -> Value {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (base, s) = if base == 0 {
        if let Some(rest) = s.strip_prefix("0x").or(s.strip_prefix("0X")) {
            (16, rest)
        } else if let Some(rest) = s.strip_prefix("0o").or(s.strip_prefix("0O")) {
            (8, rest)
        } else if let Some(rest) = s.strip_prefix("0b").or(s.strip_prefix("0B")) {
            (2, rest)
        } else {
            (10, s)
        }
    } else {
        (base, s)
    };
    if !(2..=36).contains(&base) {
        return Value::error(Value::string(format!("invalid base {}", base)));
    }
    match i64::from_str_radix(s, base as u32) {
        Ok(v) => Value::Int(if negative { -v } else { v }),
        Err(e) => Value::error(Value::string(e.to_string())),
    }
}
