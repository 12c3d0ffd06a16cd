//! Regular-expression surface of the `text` module: the `re_*` functions
//! plus the compiled-regex wrapper returned by `re_compile`.

use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;

use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::func_helpers::arg_str;

pub(super) fn add_regexp_fns(attrs: &mut HashMap<String, Value>) {
    attrs.insert(
        "re_match".into(),
        Value::user_function(UserFunction::new("re_match", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let pattern = arg_str(args, 0, "first")?;
            let text = arg_str(args, 1, "second")?;
            match Regex::new(&pattern) {
                Ok(re) => Ok(Value::Bool(re.is_match(&text))),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    attrs.insert(
        "re_find".into(),
        Value::user_function(UserFunction::new("re_find", |args| {
            if args.len() != 2 && args.len() != 3 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let pattern = arg_str(args, 0, "first")?;
            let text = arg_str(args, 1, "second")?;
            let count = opt_count(args, 2)?;
            match Regex::new(&pattern) {
                Ok(re) => Ok(regexp_find(&re, &text, count)),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    attrs.insert(
        "re_replace".into(),
        Value::user_function(UserFunction::new("re_replace", |args| {
            if args.len() != 3 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let pattern = arg_str(args, 0, "first")?;
            let text = arg_str(args, 1, "second")?;
            let repl = arg_str(args, 2, "third")?;
            match Regex::new(&pattern) {
                Ok(re) => Ok(regexp_replace(&re, &text, &repl)),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    attrs.insert(
        "re_split".into(),
        Value::user_function(UserFunction::new("re_split", |args| {
            if args.len() != 2 && args.len() != 3 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let pattern = arg_str(args, 0, "first")?;
            let text = arg_str(args, 1, "second")?;
            let count = opt_count(args, 2)?;
            match Regex::new(&pattern) {
                Ok(re) => Ok(regexp_split(&re, &text, count)),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    attrs.insert(
        "re_compile".into(),
        Value::user_function(UserFunction::new("re_compile", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let pattern = arg_str(args, 0, "first")?;
            match Regex::new(&pattern) {
                Ok(re) => Ok(make_regexp(Rc::new(re))),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );
}

fn opt_count(args: &[Value], index: usize) -> Result<Option<i64>, RuntimeError> {
    match args.get(index) {
        None => Ok(None),
        Some(Value::Int(n)) => Ok(Some(*n)),
        Some(other) => Err(RuntimeError::InvalidArgumentType {
            name: "third",
            expected: "int",
            found: other.type_name(),
        }),
    }
}

/// The compiled-regex wrapper: an immutable map of `match`/`find`/
/// `replace`/`split` bound to one compiled pattern.
fn make_regexp(re: Rc<Regex>) -> Value {
    let mut attrs: HashMap<String, Value> = HashMap::new();

    let bound = re.clone();
    attrs.insert(
        "match".into(),
        Value::user_function(UserFunction::new("match", move |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let text = arg_str(args, 0, "first")?;
            Ok(Value::Bool(bound.is_match(&text)))
        })),
    );

    let bound = re.clone();
    attrs.insert(
        "find".into(),
        Value::user_function(UserFunction::new("find", move |args| {
            if args.len() != 1 && args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let text = arg_str(args, 0, "first")?;
            let count = match args.get(1) {
                None => None,
                Some(Value::Int(n)) => Some(*n),
                Some(other) => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "second",
                        expected: "int",
                        found: other.type_name(),
                    });
                }
            };
            Ok(regexp_find(&bound, &text, count))
        })),
    );

    let bound = re.clone();
    attrs.insert(
        "replace".into(),
        Value::user_function(UserFunction::new("replace", move |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let text = arg_str(args, 0, "first")?;
            let repl = arg_str(args, 1, "second")?;
            Ok(regexp_replace(&bound, &text, &repl))
        })),
    );

    let bound = re;
    attrs.insert(
        "split".into(),
        Value::user_function(UserFunction::new("split", move |args| {
            if args.len() != 1 && args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let text = arg_str(args, 0, "first")?;
            let count = match args.get(1) {
                None => None,
                Some(Value::Int(n)) => Some(*n),
                Some(other) => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "second",
                        expected: "int",
                        found: other.type_name(),
                    });
                }
            };
            Ok(regexp_split(&bound, &text, count))
        })),
    );

    Value::ImmutableMap(Rc::new(attrs))
}

fn char_index(text: &str, byte_offset: usize) -> i64 {
    text[..byte_offset].chars().count() as i64
}

/// Without a count: the first match only. With one: up to `count` matches
/// (negative means all). Each match is an array of per-group maps carrying
/// the matched text and its character offsets; no match at all yields
/// `undefined`.
fn regexp_find(re: &Regex, text: &str, count: Option<i64>) -> Value {
    let limit = match count {
        None => 1,
        Some(n) if n < 0 => usize::MAX,
        Some(n) => n as usize,
    };

    let mut matches = Vec::new();
    for captures in re.captures_iter(text).take(limit) {
        let mut groups = Vec::new();
        for i in 0..captures.len() {
            let group = match captures.get(i) {
                Some(m) => {
                    let mut entry = HashMap::new();
                    entry.insert("text".to_string(), Value::string(m.as_str()));
                    entry.insert("begin".to_string(), Value::Int(char_index(text, m.start())));
                    entry.insert("end".to_string(), Value::Int(char_index(text, m.end())));
                    entry
                }
                None => {
                    let mut entry = HashMap::new();
                    entry.insert("text".to_string(), Value::string(""));
                    entry.insert("begin".to_string(), Value::Int(-1));
                    entry.insert("end".to_string(), Value::Int(-1));
                    entry
                }
            };
            groups.push(Value::ImmutableMap(Rc::new(group)));
        }
        matches.push(Value::array(groups));
    }

    if matches.is_empty() {
        Value::Undefined
    } else {
        Value::array(matches)
    }
}

fn regexp_replace(re: &Regex, text: &str, repl: &str) -> Value {
    Value::string(re.replace_all(text, repl).into_owned())
}

/// Split by matches; a non-negative count caps the number of pieces, zero
/// yields `undefined`, negative means unlimited.
fn regexp_split(re: &Regex, text: &str, count: Option<i64>) -> Value {
    let pieces: Vec<Value> = match count {
        None => re.split(text).map(Value::string).collect(),
        Some(n) if n < 0 => re.split(text).map(Value::string).collect(),
        Some(0) => return Value::Undefined,
        Some(n) => re.splitn(text, n as usize).map(Value::string).collect(),
    };
    Value::array(pieces)
}
