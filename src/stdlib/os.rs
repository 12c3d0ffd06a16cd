use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::modules::BuiltinModule;
use crate::runtime::MAX_BYTES_LEN;
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::func_helpers::{arg_int, arg_str};

/// Fallible OS calls follow the module convention: failures come back as
/// first-class error values, not runtime faults.
fn wrap_io<T>(result: std::io::Result<T>, ok: impl FnOnce(T) -> Value) -> Value {
    match result {
        Ok(v) => ok(v),
        Err(e) => Value::error(Value::string(e.to_string())),
    }
}

fn unit_fn(name: &'static str, f: fn(&str) -> std::io::Result<()>) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 1 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let path = arg_str(args, 0, "first")?;
        Ok(wrap_io(f(&path), |_| Value::Undefined))
    }))
}

pub(super) fn module() -> BuiltinModule {
    let mut attrs: HashMap<String, Value> = HashMap::new();

    attrs.insert(
        "path_separator".into(),
        Value::Char(std::path::MAIN_SEPARATOR),
    );
    attrs.insert(
        "path_list_separator".into(),
        Value::Char(if cfg!(windows) { ';' } else { ':' }),
    );
    attrs.insert(
        "dev_null".into(),
        Value::string(if cfg!(windows) { "NUL" } else { "/dev/null" }),
    );

    attrs.insert(
        "args".into(),
        Value::user_function(UserFunction::new("args", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(Value::array(env::args().map(Value::string).collect()))
        })),
    );

    attrs.insert(
        "getenv".into(),
        Value::user_function(UserFunction::new("getenv", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let key = arg_str(args, 0, "first")?;
            Ok(Value::string(env::var(key).unwrap_or_default()))
        })),
    );

    attrs.insert(
        "lookup_env".into(),
        Value::user_function(UserFunction::new("lookup_env", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let key = arg_str(args, 0, "first")?;
            match env::var(key) {
                Ok(value) => Ok(Value::string(value)),
                Err(_) => Ok(Value::Bool(false)),
            }
        })),
    );

    attrs.insert(
        "setenv".into(),
        Value::user_function(UserFunction::new("setenv", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let key = arg_str(args, 0, "first")?;
            let value = arg_str(args, 1, "second")?;
            // Safety: the interpreter is single-threaded and owns the
            // process environment it mutates.
            unsafe { env::set_var(key, value) };
            Ok(Value::Undefined)
        })),
    );

    attrs.insert(
        "unsetenv".into(),
        Value::user_function(UserFunction::new("unsetenv", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let key = arg_str(args, 0, "first")?;
            // Safety: as for setenv.
            unsafe { env::remove_var(key) };
            Ok(Value::Undefined)
        })),
    );

    attrs.insert(
        "environ".into(),
        Value::user_function(UserFunction::new("environ", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(Value::array(
                env::vars()
                    .map(|(k, v)| Value::string(format!("{}={}", k, v)))
                    .collect(),
            ))
        })),
    );

    attrs.insert(
        "expand_env".into(),
        Value::user_function(UserFunction::new("expand_env", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let s = arg_str(args, 0, "first")?;
            Ok(Value::string(expand_env(&s)))
        })),
    );

    attrs.insert(
        "getwd".into(),
        Value::user_function(UserFunction::new("getwd", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(wrap_io(env::current_dir(), |dir| {
                Value::string(dir.to_string_lossy())
            }))
        })),
    );

    attrs.insert(
        "chdir".into(),
        unit_fn("chdir", |dir| env::set_current_dir(dir)),
    );

    attrs.insert(
        "getpid".into(),
        Value::user_function(UserFunction::new("getpid", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(Value::Int(std::process::id() as i64))
        })),
    );

    attrs.insert(
        "temp_dir".into(),
        Value::user_function(UserFunction::new("temp_dir", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(Value::string(env::temp_dir().to_string_lossy()))
        })),
    );

    attrs.insert(
        "exit".into(),
        Value::user_function(UserFunction::new("exit", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let code = arg_int(args, 0, "first")?;
            std::process::exit(code as i32);
        })),
    );

    attrs.insert(
        "read_file".into(),
        Value::user_function(UserFunction::new("read_file", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let name = arg_str(args, 0, "first")?;
            match fs::read(&name) {
                Ok(bytes) => {
                    if bytes.len() > MAX_BYTES_LEN {
                        return Err(RuntimeError::BytesLimit);
                    }
                    Ok(Value::bytes(bytes))
                }
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    attrs.insert(
        "write_file".into(),
        Value::user_function(UserFunction::new("write_file", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let name = arg_str(args, 0, "first")?;
            let data = match &args[1] {
                Value::Bytes(b) => b.to_vec(),
                Value::String(s) => s.as_bytes().to_vec(),
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "second",
                        expected: "bytes/string",
                        found: other.type_name(),
                    });
                }
            };
            Ok(wrap_io(fs::write(&name, data), |_| Value::Undefined))
        })),
    );

    attrs.insert(
        "stat".into(),
        Value::user_function(UserFunction::new("stat", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let name = arg_str(args, 0, "first")?;
            let meta = match fs::metadata(&name) {
                Ok(meta) => meta,
                Err(e) => return Ok(Value::error(Value::string(e.to_string()))),
            };
            let mtime = meta
                .modified()
                .ok()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();
            let base_name = match Path::new(&name).file_name() {
                Some(n) => n.to_string_lossy().into_owned(),
                None => name.clone(),
            };
            let mut info = HashMap::new();
            info.insert("name".to_string(), Value::string(base_name));
            info.insert("size".to_string(), Value::Int(meta.len() as i64));
            info.insert("mtime".to_string(), Value::Time(mtime));
            info.insert("directory".to_string(), Value::Bool(meta.is_dir()));
            Ok(Value::ImmutableMap(Rc::new(info)))
        })),
    );

    attrs.insert("mkdir".into(), unit_fn("mkdir", |p| fs::create_dir(p)));
    attrs.insert(
        "mkdir_all".into(),
        unit_fn("mkdir_all", |p| fs::create_dir_all(p)),
    );
    attrs.insert("remove".into(), unit_fn("remove", remove_any));
    attrs.insert(
        "remove_all".into(),
        unit_fn("remove_all", |p| {
            if fs::metadata(p)?.is_dir() {
                fs::remove_dir_all(p)
            } else {
                fs::remove_file(p)
            }
        }),
    );

    attrs.insert(
        "rename".into(),
        Value::user_function(UserFunction::new("rename", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let from = arg_str(args, 0, "first")?;
            let to = arg_str(args, 1, "second")?;
            Ok(wrap_io(fs::rename(from, to), |_| Value::Undefined))
        })),
    );

    attrs.insert(
        "readlink".into(),
        Value::user_function(UserFunction::new("readlink", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let name = arg_str(args, 0, "first")?;
            Ok(wrap_io(fs::read_link(name), |target| {
                Value::string(target.to_string_lossy())
            }))
        })),
    );

    attrs.insert(
        "truncate".into(),
        Value::user_function(UserFunction::new("truncate", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let name = arg_str(args, 0, "first")?;
            let size = arg_int(args, 1, "second")?;
            let size = u64::try_from(size).map_err(|_| RuntimeError::IndexOutOfBounds)?;
            let result = fs::OpenOptions::new()
                .write(true)
                .open(&name)
                .and_then(|f| f.set_len(size));
            Ok(wrap_io(result, |_| Value::Undefined))
        })),
    );

    // Run-to-completion process execution; incremental process control is
    // deliberately not exposed.
    attrs.insert(
        "exec".into(),
        Value::user_function(UserFunction::new("exec", |args| {
            if args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            let program = arg_str(args, 0, "first")?;
            let mut command = Command::new(program);
            for arg in &args[1..] {
                command.arg(arg.plain_string());
            }
            let output = match command.output() {
                Ok(output) => output,
                Err(e) => return Ok(Value::error(Value::string(e.to_string()))),
            };
            let mut result = HashMap::new();
            result.insert("stdout".to_string(), Value::bytes(output.stdout));
            result.insert("stderr".to_string(), Value::bytes(output.stderr));
            result.insert(
                "code".to_string(),
                Value::Int(output.status.code().unwrap_or(-1) as i64),
            );
            result.insert("success".to_string(), Value::Bool(output.status.success()));
            Ok(Value::ImmutableMap(Rc::new(result)))
        })),
    );

    BuiltinModule::new(attrs)
}

fn remove_any(path: &str) -> std::io::Result<()> {
    if fs::metadata(path)?.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

/// `$VAR` and `${VAR}` expansion; unknown variables expand to nothing.
fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                out.push_str(&env::var(&name).unwrap_or_default());
            }
            Some(c) if c.is_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}
