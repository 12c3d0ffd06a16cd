//! Adapters that lift plain Rust functions into named module callables.
//! The naming follows the argument/return shape: `afrf` is
//! "arg float, return float", and so on.

use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

pub(super) fn arg_float(args: &[Value], index: usize, name: &'static str) -> Result<f64, RuntimeError> {
    match args.get(index) {
        Some(value) => value.to_f64().ok_or(RuntimeError::InvalidArgumentType {
            name,
            expected: "float",
            found: value.type_name(),
        }),
        None => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn arg_int(args: &[Value], index: usize, name: &'static str) -> Result<i64, RuntimeError> {
    match args.get(index) {
        Some(Value::Int(v)) => Ok(*v),
        Some(other) => Err(RuntimeError::InvalidArgumentType {
            name,
            expected: "int",
            found: other.type_name(),
        }),
        None => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn arg_str(args: &[Value], index: usize, name: &'static str) -> Result<String, RuntimeError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.to_string()),
        Some(other) => Err(RuntimeError::InvalidArgumentType {
            name,
            expected: "string",
            found: other.type_name(),
        }),
        None => Err(RuntimeError::WrongNumArguments),
    }
}

pub(super) fn func_afrf(name: &'static str, f: fn(f64) -> f64) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 1 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let v = arg_float(args, 0, "first")?;
        Ok(Value::Float(f(v)))
    }))
}

pub(super) fn func_affrf(name: &'static str, f: fn(f64, f64) -> f64) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 2 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let a = arg_float(args, 0, "first")?;
        let b = arg_float(args, 1, "second")?;
        Ok(Value::Float(f(a, b)))
    }))
}

pub(super) fn func_afrb(name: &'static str, f: fn(f64) -> bool) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 1 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let v = arg_float(args, 0, "first")?;
        Ok(Value::Bool(f(v)))
    }))
}

pub(super) fn func_asrs(name: &'static str, f: fn(&str) -> String) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 1 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let s = arg_str(args, 0, "first")?;
        Ok(Value::string(f(&s)))
    }))
}

pub(super) fn func_assrb(name: &'static str, f: fn(&str, &str) -> bool) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 2 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let a = arg_str(args, 0, "first")?;
        let b = arg_str(args, 1, "second")?;
        Ok(Value::Bool(f(&a, &b)))
    }))
}

pub(super) fn func_assrs(name: &'static str, f: fn(&str, &str) -> String) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        if args.len() != 2 {
            return Err(RuntimeError::WrongNumArguments);
        }
        let a = arg_str(args, 0, "first")?;
        let b = arg_str(args, 1, "second")?;
        Ok(Value::string(f(&a, &b)))
    }))
}
