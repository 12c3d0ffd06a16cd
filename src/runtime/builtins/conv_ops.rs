use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::helpers::{check_arity, check_arity_range};

/// Conversion builtins take an optional second argument returned verbatim
/// when the conversion fails; without it, failure yields `undefined`.
fn converted(result: Option<Value>, args: &[Value]) -> Value {
    match result {
        Some(value) => value,
        None => args.get(1).cloned().unwrap_or(Value::Undefined),
    }
}

pub(super) fn builtin_int(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity_range(args, 1, 2)?;
    Ok(converted(args[0].to_i64().map(Value::Int), args))
}

pub(super) fn builtin_float(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity_range(args, 1, 2)?;
    Ok(converted(args[0].to_f64().map(Value::Float), args))
}

pub(super) fn builtin_string(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity_range(args, 1, 2)?;
    match &args[0] {
        Value::Undefined => Ok(converted(None, args)),
        other => Ok(Value::string(other.plain_string())),
    }
}

pub(super) fn builtin_bool(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    Ok(Value::Bool(!args[0].is_falsy()))
}

pub(super) fn builtin_char(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity_range(args, 1, 2)?;
    Ok(converted(args[0].to_char().map(Value::Char), args))
}

pub(super) fn builtin_bytes(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity_range(args, 1, 2)?;
    match &args[0] {
        Value::Bytes(_) => Ok(args[0].clone()),
        Value::String(s) => {
            if s.len() > crate::runtime::MAX_BYTES_LEN {
                return Err(RuntimeError::BytesLimit);
            }
            Ok(Value::bytes(s.as_bytes().to_vec()))
        }
        // bytes(N) allocates N zero bytes.
        Value::Int(n) => {
            let n = usize::try_from(*n).map_err(|_| RuntimeError::BytesLimit)?;
            if n > crate::runtime::MAX_BYTES_LEN {
                return Err(RuntimeError::BytesLimit);
            }
            Ok(Value::bytes(vec![0u8; n]))
        }
        _ => Ok(converted(None, args)),
    }
}

pub(super) fn builtin_time(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity_range(args, 1, 2)?;
    Ok(converted(args[0].to_time().map(Value::Time), args))
}

pub(super) fn builtin_error(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    Ok(Value::error(args[0].clone()))
}

pub(super) fn builtin_immutable(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    Ok(args[0].make_immutable())
}
