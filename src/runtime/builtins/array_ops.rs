use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::helpers::{check_arity, invalid_arg};

pub(super) fn builtin_len(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    let len = match &args[0] {
        Value::Array(v) => v.borrow().len(),
        Value::ImmutableArray(v) => v.len(),
        Value::Map(v) => v.borrow().len(),
        Value::ImmutableMap(v) => v.len(),
        Value::String(v) => v.chars().count(),
        Value::Bytes(v) => v.len(),
        other => return Err(invalid_arg(0, "array/string/bytes/map", other)),
    };
    Ok(Value::Int(len as i64))
}

pub(super) fn builtin_copy(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    Ok(args[0].deep_copy())
}

pub(super) fn builtin_append(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.is_empty() {
        return Err(RuntimeError::WrongNumArguments);
    }
    let mut elements = match &args[0] {
        Value::Array(v) => v.borrow().clone(),
        Value::ImmutableArray(v) => v.as_ref().clone(),
        other => return Err(invalid_arg(0, "array", other)),
    };
    elements.extend(args[1..].iter().cloned());
    Ok(Value::array(elements))
}

pub(super) fn builtin_delete(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 2)?;
    let entries = match &args[0] {
        Value::Map(v) => v,
        other => return Err(invalid_arg(0, "map", other)),
    };
    let key = match &args[1] {
        Value::String(key) => key,
        other => return Err(invalid_arg(1, "string", other)),
    };
    entries.borrow_mut().remove(key.as_ref());
    Ok(Value::Undefined)
}

/// `splice(arr, start?, delete_count?, items...)`: removes the designated
/// range in place, inserts the items, and returns the removed sub-array.
/// An oversized count is clamped to the array's tail.
pub(super) fn builtin_splice(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.is_empty() {
        return Err(RuntimeError::WrongNumArguments);
    }
    let array = match &args[0] {
        Value::Array(v) => v,
        other => return Err(invalid_arg(0, "array", other)),
    };
    let len = array.borrow().len() as i64;

    let start = match args.get(1) {
        None => 0,
        Some(Value::Int(v)) => *v,
        Some(other) => return Err(invalid_arg(1, "int", other)),
    };
    if start < 0 || start > len {
        return Err(RuntimeError::IndexOutOfBounds);
    }
    let count = match args.get(2) {
        None => len - start,
        Some(Value::Int(v)) => *v,
        Some(other) => return Err(invalid_arg(2, "int", other)),
    };
    if count < 0 {
        return Err(RuntimeError::IndexOutOfBounds);
    }
    let count = count.min(len - start);

    let start = start as usize;
    let count = count as usize;
    let items = args.get(3..).unwrap_or(&[]).to_vec();
    let removed: Vec<Value> = array
        .borrow_mut()
        .splice(start..start + count, items)
        .collect();
    Ok(Value::array(removed))
}

/// `range(start, stop, step?)`: the step must be positive; direction comes
/// from the sign of `stop - start`.
pub(super) fn builtin_range(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(RuntimeError::WrongNumArguments);
    }
    let names = ["start", "stop", "step"];
    let mut bounds = [0i64; 3];
    bounds[2] = 1;
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Value::Int(v) => bounds[i] = *v,
            other => {
                return Err(RuntimeError::InvalidArgumentType {
                    name: names[i],
                    expected: "int",
                    found: other.type_name(),
                });
            }
        }
    }
    let (start, stop, step) = (bounds[0], bounds[1], bounds[2]);
    if step <= 0 {
        return Err(RuntimeError::InvalidRangeStep);
    }

    let mut elements = Vec::new();
    if start <= stop {
        let mut i = start;
        while i < stop {
            elements.push(Value::Int(i));
            i += step;
        }
    } else {
        let mut i = start;
        while i > stop {
            elements.push(Value::Int(i));
            i -= step;
        }
    }
    Ok(Value::array(elements))
}
