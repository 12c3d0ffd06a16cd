use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::helpers::check_arity;

pub(super) fn builtin_type_name(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    Ok(Value::string(args[0].type_name()))
}

macro_rules! predicate {
    ($name:ident, $pattern:pat) => {
        pub(super) fn $name(args: &[Value]) -> Result<Value, RuntimeError> {
            check_arity(args, 1)?;
            Ok(Value::Bool(matches!(&args[0], $pattern)))
        }
    };
}

predicate!(builtin_is_int, Value::Int(_));
predicate!(builtin_is_float, Value::Float(_));
predicate!(builtin_is_string, Value::String(_));
predicate!(builtin_is_bool, Value::Bool(_));
predicate!(builtin_is_char, Value::Char(_));
predicate!(builtin_is_bytes, Value::Bytes(_));
predicate!(builtin_is_array, Value::Array(_));
predicate!(builtin_is_immutable_array, Value::ImmutableArray(_));
predicate!(builtin_is_map, Value::Map(_));
predicate!(builtin_is_immutable_map, Value::ImmutableMap(_));
predicate!(builtin_is_time, Value::Time(_));
predicate!(builtin_is_error, Value::Error(_));
predicate!(builtin_is_undefined, Value::Undefined);
predicate!(builtin_is_function, Value::Function(_) | Value::Closure(_));

pub(super) fn builtin_is_iterable(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    Ok(Value::Bool(args[0].is_iterable()))
}

pub(super) fn builtin_is_callable(args: &[Value]) -> Result<Value, RuntimeError> {
    check_arity(args, 1)?;
    Ok(Value::Bool(args[0].is_callable()))
}
