use crate::runtime::builtin_function::BuiltinFunction;

mod array_ops;
mod conv_ops;
mod format;
mod helpers;
mod type_check;

pub use format::format_string;

use array_ops::{builtin_append, builtin_copy, builtin_delete, builtin_len, builtin_range, builtin_splice};
use conv_ops::{
    builtin_bool, builtin_bytes, builtin_char, builtin_error, builtin_float, builtin_immutable,
    builtin_int, builtin_string, builtin_time,
};
use format::builtin_format;
use type_check::{
    builtin_is_array, builtin_is_bool, builtin_is_bytes, builtin_is_callable, builtin_is_char,
    builtin_is_error, builtin_is_float, builtin_is_function, builtin_is_immutable_array,
    builtin_is_immutable_map, builtin_is_int, builtin_is_iterable, builtin_is_map,
    builtin_is_string, builtin_is_time, builtin_is_undefined, builtin_type_name,
};

/// The process-wide builtin function table. Order is the `GetBuiltin`
/// index space; append only.
pub static BUILTINS: &[BuiltinFunction] = &[
    BuiltinFunction { name: "len", func: builtin_len },
    BuiltinFunction { name: "copy", func: builtin_copy },
    BuiltinFunction { name: "append", func: builtin_append },
    BuiltinFunction { name: "delete", func: builtin_delete },
    BuiltinFunction { name: "splice", func: builtin_splice },
    BuiltinFunction { name: "type_name", func: builtin_type_name },
    BuiltinFunction { name: "format", func: builtin_format },
    BuiltinFunction { name: "range", func: builtin_range },
    BuiltinFunction { name: "int", func: builtin_int },
    BuiltinFunction { name: "float", func: builtin_float },
    BuiltinFunction { name: "string", func: builtin_string },
    BuiltinFunction { name: "bool", func: builtin_bool },
    BuiltinFunction { name: "char", func: builtin_char },
    BuiltinFunction { name: "bytes", func: builtin_bytes },
    BuiltinFunction { name: "time", func: builtin_time },
    BuiltinFunction { name: "error", func: builtin_error },
    BuiltinFunction { name: "immutable", func: builtin_immutable },
    BuiltinFunction { name: "is_int", func: builtin_is_int },
    BuiltinFunction { name: "is_float", func: builtin_is_float },
    BuiltinFunction { name: "is_string", func: builtin_is_string },
    BuiltinFunction { name: "is_bool", func: builtin_is_bool },
    BuiltinFunction { name: "is_char", func: builtin_is_char },
    BuiltinFunction { name: "is_bytes", func: builtin_is_bytes },
    BuiltinFunction { name: "is_array", func: builtin_is_array },
    BuiltinFunction { name: "is_immutable_array", func: builtin_is_immutable_array },
    BuiltinFunction { name: "is_map", func: builtin_is_map },
    BuiltinFunction { name: "is_immutable_map", func: builtin_is_immutable_map },
    BuiltinFunction { name: "is_iterable", func: builtin_is_iterable },
    BuiltinFunction { name: "is_time", func: builtin_is_time },
    BuiltinFunction { name: "is_error", func: builtin_is_error },
    BuiltinFunction { name: "is_undefined", func: builtin_is_undefined },
    BuiltinFunction { name: "is_function", func: builtin_is_function },
    BuiltinFunction { name: "is_callable", func: builtin_is_callable },
];

pub fn get_builtin_by_name(name: &str) -> Option<BuiltinFunction> {
    BUILTINS.iter().find(|b| b.name == name).copied()
}
