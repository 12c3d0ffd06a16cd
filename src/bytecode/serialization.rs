//! Tagged binary encoding for constants and the file set, shared by the
//! bytecode file format and the on-disk compile cache.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::rc::Rc;

use chrono::TimeZone;

use crate::modules::{MODULE_NAME_ATTR, ModuleMap};
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::builtins;
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;
use crate::syntax::source::{SourceFile, SourceFileSet};

const TAG_UNDEFINED: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_CHAR: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_ERROR: u8 = 7;
const TAG_TIME: u8 = 8;
const TAG_ARRAY: u8 = 9;
const TAG_IMMUTABLE_ARRAY: u8 = 10;
const TAG_MAP: u8 = 11;
const TAG_IMMUTABLE_MAP: u8 = 12;
const TAG_FUNCTION: u8 = 13;
const TAG_BUILTIN: u8 = 14;
const TAG_USER_FUNCTION: u8 = 15;

pub(crate) fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

pub fn write_u16<W: Write>(w: &mut W, value: u16) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_u32<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_i64<W: Write>(w: &mut W, value: i64) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_f64<W: Write>(w: &mut W, value: f64) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn write_string<W: Write>(w: &mut W, value: &str) -> io::Result<()> {
    write_u32(w, value.len() as u32)?;
    w.write_all(value.as_bytes())
}

pub fn write_bytes<W: Write>(w: &mut W, value: &[u8]) -> io::Result<()> {
    write_u32(w, value.len() as u32)?;
    w.write_all(value)
}

pub fn read_u8_val<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i64<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| invalid_data("malformed string payload"))
}

pub fn read_bytes<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_value<W: Write>(w: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Undefined => w.write_all(&[TAG_UNDEFINED]),
        Value::Bool(v) => {
            w.write_all(&[TAG_BOOL])?;
            w.write_all(&[u8::from(*v)])
        }
        Value::Int(v) => {
            w.write_all(&[TAG_INT])?;
            write_i64(w, *v)
        }
        Value::Float(v) => {
            w.write_all(&[TAG_FLOAT])?;
            write_f64(w, *v)
        }
        Value::Char(v) => {
            w.write_all(&[TAG_CHAR])?;
            write_u32(w, *v as u32)
        }
        Value::String(v) => {
            w.write_all(&[TAG_STRING])?;
            write_string(w, v)
        }
        Value::Bytes(v) => {
            w.write_all(&[TAG_BYTES])?;
            write_bytes(w, v)
        }
        Value::Error(v) => {
            w.write_all(&[TAG_ERROR])?;
            write_value(w, v)
        }
        Value::Time(v) => {
            w.write_all(&[TAG_TIME])?;
            write_i64(w, v.timestamp_nanos_opt().unwrap_or(0))
        }
        Value::Array(v) => {
            w.write_all(&[TAG_ARRAY])?;
            write_value_seq(w, &v.borrow())
        }
        Value::ImmutableArray(v) => {
            w.write_all(&[TAG_IMMUTABLE_ARRAY])?;
            write_value_seq(w, v)
        }
        Value::Map(v) => {
            w.write_all(&[TAG_MAP])?;
            write_value_map(w, &v.borrow())
        }
        Value::ImmutableMap(v) => {
            w.write_all(&[TAG_IMMUTABLE_MAP])?;
            write_value_map(w, v)
        }
        Value::Function(v) => {
            w.write_all(&[TAG_FUNCTION])?;
            write_function(w, v)
        }
        Value::Builtin(v) => {
            w.write_all(&[TAG_BUILTIN])?;
            write_string(w, v.name)
        }
        Value::UserFunction(v) => {
            // Only the name survives; decode rebinds through the module
            // registry or rejects the constant.
            w.write_all(&[TAG_USER_FUNCTION])?;
            write_string(w, &v.name)
        }
        other => Err(invalid_data(format!(
            "unsupported constant type: {}",
            other.type_name()
        ))),
    }
}

fn write_value_seq<W: Write>(w: &mut W, values: &[Value]) -> io::Result<()> {
    write_u32(w, values.len() as u32)?;
    for value in values {
        write_value(w, value)?;
    }
    Ok(())
}

fn write_value_map<W: Write>(w: &mut W, entries: &HashMap<String, Value>) -> io::Result<()> {
    write_u32(w, entries.len() as u32)?;
    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();
    for key in keys {
        write_string(w, key)?;
        write_value(w, &entries[key])?;
    }
    Ok(())
}

pub fn write_function<W: Write>(w: &mut W, func: &CompiledFunction) -> io::Result<()> {
    write_u16(w, func.num_locals as u16)?;
    write_u16(w, func.num_parameters as u16)?;
    w.write_all(&[u8::from(func.variadic)])?;
    write_u32(w, func.instructions.len() as u32)?;
    w.write_all(&func.instructions)?;
    write_u32(w, func.source_map.len() as u32)?;
    let mut offsets: Vec<&usize> = func.source_map.keys().collect();
    offsets.sort();
    for offset in offsets {
        write_u32(w, *offset as u32)?;
        write_u32(w, func.source_map[offset] as u32)?;
    }
    Ok(())
}

pub fn read_value<R: Read>(r: &mut R) -> io::Result<Value> {
    let tag = read_u8_val(r)?;
    let value = match tag {
        TAG_UNDEFINED => Value::Undefined,
        TAG_BOOL => Value::Bool(read_u8_val(r)? != 0),
        TAG_INT => Value::Int(read_i64(r)?),
        TAG_FLOAT => Value::Float(read_f64(r)?),
        TAG_CHAR => {
            let v = read_u32(r)?;
            Value::Char(char::from_u32(v).ok_or_else(|| invalid_data("malformed char payload"))?)
        }
        TAG_STRING => Value::string(read_string(r)?),
        TAG_BYTES => Value::bytes(read_bytes(r)?),
        TAG_ERROR => Value::error(read_value(r)?),
        TAG_TIME => {
            let nanos = read_i64(r)?;
            Value::Time(chrono::Utc.timestamp_nanos(nanos))
        }
        TAG_ARRAY => Value::array(read_value_seq(r)?),
        TAG_IMMUTABLE_ARRAY => Value::ImmutableArray(Rc::new(read_value_seq(r)?)),
        TAG_MAP => Value::map(read_value_map(r)?),
        TAG_IMMUTABLE_MAP => Value::ImmutableMap(Rc::new(read_value_map(r)?)),
        TAG_FUNCTION => Value::Function(Rc::new(read_function(r)?)),
        TAG_BUILTIN => {
            let name = read_string(r)?;
            match builtins::get_builtin_by_name(&name) {
                Some(builtin) => Value::Builtin(builtin),
                None => return Err(invalid_data(format!("unknown builtin function '{}'", name))),
            }
        }
        TAG_USER_FUNCTION => {
            let name = read_string(r)?;
            // Placeholder; must be rebound by fix_decoded before use.
            Value::user_function(UserFunction::new(name.clone(), move |_| {
                Err(RuntimeError::host(format!(
                    "user function '{}' is not decodable",
                    name
                )))
            }))
        }
        _ => return Err(invalid_data(format!("unknown value tag {}", tag))),
    };
    Ok(value)
}

fn read_value_seq<R: Read>(r: &mut R) -> io::Result<Vec<Value>> {
    let len = read_u32(r)? as usize;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(read_value(r)?);
    }
    Ok(values)
}

fn read_value_map<R: Read>(r: &mut R) -> io::Result<HashMap<String, Value>> {
    let len = read_u32(r)? as usize;
    let mut entries = HashMap::with_capacity(len);
    for _ in 0..len {
        let key = read_string(r)?;
        entries.insert(key, read_value(r)?);
    }
    Ok(entries)
}

pub fn read_function<R: Read>(r: &mut R) -> io::Result<CompiledFunction> {
    let num_locals = read_u16(r)? as usize;
    let num_parameters = read_u16(r)? as usize;
    let variadic = read_u8_val(r)? != 0;
    let instructions_len = read_u32(r)? as usize;
    let mut instructions = vec![0u8; instructions_len];
    r.read_exact(&mut instructions)?;
    let map_len = read_u32(r)? as usize;
    let mut source_map = HashMap::with_capacity(map_len);
    for _ in 0..map_len {
        let offset = read_u32(r)? as usize;
        let pos = read_u32(r)? as usize;
        source_map.insert(offset, pos);
    }
    Ok(CompiledFunction::new(
        instructions,
        num_locals,
        num_parameters,
        variadic,
        source_map,
    ))
}

pub fn write_file_set<W: Write>(w: &mut W, file_set: &SourceFileSet) -> io::Result<()> {
    write_u32(w, file_set.files.len() as u32)?;
    for file in &file_set.files {
        write_string(w, &file.name)?;
        write_u32(w, file.size as u32)?;
        write_u32(w, file.lines.len() as u32)?;
        for line in &file.lines {
            write_u32(w, *line as u32)?;
        }
    }
    Ok(())
}

pub fn read_file_set<R: Read>(r: &mut R) -> io::Result<SourceFileSet> {
    let count = read_u32(r)? as usize;
    let mut file_set = SourceFileSet::new();
    for _ in 0..count {
        let name = read_string(r)?;
        let size = read_u32(r)? as usize;
        let line_count = read_u32(r)? as usize;
        let mut lines = Vec::with_capacity(line_count);
        for _ in 0..line_count {
            lines.push(read_u32(r)? as usize);
        }
        file_set.add_file_raw(&name, size, lines);
    }
    Ok(file_set)
}

/// Rebinds decoded host-provided values by name: builtin-module maps are
/// replaced from the registry, and a bare user function that no module can
/// supply is rejected.
pub fn fix_decoded(value: Value, modules: Option<&ModuleMap>) -> io::Result<Value> {
    match &value {
        Value::ImmutableMap(entries) => {
            if let Some(Value::String(name)) = entries.get(MODULE_NAME_ATTR) {
                let module = modules
                    .and_then(|m| m.get_builtin_module(name))
                    .ok_or_else(|| invalid_data(format!("module '{}' not found", name)))?;
                return Ok(module.as_immutable_map(name));
            }
            for entry in entries.values() {
                if matches!(entry, Value::UserFunction(_)) {
                    return Err(invalid_data("user function is not decodable"));
                }
            }
            Ok(value)
        }
        Value::UserFunction(_) => Err(invalid_data("user function is not decodable")),
        _ => Ok(value),
    }
}

/// `SourceFile` equality helper used by round-trip tests.
pub fn file_set_eq(a: &SourceFileSet, b: &SourceFileSet) -> bool {
    a.files.len() == b.files.len()
        && a.files
            .iter()
            .zip(b.files.iter())
            .all(|(x, y): (&SourceFile, &SourceFile)| {
                x.name == y.name && x.size == y.size && x.lines == y.lines
            })
}
