use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::modules::BuiltinModule;
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

pub(super) fn module() -> BuiltinModule {
    let mut attrs: HashMap<String, Value> = HashMap::new();

    attrs.insert(
        "encode".into(),
        Value::user_function(UserFunction::new("encode", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            match to_json(&args[0]) {
                Ok(json) => Ok(Value::string(json.to_string())),
                Err(message) => Ok(Value::error(Value::string(message))),
            }
        })),
    );

    attrs.insert(
        "indent".into(),
        Value::user_function(UserFunction::new("indent", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            match to_json(&args[0]) {
                Ok(json) => Ok(Value::string(
                    serde_json::to_string_pretty(&json).unwrap_or_default(),
                )),
                Err(message) => Ok(Value::error(Value::string(message))),
            }
        })),
    );

    attrs.insert(
        "decode".into(),
        Value::user_function(UserFunction::new("decode", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let text = match &args[0] {
                Value::String(s) => s.to_string(),
                Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "first",
                        expected: "string/bytes",
                        found: other.type_name(),
                    });
                }
            };
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(json) => Ok(from_json(&json)),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    BuiltinModule::new(attrs)
}

/// Script value to JSON. Bytes become a base64 string; unsupported kinds
/// (errors, functions, iterators) report their type.
fn to_json(value: &Value) -> Result<serde_json::Value, String> {
    use serde_json::Value as Json;
    let json = match value {
        Value::Undefined => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::Int(v) => Json::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v)
            .map(Json::Number)
            .ok_or_else(|| format!("unsupported float value: {}", v))?,
        Value::Char(v) => Json::String(v.to_string()),
        Value::String(v) => Json::String(v.to_string()),
        Value::Bytes(v) => Json::String(BASE64.encode(v)),
        Value::Time(v) => Json::String(v.to_rfc3339()),
        Value::Array(v) => {
            let elements: Result<Vec<_>, _> = v.borrow().iter().map(to_json).collect();
            Json::Array(elements?)
        }
        Value::ImmutableArray(v) => {
            let elements: Result<Vec<_>, _> = v.iter().map(to_json).collect();
            Json::Array(elements?)
        }
        Value::Map(v) => {
            let mut object = serde_json::Map::new();
            for (key, value) in v.borrow().iter() {
                object.insert(key.clone(), to_json(value)?);
            }
            Json::Object(object)
        }
        Value::ImmutableMap(v) => {
            let mut object = serde_json::Map::new();
            for (key, value) in v.iter() {
                object.insert(key.clone(), to_json(value)?);
            }
            Json::Object(object)
        }
        other => return Err(format!("unsupported type: {}", other.type_name())),
    };
    Ok(json)
}

fn from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match json {
        Json::Null => Value::Undefined,
        Json::Bool(v) => Value::Bool(*v),
        Json::Number(n) => match n.as_i64() {
            Some(v) => Value::Int(v),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::string(s),
        Json::Array(elements) => Value::array(elements.iter().map(from_json).collect()),
        Json::Object(object) => Value::map(
            object
                .iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}
