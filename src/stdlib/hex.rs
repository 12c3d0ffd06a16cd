use std::collections::HashMap;

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
            let data = match &args[0] {
                Value::Bytes(b) => b.to_vec(),
                Value::String(s) => s.as_bytes().to_vec(),
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "first",
                        expected: "bytes/string",
                        found: other.type_name(),
                    });
                }
            };
            Ok(Value::string(hex::encode(data)))
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
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "first",
                        expected: "string",
                        found: other.type_name(),
                    });
                }
            };
            match hex::decode(text) {
                Ok(decoded) => Ok(Value::bytes(decoded)),
                Err(e) => Ok(Value::error(Value::string(e.to_string()))),
            }
        })),
    );

    BuiltinModule::new(attrs)
}
