use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

use crate::modules::BuiltinModule;
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

fn arg_bytes(args: &[Value]) -> Result<Vec<u8>, RuntimeError> {
    if args.len() != 1 {
        return Err(RuntimeError::WrongNumArguments);
    }
    match &args[0] {
        Value::Bytes(b) => Ok(b.to_vec()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(RuntimeError::InvalidArgumentType {
            name: "first",
            expected: "bytes/string",
            found: other.type_name(),
        }),
    }
}

fn encoder(name: &'static str, engine: &'static impl base64::Engine) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        let data = arg_bytes(args)?;
        Ok(Value::string(engine.encode(data)))
    }))
}

fn decoder(name: &'static str, engine: &'static impl base64::Engine) -> Value {
    Value::user_function(UserFunction::new(name, move |args| {
        let data = arg_bytes(args)?;
        match engine.decode(data) {
            Ok(decoded) => Ok(Value::bytes(decoded)),
            Err(e) => Ok(Value::error(Value::string(e.to_string()))),
        }
    }))
}

pub(super) fn module() -> BuiltinModule {
    let mut attrs: HashMap<String, Value> = HashMap::new();
    attrs.insert("encode".into(), encoder("encode", &STANDARD));
    attrs.insert("decode".into(), decoder("decode", &STANDARD));
    attrs.insert("url_encode".into(), encoder("url_encode", &URL_SAFE));
    attrs.insert("url_decode".into(), decoder("url_decode", &URL_SAFE));
    BuiltinModule::new(attrs)
}
