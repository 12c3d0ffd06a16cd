use std::collections::HashMap;

use rand::Rng;

use crate::modules::BuiltinModule;
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

pub(super) fn module() -> BuiltinModule {
    let mut attrs: HashMap<String, Value> = HashMap::new();

    attrs.insert(
        "float".into(),
        Value::user_function(UserFunction::new("float", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(Value::Float(rand::thread_rng().r#gen::<f64>()))
        })),
    );

    attrs.insert(
        "int".into(),
        Value::user_function(UserFunction::new("int", |args| {
            if !args.is_empty() {
                return Err(RuntimeError::WrongNumArguments);
            }
            Ok(Value::Int(rand::thread_rng().r#gen::<i64>()))
        })),
    );

    attrs.insert(
        "intn".into(),
        Value::user_function(UserFunction::new("intn", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let n = match &args[0] {
                Value::Int(v) => *v,
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "first",
                        expected: "int",
                        found: other.type_name(),
                    });
                }
            };
            if n <= 0 {
                return Err(RuntimeError::host("intn argument must be positive"));
            }
            Ok(Value::Int(rand::thread_rng().gen_range(0..n)))
        })),
    );

    BuiltinModule::new(attrs)
}
