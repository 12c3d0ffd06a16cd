use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

/// `format(fmt, args...)` with a compact verb set: `%v` `%s` `%d` `%f`
/// `%t` `%c` `%q` `%x` `%%`.
pub(super) fn builtin_format(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.is_empty() {
        return Err(RuntimeError::WrongNumArguments);
    }
    let fmt = match &args[0] {
        Value::String(s) => s,
        other => {
            return Err(RuntimeError::InvalidArgumentType {
                name: "format",
                expected: "string",
                found: other.type_name(),
            });
        }
    };
    let formatted = format_string(fmt, &args[1..])?;
    if formatted.len() > crate::runtime::MAX_STRING_LEN {
        return Err(RuntimeError::StringLimit);
    }
    Ok(Value::string(formatted))
}

pub fn format_string(fmt: &str, args: &[Value]) -> Result<String, RuntimeError> {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(next_arg) else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        next_arg += 1;
        match verb {
            'v' | 's' => out.push_str(&arg.plain_string()),
            'd' => match arg.to_i64() {
                Some(v) => out.push_str(&v.to_string()),
                None => out.push_str(&format!("%!d({})", arg.type_name())),
            },
            'f' => match arg.to_f64() {
                Some(v) => out.push_str(&format!("{:.6}", v)),
                None => out.push_str(&format!("%!f({})", arg.type_name())),
            },
            't' => out.push_str(if arg.is_falsy() { "false" } else { "true" }),
            'c' => match arg.to_char() {
                Some(v) => out.push(v),
                None => out.push_str(&format!("%!c({})", arg.type_name())),
            },
            'q' => out.push_str(&format!("{:?}", arg.plain_string())),
            'x' => match arg {
                Value::Int(v) => out.push_str(&format!("{:x}", v)),
                Value::Bytes(v) => out.push_str(&hex::encode(v.as_ref())),
                Value::String(v) => out.push_str(&hex::encode(v.as_bytes())),
                other => out.push_str(&format!("%!x({})", other.type_name())),
            },
            other => out.push_str(&format!("%!{}(BADVERB)", other)),
        }
    }
    Ok(out)
}
