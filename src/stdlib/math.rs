use std::collections::HashMap;

use crate::modules::BuiltinModule;
use crate::runtime::builtin_function::UserFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

use super::func_helpers::{arg_float, arg_int, func_affrf, func_afrb, func_afrf};

pub(super) fn module() -> BuiltinModule {
    let mut attrs: HashMap<String, Value> = HashMap::new();

    attrs.insert("e".into(), Value::Float(std::f64::consts::E));
    attrs.insert("pi".into(), Value::Float(std::f64::consts::PI));
    attrs.insert("phi".into(), Value::Float(1.618_033_988_749_895));
    attrs.insert("ln2".into(), Value::Float(std::f64::consts::LN_2));
    attrs.insert("ln10".into(), Value::Float(std::f64::consts::LN_10));
    attrs.insert("sqrt2".into(), Value::Float(std::f64::consts::SQRT_2));
    attrs.insert("inf".into(), Value::Float(f64::INFINITY));
    attrs.insert("neg_inf".into(), Value::Float(f64::NEG_INFINITY));
    attrs.insert("nan".into(), Value::Float(f64::NAN));
    attrs.insert("max_float".into(), Value::Float(f64::MAX));
    attrs.insert("smallest_float".into(), Value::Float(f64::MIN_POSITIVE));
    attrs.insert("max_int".into(), Value::Int(i64::MAX));
    attrs.insert("min_int".into(), Value::Int(i64::MIN));

    attrs.insert("abs".into(), func_afrf("abs", f64::abs));
    attrs.insert("ceil".into(), func_afrf("ceil", f64::ceil));
    attrs.insert("floor".into(), func_afrf("floor", f64::floor));
    attrs.insert("round".into(), func_afrf("round", f64::round));
    attrs.insert("trunc".into(), func_afrf("trunc", f64::trunc));
    attrs.insert("sqrt".into(), func_afrf("sqrt", f64::sqrt));
    attrs.insert("cbrt".into(), func_afrf("cbrt", f64::cbrt));
    attrs.insert("exp".into(), func_afrf("exp", f64::exp));
    attrs.insert("exp2".into(), func_afrf("exp2", f64::exp2));
    attrs.insert("log".into(), func_afrf("log", f64::ln));
    attrs.insert("log2".into(), func_afrf("log2", f64::log2));
    attrs.insert("log10".into(), func_afrf("log10", f64::log10));
    attrs.insert("sin".into(), func_afrf("sin", f64::sin));
    attrs.insert("cos".into(), func_afrf("cos", f64::cos));
    attrs.insert("tan".into(), func_afrf("tan", f64::tan));
    attrs.insert("asin".into(), func_afrf("asin", f64::asin));
    attrs.insert("acos".into(), func_afrf("acos", f64::acos));
    attrs.insert("atan".into(), func_afrf("atan", f64::atan));
    attrs.insert("sinh".into(), func_afrf("sinh", f64::sinh));
    attrs.insert("cosh".into(), func_afrf("cosh", f64::cosh));
    attrs.insert("tanh".into(), func_afrf("tanh", f64::tanh));
    attrs.insert("asinh".into(), func_afrf("asinh", f64::asinh));
    attrs.insert("acosh".into(), func_afrf("acosh", f64::acosh));
    attrs.insert("atanh".into(), func_afrf("atanh", f64::atanh));

    attrs.insert("pow".into(), func_affrf("pow", f64::powf));
    attrs.insert("atan2".into(), func_affrf("atan2", f64::atan2));
    attrs.insert("hypot".into(), func_affrf("hypot", f64::hypot));
    attrs.insert("min".into(), func_affrf("min", f64::min));
    attrs.insert("max".into(), func_affrf("max", f64::max));
    attrs.insert("mod".into(), func_affrf("mod", |a, b| a % b));
    attrs.insert("copysign".into(), func_affrf("copysign", f64::copysign));
    attrs.insert("dim".into(), func_affrf("dim", |x, y| (x - y).max(0.0)));
    attrs.insert(
        "nextafter".into(),
        func_affrf("nextafter", |x, y| {
            if x == y || x.is_nan() || y.is_nan() {
                y
            } else if y > x {
                x.next_up()
            } else {
                x.next_down()
            }
        }),
    );
    attrs.insert(
        "remainder".into(),
        func_affrf("remainder", |x, y| x - y * (x / y).round_ties_even()),
    );

    attrs.insert(
        "ldexp".into(),
        Value::user_function(UserFunction::new("ldexp", |args| {
            if args.len() != 2 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let frac = arg_float(args, 0, "first")?;
            let exp = arg_int(args, 1, "second")?;
            let exp = i32::try_from(exp).unwrap_or(if exp > 0 { i32::MAX } else { i32::MIN });
            Ok(Value::Float(frac * 2f64.powi(exp)))
        })),
    );
    attrs.insert(
        "logb".into(),
        func_afrf("logb", |x| x.abs().log2().floor()),
    );
    attrs.insert(
        "ilogb".into(),
        Value::user_function(UserFunction::new("ilogb", |args| {
            if args.len() != 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let x = arg_float(args, 0, "first")?;
            Ok(Value::Int(x.abs().log2().floor() as i64))
        })),
    );

    attrs.insert("is_nan".into(), func_afrb("is_nan", f64::is_nan));
    attrs.insert("is_inf".into(), func_afrb("is_inf", f64::is_infinite));
    attrs.insert("signbit".into(), func_afrb("signbit", f64::is_sign_negative));

    BuiltinModule::new(attrs)
}
