//! Host-provided builtin modules. Each module is a table of constants and
//! named callables consumed through `import`.

use crate::modules::ModuleMap;

mod base64;
mod func_helpers;
mod hex;
mod json;
mod math;
mod os;
mod rand;
mod text;
mod text_regexp;
mod times;

pub fn all_module_names() -> Vec<&'static str> {
    vec!["math", "os", "text", "json", "times", "base64", "hex", "rand"]
}

/// Builds a module map containing the named stdlib modules; unknown names
/// are ignored.
pub fn get_module_map(names: &[&str]) -> ModuleMap {
    let mut map = ModuleMap::new();
    for name in names {
        match *name {
            "math" => map.add_builtin_module("math", math::module()),
            "os" => map.add_builtin_module("os", os::module()),
            "text" => map.add_builtin_module("text", text::module()),
            "json" => map.add_builtin_module("json", json::module()),
            "times" => map.add_builtin_module("times", times::module()),
            "base64" => map.add_builtin_module("base64", base64::module()),
            "hex" => map.add_builtin_module("hex", hex::module()),
            "rand" => map.add_builtin_module("rand", rand::module()),
            _ => {}
        }
    }
    map
}

/// The full stdlib, which is what the CLI runs scripts with.
pub fn stdlib_module_map() -> ModuleMap {
    get_module_map(&all_module_names())
}
