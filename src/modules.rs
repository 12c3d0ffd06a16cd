use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::value::Value;

/// Key under which a builtin module's immutable map carries its own name,
/// so decoded bytecode can rebind the host callables it cannot serialise.
pub const MODULE_NAME_ATTR: &str = "__module_name__";

/// A host-defined module: a table of named attribute values (constants and
/// host callables).
#[derive(Debug, Clone, Default)]
pub struct BuiltinModule {
    pub attrs: HashMap<String, Value>,
}

impl BuiltinModule {
    pub fn new(attrs: HashMap<String, Value>) -> Self {
        Self { attrs }
    }

    /// The constant the compiler emits for an import of this module.
    pub fn as_immutable_map(&self, name: &str) -> Value {
        let mut attrs = self.attrs.clone();
        attrs.insert(MODULE_NAME_ATTR.to_string(), Value::string(name));
        Value::ImmutableMap(Rc::new(attrs))
    }
}

#[derive(Debug, Clone)]
pub enum Importable {
    Builtin(BuiltinModule),
    /// Script source compiled fresh at each importing compilation.
    Source(Vec<u8>),
}

/// Name-indexed registry of importable modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    store: HashMap<String, Importable>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_builtin_module(&mut self, name: impl Into<String>, module: BuiltinModule) {
        self.store.insert(name.into(), Importable::Builtin(module));
    }

    pub fn add_source_module(&mut self, name: impl Into<String>, src: impl Into<Vec<u8>>) {
        self.store.insert(name.into(), Importable::Source(src.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Importable> {
        self.store.get(name)
    }

    pub fn get_builtin_module(&self, name: &str) -> Option<&BuiltinModule> {
        match self.store.get(name) {
            Some(Importable::Builtin(module)) => Some(module),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.store.keys().cloned().collect()
    }
}
