use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::runtime::value::Value;

/// Host-facing variable scope. Cloning shares the underlying table; reads
/// take the shared lock, writes the exclusive one, which serialises
/// successive compile-and-run cycles over the same scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: Arc<RwLock<HashMap<String, Value>>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.variables.write().expect("scope lock").clear();
    }

    pub fn len(&self) -> usize {
        self.variables.read().expect("scope lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.read().expect("scope lock").contains_key(name)
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.variables
            .write()
            .expect("scope lock")
            .insert(name.into(), value);
    }

    /// Missing names read as `undefined`.
    pub fn get(&self, name: &str) -> Value {
        self.variables
            .read()
            .expect("scope lock")
            .get(name)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.variables
            .write()
            .expect("scope lock")
            .remove(name)
            .is_some()
    }

    pub fn get_all(&self) -> Vec<(String, Value)> {
        self.variables
            .read()
            .expect("scope lock")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn get_all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .variables
            .read()
            .expect("scope lock")
            .keys()
            .cloned()
            .collect();
        // Deterministic global slot assignment across compiles.
        names.sort();
        names
    }
}
