use std::fmt;
use std::rc::Rc;

use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, RuntimeError>;

/// A host function registered in the process-wide builtin table.
#[derive(Clone, Copy)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFunction({})", self.name)
    }
}

impl PartialEq for BuiltinFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

pub type UserFn = Rc<dyn Fn(&[Value]) -> Result<Value, RuntimeError>>;

/// A named host callable carried as a value, typically a stdlib module
/// attribute or a function injected by the embedding host.
#[derive(Clone)]
pub struct UserFunction {
    pub name: String,
    pub func: UserFn,
}

impl UserFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserFunction({})", self.name)
    }
}

impl PartialEq for UserFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}
