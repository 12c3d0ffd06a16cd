use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::value::Value;

/// A compiled function bundled with its captured upvalue cells.
///
/// Each cell is shared with the frame that defined the variable, so mutation
/// on either side is visible to the other. Cells hold values, never closures'
/// environments, which keeps the reference graph acyclic.
#[derive(Debug, Clone)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Rc<RefCell<Value>>>,
}

impl Closure {
    pub fn new(function: Rc<CompiledFunction>, free: Vec<Rc<RefCell<Value>>>) -> Self {
        Self { function, free }
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
