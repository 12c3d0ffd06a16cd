use std::rc::Rc;

use crate::runtime::closure::Closure;

/// Per-call execution record. The base pointer marks the first argument
/// slot on the value stack; locals live directly above it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }
}
