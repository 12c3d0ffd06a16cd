use std::cell::RefCell;
use std::rc::Rc;

use crate::bytecode::op_code::{OpCode, operand_widths, read_u8, read_u16};
use crate::runtime::closure::Closure;
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::iterator::ValueIterator;
use crate::runtime::ops;
use crate::runtime::value::Value;
use crate::syntax::token::Token;

use super::{Flow, VM};

impl VM {
    /// Executes the instruction at `ip`. The frame's instruction pointer is
    /// advanced past the operands up front; jump, call and return overrule
    /// it.
    pub(crate) fn execute_op(
        &mut self,
        func: &Rc<CompiledFunction>,
        ip: usize,
    ) -> Result<Flow, RuntimeError> {
        let instructions = &func.instructions;
        let op = OpCode::from(instructions[ip]);
        let next_ip = ip + 1 + operand_widths(op).iter().sum::<usize>();
        self.frame_mut().ip = next_ip;

        match op {
            OpCode::OpConstant => {
                let idx = read_u16(instructions, ip + 1);
                let constant = self
                    .constants
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| RuntimeError::host("invalid constant index"))?;
                self.push(constant)?;
            }
            OpCode::OpPop => {
                self.pop();
            }
            OpCode::OpDup => {
                let top = self.stack[self.sp - 1].clone();
                self.push(top)?;
            }
            OpCode::OpTrue => self.push(Value::Bool(true))?,
            OpCode::OpFalse => self.push(Value::Bool(false))?,
            OpCode::OpNull => self.push(Value::Undefined)?,
            OpCode::OpBinaryOp => {
                let tok = Token::from_op(read_u8(instructions, ip + 1) as u8)
                    .ok_or_else(|| RuntimeError::host("invalid binary operator"))?;
                let rhs = self.pop();
                let lhs = self.pop();
                let result = ops::binary_op(&lhs, tok, &rhs)?;
                self.count_alloc()?;
                self.push(result)?;
            }
            OpCode::OpEqual => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.push(Value::Bool(lhs == rhs))?;
            }
            OpCode::OpNotEqual => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.push(Value::Bool(lhs != rhs))?;
            }
            OpCode::OpMinus => {
                let operand = self.pop();
                self.push(ops::unary_minus(&operand)?)?;
            }
            OpCode::OpLNot => {
                let operand = self.pop();
                self.push(Value::Bool(operand.is_falsy()))?;
            }
            OpCode::OpJump => {
                self.frame_mut().ip = read_u16(instructions, ip + 1);
            }
            OpCode::OpJumpFalsy => {
                let target = read_u16(instructions, ip + 1);
                let cond = self.pop();
                if cond.is_falsy() {
                    self.frame_mut().ip = target;
                }
            }
            OpCode::OpAndJump => {
                // Falsy left operand short-circuits and stays as the result;
                // otherwise it is discarded for the right operand.
                let target = read_u16(instructions, ip + 1);
                if self.stack[self.sp - 1].is_falsy() {
                    self.frame_mut().ip = target;
                } else {
                    self.pop();
                }
            }
            OpCode::OpOrJump => {
                let target = read_u16(instructions, ip + 1);
                if self.stack[self.sp - 1].is_falsy() {
                    self.pop();
                } else {
                    self.frame_mut().ip = target;
                }
            }
            OpCode::OpSuspend => return Ok(Flow::Suspend),
            OpCode::OpGetGlobal => {
                let idx = read_u16(instructions, ip + 1);
                let value = self.globals[idx].clone();
                self.push(value)?;
            }
            OpCode::OpSetGlobal => {
                let idx = read_u16(instructions, ip + 1);
                self.globals[idx] = self.pop();
            }
            OpCode::OpGetLocal => {
                let idx = read_u8(instructions, ip + 1);
                let slot = self.frame().base_pointer + idx;
                let value = match &self.stack[slot] {
                    Value::Cell(cell) => cell.borrow().clone(),
                    other => other.clone(),
                };
                self.push(value)?;
            }
            OpCode::OpSetLocal => {
                let idx = read_u8(instructions, ip + 1);
                let slot = self.frame().base_pointer + idx;
                let value = self.pop();
                // Write through a captured slot's cell so closures observe
                // the update.
                match &self.stack[slot] {
                    Value::Cell(cell) => *cell.borrow_mut() = value,
                    _ => self.stack[slot] = value,
                }
            }
            OpCode::OpDefineLocal => {
                // A fresh binding: replaces the slot outright, so a loop
                // iteration gets a new cell rather than mutating captures
                // from the previous pass.
                let idx = read_u8(instructions, ip + 1);
                let slot = self.frame().base_pointer + idx;
                let value = self.pop();
                self.stack[slot] = value;
            }
            OpCode::OpGetFree => {
                let idx = read_u8(instructions, ip + 1);
                let value = self.frame().closure.free[idx].borrow().clone();
                self.push(value)?;
            }
            OpCode::OpSetFree => {
                let idx = read_u8(instructions, ip + 1);
                let value = self.pop();
                *self.frame().closure.free[idx].borrow_mut() = value;
            }
            OpCode::OpGetLocalPtr => {
                let idx = read_u8(instructions, ip + 1);
                let slot = self.frame().base_pointer + idx;
                let cell = match &self.stack[slot] {
                    Value::Cell(cell) => cell.clone(),
                    _ => {
                        let current =
                            std::mem::replace(&mut self.stack[slot], Value::Undefined);
                        let cell = Rc::new(RefCell::new(current));
                        self.stack[slot] = Value::Cell(cell.clone());
                        cell
                    }
                };
                self.push(Value::Cell(cell))?;
            }
            OpCode::OpGetFreePtr => {
                let idx = read_u8(instructions, ip + 1);
                let cell = self.frame().closure.free[idx].clone();
                self.push(Value::Cell(cell))?;
            }
            OpCode::OpGetBuiltin => {
                let idx = read_u8(instructions, ip + 1);
                let builtin = crate::runtime::builtins::BUILTINS
                    .get(idx)
                    .copied()
                    .ok_or_else(|| RuntimeError::host("invalid builtin index"))?;
                self.push(Value::Builtin(builtin))?;
            }
            OpCode::OpArray => {
                let n = read_u16(instructions, ip + 1);
                let mut elements = Vec::with_capacity(n);
                for i in self.sp - n..self.sp {
                    elements.push(std::mem::replace(&mut self.stack[i], Value::Undefined));
                }
                self.sp -= n;
                self.count_alloc()?;
                self.push(Value::array(elements))?;
            }
            OpCode::OpMap => {
                let n = read_u16(instructions, ip + 1);
                let mut entries = std::collections::HashMap::with_capacity(n / 2);
                let mut i = self.sp - n;
                while i < self.sp {
                    let key = std::mem::replace(&mut self.stack[i], Value::Undefined);
                    let value = std::mem::replace(&mut self.stack[i + 1], Value::Undefined);
                    let Value::String(key) = key else {
                        return Err(RuntimeError::host(format!(
                            "invalid map key type: {}",
                            key.type_name()
                        )));
                    };
                    entries.insert(key.to_string(), value);
                    i += 2;
                }
                self.sp -= n;
                self.count_alloc()?;
                self.push(Value::map(entries))?;
            }
            OpCode::OpIndex => {
                let index = self.pop();
                let value = self.pop();
                let result = ops::index_get(&value, &index)?;
                self.push(result)?;
            }
            OpCode::OpSliceIndex => {
                let high = self.pop();
                let low = self.pop();
                let value = self.pop();
                let result = ops::slice(&value, &low, &high)?;
                self.count_alloc()?;
                self.push(result)?;
            }
            OpCode::OpSetSelGlobal => {
                let idx = read_u16(instructions, ip + 1);
                let num_sel = read_u8(instructions, ip + 3);
                let base = self.globals[idx].clone();
                self.store_selector(base, num_sel)?;
            }
            OpCode::OpSetSelLocal => {
                let idx = read_u8(instructions, ip + 1);
                let slot = self.frame().base_pointer + idx;
                let num_sel = read_u8(instructions, ip + 2);
                let base = match &self.stack[slot] {
                    Value::Cell(cell) => cell.borrow().clone(),
                    other => other.clone(),
                };
                self.store_selector(base, num_sel)?;
            }
            OpCode::OpSetSelFree => {
                let idx = read_u8(instructions, ip + 1);
                let num_sel = read_u8(instructions, ip + 2);
                let base = self.frame().closure.free[idx].borrow().clone();
                self.store_selector(base, num_sel)?;
            }
            OpCode::OpClosure => {
                let const_idx = read_u16(instructions, ip + 1);
                let num_free = read_u8(instructions, ip + 3);
                let function = match self.constants.get(const_idx) {
                    Some(Value::Function(func)) => func.clone(),
                    _ => return Err(RuntimeError::host("invalid closure constant")),
                };
                let mut free = Vec::with_capacity(num_free);
                for _ in 0..num_free {
                    match self.pop() {
                        Value::Cell(cell) => free.push(cell),
                        _ => return Err(RuntimeError::host("closure capture is not a cell")),
                    }
                }
                free.reverse();
                self.count_alloc()?;
                self.push(Value::Closure(Rc::new(Closure::new(function, free))))?;
            }
            OpCode::OpCall => {
                let num_args = read_u8(instructions, ip + 1);
                let spread = read_u8(instructions, ip + 2) == 1;
                self.exec_call(num_args, spread)?;
            }
            OpCode::OpReturn => {
                let has_value = read_u8(instructions, ip + 1) == 1;
                let result = if has_value { self.pop() } else { Value::Undefined };
                if self.frames.len() < 2 || self.frame().base_pointer == 0 {
                    return Err(RuntimeError::host("return outside function"));
                }
                let frame = self.frames.pop().expect("return without frame");
                // Discard locals and the callee slot below the base pointer.
                for i in frame.base_pointer - 1..self.sp {
                    self.stack[i] = Value::Undefined;
                }
                self.sp = frame.base_pointer - 1;
                self.push(result)?;
            }
            OpCode::OpImmutable => {
                let value = self.pop();
                self.push(value.make_immutable())?;
            }
            OpCode::OpIteratorInit => {
                let value = self.pop();
                let iterator = ValueIterator::init(&value)?;
                self.count_alloc()?;
                self.push(Value::Iterator(Rc::new(RefCell::new(iterator))))?;
            }
            OpCode::OpIteratorNext => {
                let iterator = self.pop_iterator()?;
                let has_more = iterator.borrow_mut().next();
                self.push(Value::Bool(has_more))?;
            }
            OpCode::OpIteratorKey => {
                let iterator = self.pop_iterator()?;
                let key = iterator.borrow().key();
                self.push(key)?;
            }
            OpCode::OpIteratorValue => {
                let iterator = self.pop_iterator()?;
                let value = iterator.borrow().value();
                self.push(value)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn pop_iterator(&mut self) -> Result<Rc<RefCell<ValueIterator>>, RuntimeError> {
        match self.pop() {
            Value::Iterator(iterator) => Ok(iterator),
            other => Err(RuntimeError::NotIterable(other.type_name())),
        }
    }

    /// Pops `num_sel` selectors and the value below them, then walks the
    /// selector chain from `base` and stores into the last link.
    fn store_selector(&mut self, base: Value, num_sel: usize) -> Result<(), RuntimeError> {
        if num_sel == 0 {
            return Err(RuntimeError::host("invalid selector count"));
        }
        let mut selectors = Vec::with_capacity(num_sel);
        for _ in 0..num_sel {
            selectors.push(self.pop());
        }
        selectors.reverse();
        let value = self.pop();

        let mut dest = base;
        for selector in &selectors[..num_sel - 1] {
            dest = ops::index_get(&dest, selector)?;
        }
        ops::index_set(&dest, &selectors[num_sel - 1], value)
    }
}
