use std::rc::Rc;

use crate::runtime::closure::Closure;
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::errors::RuntimeError;
use crate::runtime::frame::Frame;
use crate::runtime::value::Value;

use super::{MAX_FRAMES, STACK_SIZE, VM};

impl VM {
    /// `Call` dispatch: the callee sits `num_args` below the stack top.
    /// With the spread flag set, the final argument must be an array and is
    /// flattened onto the stack first.
    pub(crate) fn exec_call(&mut self, num_args: usize, spread: bool) -> Result<(), RuntimeError> {
        let mut num_args = num_args;
        if spread {
            if num_args == 0 {
                return Err(RuntimeError::host("spread call without arguments"));
            }
            let elements = match self.pop() {
                Value::Array(items) => items.borrow().clone(),
                Value::ImmutableArray(items) => items.as_ref().clone(),
                other => {
                    return Err(RuntimeError::InvalidArgumentType {
                        name: "last",
                        expected: "array",
                        found: other.type_name(),
                    });
                }
            };
            num_args = num_args - 1 + elements.len();
            for element in elements {
                self.push(element)?;
            }
        }

        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Value::Closure(closure) => {
                self.call_compiled(closure.function.clone(), Some(closure), num_args)
            }
            Value::Function(function) => self.call_compiled(function, None, num_args),
            Value::Builtin(builtin) => self.call_host(num_args, |args| (builtin.func)(args)),
            Value::UserFunction(user) => self.call_host(num_args, |args| (user.func)(args)),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_compiled(
        &mut self,
        function: Rc<CompiledFunction>,
        closure: Option<Rc<Closure>>,
        num_args: usize,
    ) -> Result<(), RuntimeError> {
        let mut num_args = num_args;

        if function.variadic {
            // Collect the argument tail into one array parameter.
            let fixed = function.num_parameters - 1;
            if num_args >= fixed {
                let var_count = num_args - fixed;
                let mut tail = Vec::with_capacity(var_count);
                for i in self.sp - var_count..self.sp {
                    tail.push(std::mem::replace(&mut self.stack[i], Value::Undefined));
                }
                self.sp -= var_count;
                self.push(Value::array(tail))?;
                num_args = fixed + 1;
            }
        }

        if num_args != function.num_parameters {
            let want = if function.variadic {
                format!(">={}", function.num_parameters - 1)
            } else {
                function.num_parameters.to_string()
            };
            return Err(RuntimeError::WrongArity {
                want,
                got: num_args,
            });
        }

        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }
        let base_pointer = self.sp - num_args;
        let new_sp = base_pointer + function.num_locals;
        if new_sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        // Reserve local slots; stale stack contents (in particular old
        // cells) must not leak into the fresh frame.
        for i in self.sp..new_sp {
            self.stack[i] = Value::Undefined;
        }
        self.sp = new_sp;

        let closure = closure.unwrap_or_else(|| Rc::new(Closure::new(function, vec![])));
        self.frames.push(Frame::new(closure, base_pointer));
        Ok(())
    }

    fn call_host(
        &mut self,
        num_args: usize,
        func: impl FnOnce(&[Value]) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        if self.is_aborted() {
            return Err(RuntimeError::Aborted);
        }
        let mut args = Vec::with_capacity(num_args);
        for i in self.sp - num_args..self.sp {
            args.push(std::mem::replace(&mut self.stack[i], Value::Undefined));
        }
        self.sp -= num_args;
        self.pop(); // callee

        // A host error faults the run; an Error value returned as a result
        // is pushed like any other value.
        let result = func(&args)?;
        self.push(result)
    }
}
