use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bytecode::bytecode::Bytecode;
use crate::runtime::closure::Closure;
use crate::runtime::errors::RuntimeError;
use crate::runtime::frame::Frame;
use crate::runtime::value::Value;
use crate::syntax::source::{FilePos, Pos, SourceFileSet};

mod dispatch;
mod function_call;

pub const STACK_SIZE: usize = 2048;
// Covers the full 16-bit operand space, so a global index can never land
// outside the array.
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

/// The abort flag is polled once per this many dispatched instructions, so
/// cancellation lands on an instruction boundary shortly after it is raised.
pub const ABORT_CHECK_INTERVAL: u64 = 1024;

/// Cooperative cancellation handle. Clone it, hand it to a controller, and
/// trigger it from anywhere; the VM observes it between instructions.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A runtime error annotated with the source position of the faulting
/// instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct VmError {
    pub error: RuntimeError,
    pub file_pos: Option<FilePos>,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_pos {
            Some(pos) => write!(f, "Runtime Error: {}\n\tat {}", self.error, pos),
            None => write!(f, "Runtime Error: {}", self.error),
        }
    }
}

impl std::error::Error for VmError {}

pub(crate) enum Flow {
    Normal,
    Suspend,
}

/// The stack virtual machine. Single-threaded; a faulted instance must not
/// be reused, though its globals can be recovered.
pub struct VM {
    pub(crate) constants: Vec<Value>,
    pub(crate) file_set: SourceFileSet,
    pub(crate) globals: Vec<Value>,
    pub(crate) stack: Vec<Value>,
    pub(crate) sp: usize,
    pub(crate) frames: Vec<Frame>,
    max_allocs: i64,
    allocs: i64,
    ticks: u64,
    abort: AbortSignal,
}

impl VM {
    /// `max_allocs < 0` disables the allocation ceiling.
    pub fn new(bytecode: Bytecode, globals: Vec<Value>, max_allocs: i64) -> Self {
        let mut globals = globals;
        if globals.len() < GLOBALS_SIZE {
            globals.resize(GLOBALS_SIZE, Value::Undefined);
        }
        let main_closure = Rc::new(Closure::new(bytecode.main_function.clone(), vec![]));
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_closure, 0));
        Self {
            constants: bytecode.constants,
            file_set: bytecode.file_set,
            globals,
            stack: vec![Value::Undefined; STACK_SIZE],
            sp: 0,
            frames,
            max_allocs,
            allocs: 0,
            ticks: 0,
            abort: AbortSignal::new(),
        }
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Shares an externally owned abort flag, so a controller can cancel
    /// the run from another thread.
    pub fn set_abort_signal(&mut self, signal: AbortSignal) {
        self.abort = signal;
    }

    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    pub fn run(&mut self) -> Result<(), VmError> {
        match self.run_loop() {
            Ok(()) => Ok(()),
            Err((error, pos)) => {
                let file_pos = pos
                    .map(|p| self.file_set.position(p))
                    .filter(|fp| fp.line > 0);
                Err(VmError { error, file_pos })
            }
        }
    }

    fn run_loop(&mut self) -> Result<(), (RuntimeError, Option<Pos>)> {
        loop {
            let frame = self.frames.last().expect("frame stack empty");
            let func = frame.closure.function.clone();
            let ip = frame.ip;
            if ip >= func.instructions.len() {
                // Functions always end in Return and main in Suspend; an
                // instruction stream running off its end is a clean stop.
                return Ok(());
            }

            self.ticks += 1;
            if self.ticks % ABORT_CHECK_INTERVAL == 0 && self.abort.is_set() {
                return Err((RuntimeError::Aborted, source_pos(&func, ip)));
            }

            match self.execute_op(&func, ip) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Suspend) => return Ok(()),
                Err(error) => return Err((error, source_pos(&func, ip))),
            }
        }
    }

    pub(crate) fn frame(&self) -> &Frame {
        self.frames.last().expect("frame stack empty")
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack empty")
    }

    pub(crate) fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Value {
        debug_assert!(self.sp > 0, "stack underflow");
        self.sp -= 1;
        std::mem::replace(&mut self.stack[self.sp], Value::Undefined)
    }

    pub(crate) fn count_alloc(&mut self) -> Result<(), RuntimeError> {
        if self.max_allocs >= 0 {
            self.allocs += 1;
            if self.allocs > self.max_allocs {
                return Err(RuntimeError::AllocLimit);
            }
        }
        Ok(())
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.abort.is_set()
    }
}

fn source_pos(func: &crate::runtime::compiled_function::CompiledFunction, ip: usize) -> Option<Pos> {
    let pos = func.source_pos(ip);
    if pos == crate::syntax::source::NO_POS {
        None
    } else {
        Some(pos)
    }
}
