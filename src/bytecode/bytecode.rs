use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::bytecode::op_code::{OpCode, format_instructions, operand_widths, read_u16};
use crate::bytecode::serialization::{
    fix_decoded, invalid_data, read_file_set, read_function, read_u16 as read_u16_le,
    read_value, write_file_set, write_function, write_u16, write_value,
};
use crate::modules::ModuleMap;
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::value::Value;
use crate::syntax::source::SourceFileSet;

pub const BYTECODE_MAGIC: &[u8; 4] = b"RILB";
pub const BYTECODE_FORMAT_VERSION: u16 = 1;

/// A compiled module: file set, top-level function, constant pool.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub file_set: SourceFileSet,
    pub main_function: Rc<CompiledFunction>,
    pub constants: Vec<Value>,
}

impl Bytecode {
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(BYTECODE_MAGIC)?;
        write_u16(w, BYTECODE_FORMAT_VERSION)?;
        write_file_set(w, &self.file_set)?;
        write_function(w, &self.main_function)?;
        crate::bytecode::serialization::write_u32(w, self.constants.len() as u32)?;
        for constant in &self.constants {
            write_value(w, constant)?;
        }
        Ok(())
    }

    /// Decodes a bytecode stream. Host-provided opaque values (builtin
    /// module maps) are rebound by name through `modules`.
    pub fn decode<R: Read>(r: &mut R, modules: Option<&ModuleMap>) -> io::Result<Bytecode> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != BYTECODE_MAGIC {
            return Err(invalid_data("not a rill bytecode file"));
        }
        let version = read_u16_le(r)?;
        if version != BYTECODE_FORMAT_VERSION {
            return Err(invalid_data(format!(
                "unsupported bytecode format version {}",
                version
            )));
        }
        let file_set = read_file_set(r)?;
        let main_function = Rc::new(read_function(r)?);
        let count = crate::bytecode::serialization::read_u32(r)? as usize;
        let mut constants = Vec::with_capacity(count);
        for _ in 0..count {
            let value = read_value(r)?;
            constants.push(fix_decoded(value, modules)?);
        }
        Ok(Bytecode {
            file_set,
            main_function,
            constants,
        })
    }

    /// Collapses structurally equal constants, keeping first occurrences,
    /// and rewrites every `Constant`/`Closure` operand accordingly. Function
    /// bodies are rewritten before comparison, so duplicates that only
    /// differed in pre-rewrite pool indices still merge. Error constants
    /// never merge; their equality is identity.
    pub fn remove_duplicates(&mut self) {
        let old = std::mem::take(&mut self.constants);
        let mut index_map = vec![0usize; old.len()];
        let mut kept: Vec<Value> = Vec::with_capacity(old.len());

        for (i, constant) in old.into_iter().enumerate() {
            let candidate = match constant {
                Value::Function(func) => {
                    let mut rewritten = (*func).clone();
                    rewrite_constant_operands(&mut rewritten.instructions, &index_map);
                    Value::Function(Rc::new(rewritten))
                }
                other => other,
            };
            let existing = match candidate {
                Value::Error(_) => None,
                ref c => kept.iter().position(|k| k == c),
            };
            match existing {
                Some(idx) => index_map[i] = idx,
                None => {
                    kept.push(candidate);
                    index_map[i] = kept.len() - 1;
                }
            }
        }

        let mut main = (*self.main_function).clone();
        rewrite_constant_operands(&mut main.instructions, &index_map);
        self.main_function = Rc::new(main);
        self.constants = kept;
    }

    /// Recursive count of value leaves across the constant pool; the engine
    /// checks this against its constant-object ceiling.
    pub fn count_objects(&self) -> usize {
        self.constants.iter().map(Value::count_objects).sum()
    }

    pub fn format_instructions(&self) -> Vec<String> {
        format_instructions(&self.main_function.instructions)
    }

    pub fn format_constants(&self) -> Vec<String> {
        self.constants
            .iter()
            .enumerate()
            .map(|(i, constant)| match constant {
                Value::Function(func) => format!(
                    "[{}] (compiled function|{} params|{} locals)",
                    i, func.num_parameters, func.num_locals
                ),
                other => format!("[{}] {}", i, other),
            })
            .collect()
    }
}

/// Rewrites the constant-pool operand of every `Constant` and `Closure`
/// instruction in place. Operand widths are fixed, so the stream length
/// never changes.
fn rewrite_constant_operands(instructions: &mut [u8], index_map: &[usize]) {
    let mut i = 0;
    while i < instructions.len() {
        let op = OpCode::from(instructions[i]);
        if matches!(op, OpCode::OpConstant | OpCode::OpClosure) {
            let old_idx = read_u16(instructions, i + 1);
            if let Some(new_idx) = index_map.get(old_idx) {
                instructions[i + 1] = (*new_idx >> 8) as u8;
                instructions[i + 2] = *new_idx as u8;
            }
        }
        i += 1 + operand_widths(op).iter().sum::<usize>();
    }
}
