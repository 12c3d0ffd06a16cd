use std::io::Write;

use crate::bytecode::compiler::Compiler;
use crate::bytecode::op_code::{Instructions, OpCode, make, operand_widths};
use crate::bytecode::symbol::Symbol;
use crate::bytecode::symbol_scope::SymbolScope;
use crate::runtime::value::Value;
use crate::syntax::source::Pos;

impl Compiler {
    pub(crate) fn emit(&mut self, pos: Pos, op: OpCode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let scope = &mut self.scopes[self.scope_index];
        let emit_pos = scope.instructions.len();
        scope.instructions.extend_from_slice(&instruction);
        if pos != crate::syntax::source::NO_POS {
            scope.source_map.insert(emit_pos, pos);
        }
        self.trace_instruction(emit_pos, op, operands);
        emit_pos
    }

    fn trace_instruction(&mut self, position: usize, op: OpCode, operands: &[usize]) {
        if let Some(trace) = self.trace.as_mut() {
            let operands = operands
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(trace, "{:04} {:<8} {}", position, op.mnemonic(), operands);
        }
    }

    pub(crate) fn current_instructions(&self) -> &Instructions {
        &self.scopes[self.scope_index].instructions
    }

    pub(crate) fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Rewrites the operand of a previously emitted jump to `operand`.
    pub(crate) fn change_operand(&mut self, op_pos: usize, operand: usize) {
        let instructions = &mut self.scopes[self.scope_index].instructions;
        let op = OpCode::from(instructions[op_pos]);
        let new_instruction = make(op, &[operand]);
        instructions[op_pos..op_pos + new_instruction.len()].copy_from_slice(&new_instruction);
    }

    pub(crate) fn load_symbol(&mut self, pos: Pos, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(pos, OpCode::OpGetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(pos, OpCode::OpGetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(pos, OpCode::OpGetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(pos, OpCode::OpGetFree, &[symbol.index]),
        };
    }

    /// Checks every operand fits its encoded width; offsets and pool indices
    /// beyond 16 bits have no encoding.
    pub(crate) fn check_operand_width(
        &self,
        pos: Pos,
        op: OpCode,
        operands: &[usize],
    ) -> crate::bytecode::compiler::CompileResult<()> {
        for (operand, width) in operands.iter().zip(operand_widths(op)) {
            let max = match width {
                1 => u8::MAX as usize,
                _ => u16::MAX as usize,
            };
            if *operand > max {
                return Err(self.error(pos, format!("operand overflow for {}", op)));
            }
        }
        Ok(())
    }
}
