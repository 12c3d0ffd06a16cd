use std::rc::Rc;

use crate::bytecode::compiler::{CompileResult, Compiler};
use crate::bytecode::op_code::OpCode;
use crate::bytecode::symbol_scope::SymbolScope;
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::value::Value;
use crate::syntax::ast::{Block, Expr, Ident};
use crate::syntax::source::Pos;
use crate::syntax::token::Token;

impl Compiler {
    pub(crate) fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::IntLit { value, pos } => {
                let idx = self.add_constant(Value::Int(*value));
                self.emit(*pos, OpCode::OpConstant, &[idx]);
            }
            Expr::FloatLit { value, pos } => {
                let idx = self.add_constant(Value::Float(*value));
                self.emit(*pos, OpCode::OpConstant, &[idx]);
            }
            Expr::StringLit { value, pos } => {
                let idx = self.add_constant(Value::string(value));
                self.emit(*pos, OpCode::OpConstant, &[idx]);
            }
            Expr::CharLit { value, pos } => {
                let idx = self.add_constant(Value::Char(*value));
                self.emit(*pos, OpCode::OpConstant, &[idx]);
            }
            Expr::BoolLit { value, pos } => {
                if *value {
                    self.emit(*pos, OpCode::OpTrue, &[]);
                } else {
                    self.emit(*pos, OpCode::OpFalse, &[]);
                }
            }
            Expr::UndefinedLit { pos } => {
                self.emit(*pos, OpCode::OpNull, &[]);
            }
            Expr::Ident(ident) => {
                let Some((symbol, _)) = self.symbol_table.resolve(&ident.name, false) else {
                    return Err(self.error(
                        ident.pos,
                        format!("unresolved reference '{}'", ident.name),
                    ));
                };
                self.load_symbol(ident.pos, &symbol);
            }
            Expr::Unary { op, expr, pos } => {
                self.compile_expr(expr)?;
                match op {
                    Token::Not => self.emit(*pos, OpCode::OpLNot, &[]),
                    Token::Sub => self.emit(*pos, OpCode::OpMinus, &[]),
                    other => {
                        return Err(
                            self.error(*pos, format!("invalid unary operator: {}", other))
                        );
                    }
                };
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                self.compile_binary(*op, lhs, rhs, lhs.pos())?;
            }
            Expr::Cond {
                cond,
                then,
                alt,
                pos,
            } => {
                self.compile_expr(cond)?;
                let jump_falsy_pos = self.emit(*pos, OpCode::OpJumpFalsy, &[0xFFFF]);
                self.compile_expr(then)?;
                let jump_end_pos = self.emit(*pos, OpCode::OpJump, &[0xFFFF]);
                let alt_target = self.current_instructions().len();
                self.change_operand(jump_falsy_pos, alt_target);
                self.compile_expr(alt)?;
                let end = self.current_instructions().len();
                self.change_operand(jump_end_pos, end);
            }
            Expr::ArrayLit { elements, lbrack } => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(*lbrack, OpCode::OpArray, &[elements.len()]);
            }
            Expr::MapLit { elements, lbrace } => {
                for element in elements {
                    let idx = self.add_constant(Value::string(&element.key));
                    self.emit(element.key_pos, OpCode::OpConstant, &[idx]);
                    self.compile_expr(&element.value)?;
                }
                self.emit(*lbrace, OpCode::OpMap, &[elements.len() * 2]);
            }
            Expr::Index { expr, index, pos } => {
                self.compile_expr(expr)?;
                self.compile_expr(index)?;
                self.emit(*pos, OpCode::OpIndex, &[]);
            }
            Expr::Selector {
                expr,
                sel,
                sel_pos,
            } => {
                self.compile_expr(expr)?;
                let idx = self.add_constant(Value::string(sel));
                self.emit(*sel_pos, OpCode::OpConstant, &[idx]);
                self.emit(*sel_pos, OpCode::OpIndex, &[]);
            }
            Expr::Slice {
                expr,
                low,
                high,
                pos,
            } => {
                self.compile_expr(expr)?;
                match low {
                    Some(low) => self.compile_expr(low)?,
                    None => {
                        self.emit(*pos, OpCode::OpNull, &[]);
                    }
                }
                match high {
                    Some(high) => self.compile_expr(high)?,
                    None => {
                        self.emit(*pos, OpCode::OpNull, &[]);
                    }
                }
                self.emit(*pos, OpCode::OpSliceIndex, &[]);
            }
            Expr::FuncLit {
                params,
                variadic,
                body,
                pos,
            } => {
                self.compile_func_lit(params, *variadic, body, *pos)?;
            }
            Expr::Call {
                func,
                args,
                has_spread,
                pos,
            } => {
                self.compile_expr(func)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.check_operand_width(*pos, OpCode::OpCall, &[args.len()])?;
                self.emit(
                    *pos,
                    OpCode::OpCall,
                    &[args.len(), usize::from(*has_spread)],
                );
            }
            Expr::Import { module_name, pos } => {
                self.compile_import(module_name, *pos)?;
            }
        }
        Ok(())
    }

    fn compile_binary(
        &mut self,
        op: Token,
        lhs: &Expr,
        rhs: &Expr,
        pos: Pos,
    ) -> CompileResult<()> {
        match op {
            // Short-circuit forms: the left value stays on the stack when
            // the jump is taken, otherwise it is popped before the right
            // operand is evaluated.
            Token::LAnd => {
                self.compile_expr(lhs)?;
                let jump_pos = self.emit(pos, OpCode::OpAndJump, &[0xFFFF]);
                self.compile_expr(rhs)?;
                let end = self.current_instructions().len();
                self.change_operand(jump_pos, end);
            }
            Token::LOr => {
                self.compile_expr(lhs)?;
                let jump_pos = self.emit(pos, OpCode::OpOrJump, &[0xFFFF]);
                self.compile_expr(rhs)?;
                let end = self.current_instructions().len();
                self.change_operand(jump_pos, end);
            }
            Token::Equal => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(pos, OpCode::OpEqual, &[]);
            }
            Token::NotEqual => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(pos, OpCode::OpNotEqual, &[]);
            }
            _ => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(pos, OpCode::OpBinaryOp, &[op as usize]);
            }
        }
        Ok(())
    }

    /// Returns the free symbols the literal captured, as resolved in the
    /// enclosing scope (the define path checks for self-capture).
    pub(crate) fn compile_func_lit(
        &mut self,
        params: &[Ident],
        variadic: bool,
        body: &Block,
        pos: Pos,
    ) -> CompileResult<Vec<crate::bytecode::symbol::Symbol>> {
        self.enter_scope();

        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                let err = self.error(
                    param.pos,
                    format!("'{}' redeclared in this block", param.name),
                );
                self.leave_scope();
                return Err(err);
            }
            self.symbol_table.define(&param.name);
            self.symbol_table.mark_assigned(&param.name);
        }

        let body_end = match self.compile_stmts(&body.stmts) {
            Ok(end) => end,
            Err(err) => {
                self.leave_scope();
                return Err(err);
            }
        };

        // Fall off the end of the body: return undefined. Checking the
        // statement list rather than the last emitted instruction keeps a
        // branch-end jump from landing past the final return.
        if body_end != super::statement::BlockEnd::Return {
            self.emit(pos, OpCode::OpReturn, &[0]);
        }

        let free_symbols = self.symbol_table.free_symbols().to_vec();
        let num_locals = self.symbol_table.max_symbols();
        let scope = self.leave_scope();

        let func = CompiledFunction::new(
            scope.instructions,
            num_locals,
            params.len(),
            variadic,
            scope.source_map,
        );

        // Captures are pushed as cells, then bundled by `Closure`.
        for free in &free_symbols {
            match free.scope {
                SymbolScope::Local => {
                    self.emit(pos, OpCode::OpGetLocalPtr, &[free.index]);
                }
                SymbolScope::Free => {
                    self.emit(pos, OpCode::OpGetFreePtr, &[free.index]);
                }
                _ => unreachable!("free symbols are locals or frees"),
            }
        }

        let idx = self.add_constant(Value::Function(Rc::new(func)));
        if free_symbols.is_empty() {
            self.emit(pos, OpCode::OpConstant, &[idx]);
        } else {
            self.emit(pos, OpCode::OpClosure, &[idx, free_symbols.len()]);
        }
        Ok(free_symbols)
    }
}
