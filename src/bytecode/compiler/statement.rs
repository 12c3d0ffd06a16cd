use crate::bytecode::compiler::{CompileResult, Compiler, LoopContext};
use crate::bytecode::op_code::OpCode;
use crate::bytecode::symbol_scope::SymbolScope;
use crate::syntax::ast::{Block, Expr, Ident, Stmt};
use crate::syntax::source::Pos;
use crate::syntax::token::Token;

/// How a statement list ended, for dead-code trimming and loop emission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BlockEnd {
    Open,
    Return,
    LoopJump,
}

/// An assignment target decomposed into its root and selector chain.
enum Sel<'a> {
    Name(&'a str, Pos),
    Index(&'a Expr),
}

fn flatten_assignee<'a>(expr: &'a Expr, sels: &mut Vec<Sel<'a>>) -> &'a Expr {
    match expr {
        Expr::Selector {
            expr, sel, sel_pos, ..
        } => {
            let root = flatten_assignee(expr, sels);
            sels.push(Sel::Name(sel, *sel_pos));
            root
        }
        Expr::Index { expr, index, .. } => {
            let root = flatten_assignee(expr, sels);
            sels.push(Sel::Index(index));
            root
        }
        other => other,
    }
}

impl Compiler {
    /// Compiles a statement list, dropping everything after a terminal
    /// statement. The trimming is per-block and syntactic.
    pub(crate) fn compile_stmts(&mut self, stmts: &[Stmt]) -> CompileResult<BlockEnd> {
        for stmt in stmts {
            match self.compile_stmt(stmt)? {
                BlockEnd::Open => {}
                end => return Ok(end),
            }
        }
        Ok(BlockEnd::Open)
    }

    pub(crate) fn compile_block(&mut self, block: &Block) -> CompileResult<BlockEnd> {
        self.enter_block();
        let result = self.compile_stmts(&block.stmts);
        self.leave_block();
        result
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> CompileResult<BlockEnd> {
        match stmt {
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(expr.pos(), OpCode::OpPop, &[]);
                Ok(BlockEnd::Open)
            }
            Stmt::Assign { op, lhs, rhs, pos } => {
                self.compile_assign(*pos, *op, lhs, rhs)?;
                Ok(BlockEnd::Open)
            }
            Stmt::If {
                init,
                cond,
                body,
                else_stmt,
                pos,
            } => {
                self.compile_if(init.as_deref(), cond, body, else_stmt.as_deref(), *pos)?;
                Ok(BlockEnd::Open)
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                pos,
            } => {
                self.compile_for(init.as_deref(), cond.as_ref(), post.as_deref(), body, *pos)?;
                Ok(BlockEnd::Open)
            }
            Stmt::ForIn {
                key,
                value,
                iterable,
                body,
                pos,
            } => {
                self.compile_for_in(key.as_ref(), value, iterable, body, *pos)?;
                Ok(BlockEnd::Open)
            }
            Stmt::Return { result, pos } => {
                if self.scope_index == 0 {
                    return Err(self.error(*pos, "return not allowed outside function"));
                }
                match result {
                    Some(expr) => {
                        self.compile_expr(expr)?;
                        self.emit(*pos, OpCode::OpReturn, &[1]);
                    }
                    None => {
                        self.emit(*pos, OpCode::OpReturn, &[0]);
                    }
                }
                Ok(BlockEnd::Return)
            }
            Stmt::Break { pos } => {
                let jump_pos = self.emit(*pos, OpCode::OpJump, &[0xFFFF]);
                match self.current_loop() {
                    Some(ctx) => ctx.breaks.push(jump_pos),
                    None => return Err(self.error(*pos, "break not allowed outside loop")),
                }
                Ok(BlockEnd::LoopJump)
            }
            Stmt::Continue { pos } => {
                let jump_pos = self.emit(*pos, OpCode::OpJump, &[0xFFFF]);
                match self.current_loop() {
                    Some(ctx) => ctx.continues.push(jump_pos),
                    None => return Err(self.error(*pos, "continue not allowed outside loop")),
                }
                Ok(BlockEnd::LoopJump)
            }
            Stmt::Export { result, pos } => {
                if self.scope_index != 0 {
                    return Err(self.error(*pos, "export not allowed inside function"));
                }
                // Ignored outside a module.
                if self.in_module {
                    self.compile_expr(result)?;
                    self.emit(*pos, OpCode::OpImmutable, &[]);
                    self.emit(*pos, OpCode::OpReturn, &[1]);
                }
                Ok(BlockEnd::Open)
            }
            Stmt::Block(block) => self.compile_block(block),
        }
    }

    fn current_loop(&mut self) -> Option<&mut LoopContext> {
        self.scopes[self.scope_index].loops.last_mut()
    }

    fn compile_assign(
        &mut self,
        pos: Pos,
        op: Token,
        lhs: &[Expr],
        rhs: &[Expr],
    ) -> CompileResult<()> {
        if lhs.len() > 1 || rhs.len() > 1 {
            return Err(self.error(pos, "tuple assignment not allowed"));
        }
        let target = &lhs[0];
        let value_expr = &rhs[0];

        let mut selectors = Vec::new();
        let root = flatten_assignee(target, &mut selectors);
        let root_ident = match root {
            Expr::Ident(ident) => ident,
            other => return Err(self.error(other.pos(), "assignment to non-lvalue")),
        };

        if op == Token::Define {
            if !selectors.is_empty() {
                return Err(self.error(pos, "operator ':=' not allowed with selector"));
            }
            return self.compile_define(pos, root_ident, value_expr);
        }

        let Some((symbol, _)) = self.symbol_table.resolve(&root_ident.name, false) else {
            return Err(self.error(
                root_ident.pos,
                format!("unresolved reference '{}'", root_ident.name),
            ));
        };
        if symbol.scope == SymbolScope::Builtin {
            return Err(self.error(
                root_ident.pos,
                format!("cannot assign to builtin function '{}'", root_ident.name),
            ));
        }

        if selectors.is_empty() {
            match op.assign_op() {
                Some(binary) => {
                    self.load_symbol(root_ident.pos, &symbol);
                    self.compile_expr(value_expr)?;
                    self.emit(pos, OpCode::OpBinaryOp, &[binary as usize]);
                }
                None => self.compile_expr(value_expr)?,
            }
            match symbol.scope {
                SymbolScope::Global => {
                    self.emit(pos, OpCode::OpSetGlobal, &[symbol.index]);
                }
                SymbolScope::Local => {
                    self.emit(pos, OpCode::OpSetLocal, &[symbol.index]);
                    self.symbol_table.mark_assigned(&root_ident.name);
                }
                SymbolScope::Free => {
                    self.emit(pos, OpCode::OpSetFree, &[symbol.index]);
                }
                SymbolScope::Builtin => unreachable!(),
            }
            return Ok(());
        }

        // Selector assignment: value, then each selector, then the
        // scope-specific store that walks the chain.
        match op.assign_op() {
            Some(binary) => {
                self.compile_expr(target)?;
                self.compile_expr(value_expr)?;
                self.emit(pos, OpCode::OpBinaryOp, &[binary as usize]);
            }
            None => self.compile_expr(value_expr)?,
        }
        let num_sel = selectors.len();
        for sel in &selectors {
            match sel {
                Sel::Name(name, sel_pos) => {
                    let idx = self.add_constant(crate::runtime::value::Value::string(name));
                    self.emit(*sel_pos, OpCode::OpConstant, &[idx]);
                }
                Sel::Index(index) => self.compile_expr(index)?,
            }
        }
        match symbol.scope {
            SymbolScope::Global => {
                self.emit(pos, OpCode::OpSetSelGlobal, &[symbol.index, num_sel]);
            }
            SymbolScope::Local => {
                self.emit(pos, OpCode::OpSetSelLocal, &[symbol.index, num_sel]);
            }
            SymbolScope::Free => {
                self.emit(pos, OpCode::OpSetSelFree, &[symbol.index, num_sel]);
            }
            SymbolScope::Builtin => unreachable!(),
        }
        Ok(())
    }

    fn compile_define(
        &mut self,
        pos: Pos,
        ident: &Ident,
        value_expr: &Expr,
    ) -> CompileResult<()> {
        if self.symbol_table.exists_in_current_scope(&ident.name) {
            return Err(self.error(
                pos,
                format!("'{}' redeclared in this block", ident.name),
            ));
        }
        // A function literal can refer to itself, so its name is defined
        // before its body compiles; everything else compiles first, which is
        // why `a := a` is an unresolved reference.
        let (symbol, self_captured) = if let Expr::FuncLit {
            params,
            variadic,
            body,
            pos: func_pos,
        } = value_expr
        {
            let symbol = self.symbol_table.define(&ident.name);
            let captures = self.compile_func_lit(params, *variadic, body, *func_pos)?;
            let self_captured = captures.iter().any(|c| c.name == ident.name);
            (symbol, self_captured)
        } else {
            self.compile_expr(value_expr)?;
            (self.symbol_table.define(&ident.name), false)
        };
        match symbol.scope {
            SymbolScope::Global => {
                self.emit(pos, OpCode::OpSetGlobal, &[symbol.index]);
            }
            SymbolScope::Local if self_captured => {
                // The closure just wrapped this very slot in a cell; store
                // through it so the recursive reference sees the function.
                self.emit(pos, OpCode::OpSetLocal, &[symbol.index]);
            }
            SymbolScope::Local => {
                self.emit(pos, OpCode::OpDefineLocal, &[symbol.index]);
            }
            _ => unreachable!("define yields global or local symbols"),
        }
        self.symbol_table.mark_assigned(&ident.name);
        Ok(())
    }

    fn compile_if(
        &mut self,
        init: Option<&Stmt>,
        cond: &Expr,
        body: &Block,
        else_stmt: Option<&Stmt>,
        pos: Pos,
    ) -> CompileResult<()> {
        // The init clause and condition live in a one-shot scope wrapping
        // the whole construct.
        self.enter_block();
        let result = (|| -> CompileResult<()> {
            if let Some(init) = init {
                self.compile_stmt_boxed(init)?;
            }
            self.compile_expr(cond)?;
            let jump_falsy_pos = self.emit(pos, OpCode::OpJumpFalsy, &[0xFFFF]);
            self.compile_block(body)?;
            if let Some(else_stmt) = else_stmt {
                let jump_end_pos = self.emit(pos, OpCode::OpJump, &[0xFFFF]);
                let else_target = self.current_instructions().len();
                self.change_operand(jump_falsy_pos, else_target);
                self.compile_stmt_boxed(else_stmt)?;
                let end = self.current_instructions().len();
                self.change_operand(jump_end_pos, end);
            } else {
                let end = self.current_instructions().len();
                self.change_operand(jump_falsy_pos, end);
            }
            Ok(())
        })();
        self.leave_block();
        result
    }

    /// Init clauses and else branches arrive as bare statements; they do not
    /// open a scope of their own (the if construct's scope covers the init,
    /// and block/if else branches scope themselves).
    fn compile_stmt_boxed(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Block(block) => {
                self.compile_block(block)?;
            }
            other => {
                self.compile_stmt(other)?;
            }
        }
        Ok(())
    }

    fn compile_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
        pos: Pos,
    ) -> CompileResult<()> {
        self.enter_block();
        let result = (|| -> CompileResult<()> {
            if let Some(init) = init {
                self.compile_stmt(init)?;
            }
            let start = self.current_instructions().len();
            let cond_jump_pos = match cond {
                Some(cond) => {
                    self.compile_expr(cond)?;
                    Some(self.emit(pos, OpCode::OpJumpFalsy, &[0xFFFF]))
                }
                None => None,
            };

            self.scopes[self.scope_index].loops.push(LoopContext::default());
            let body_end = self.compile_block(body)?;
            let ctx = self.scopes[self.scope_index]
                .loops
                .pop()
                .expect("loop context");

            let post_target = self.current_instructions().len();
            if let Some(post) = post {
                self.compile_stmt(post)?;
            }
            // A body that ran off a terminal return never loops back.
            if body_end != BlockEnd::Return {
                self.emit(pos, OpCode::OpJump, &[start]);
            }
            let end = self.current_instructions().len();

            if let Some(jump_pos) = cond_jump_pos {
                self.change_operand(jump_pos, end);
            }
            for break_pos in ctx.breaks {
                self.change_operand(break_pos, end);
            }
            let continue_target = if post.is_some() { post_target } else { start };
            for continue_pos in ctx.continues {
                self.change_operand(continue_pos, continue_target);
            }
            Ok(())
        })();
        self.leave_block();
        result
    }

    fn compile_for_in(
        &mut self,
        key: Option<&Ident>,
        value: &Ident,
        iterable: &Expr,
        body: &Block,
        pos: Pos,
    ) -> CompileResult<()> {
        self.enter_block();
        let result = (|| -> CompileResult<()> {
            // Hidden iterator local.
            self.compile_expr(iterable)?;
            self.emit(pos, OpCode::OpIteratorInit, &[]);
            let it_symbol = self.symbol_table.define(":it");
            self.emit_store(pos, &it_symbol);

            let start = self.current_instructions().len();
            self.load_symbol(pos, &it_symbol);
            self.emit(pos, OpCode::OpIteratorNext, &[]);
            let cond_jump_pos = self.emit(pos, OpCode::OpJumpFalsy, &[0xFFFF]);

            if let Some(key) = key {
                if key.name != "_" {
                    self.load_symbol(key.pos, &it_symbol);
                    self.emit(key.pos, OpCode::OpIteratorKey, &[]);
                    let key_symbol = self.symbol_table.define(&key.name);
                    self.emit_store(key.pos, &key_symbol);
                    self.symbol_table.mark_assigned(&key.name);
                }
            }
            if value.name != "_" {
                self.load_symbol(value.pos, &it_symbol);
                self.emit(value.pos, OpCode::OpIteratorValue, &[]);
                let value_symbol = self.symbol_table.define(&value.name);
                self.emit_store(value.pos, &value_symbol);
                self.symbol_table.mark_assigned(&value.name);
            }

            self.scopes[self.scope_index].loops.push(LoopContext::default());
            let body_end = self.compile_block(body)?;
            let ctx = self.scopes[self.scope_index]
                .loops
                .pop()
                .expect("loop context");

            if body_end != BlockEnd::Return {
                self.emit(pos, OpCode::OpJump, &[start]);
            }
            let end = self.current_instructions().len();
            self.change_operand(cond_jump_pos, end);
            for break_pos in ctx.breaks {
                self.change_operand(break_pos, end);
            }
            for continue_pos in ctx.continues {
                self.change_operand(continue_pos, start);
            }
            Ok(())
        })();
        self.leave_block();
        result
    }

    /// Store for freshly defined symbols (globals use `SetGlobal`, locals
    /// `DefineLocal`).
    fn emit_store(&mut self, pos: Pos, symbol: &crate::bytecode::symbol::Symbol) {
        match symbol.scope {
            SymbolScope::Global => {
                self.emit(pos, OpCode::OpSetGlobal, &[symbol.index]);
            }
            SymbolScope::Local => {
                self.emit(pos, OpCode::OpDefineLocal, &[symbol.index]);
            }
            _ => unreachable!("fresh definitions are global or local"),
        }
    }
}
