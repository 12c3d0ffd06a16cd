use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::bytecode::bytecode::Bytecode;
use crate::bytecode::op_code::{Instructions, OpCode};
use crate::bytecode::symbol_table::SymbolTable;
use crate::modules::{Importable, ModuleMap};
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::value::Value;
use crate::syntax::parser::parse_file;
use crate::syntax::source::{Pos, SourceFileSet};

mod builder;
mod errors;
mod expression;
mod statement;

#[cfg(test)]
mod compiler_test;

pub use errors::CompileError;

pub(crate) type CompileResult<T> = Result<T, CompileError>;

/// Default extension for file imports; hosts may replace it.
pub const SOURCE_FILE_EXT: &str = ".rill";

/// Back-patch targets collected while compiling one loop.
#[derive(Debug, Default)]
pub(crate) struct LoopContext {
    pub breaks: Vec<usize>,
    pub continues: Vec<usize>,
}

/// Per-function instruction buffer.
#[derive(Debug, Default)]
pub(crate) struct CompilationScope {
    pub instructions: Instructions,
    pub source_map: HashMap<usize, Pos>,
    pub loops: Vec<LoopContext>,
}

/// Single-pass AST-to-bytecode compiler.
///
/// One compiler instance also compiles every source module it imports: the
/// importer swaps the symbol table and scope stack, compiles the module body
/// into a fresh function whose locals are the module's top-level bindings,
/// then restores the outer state. The constant pool is shared throughout.
pub struct Compiler {
    pub(crate) file_set: SourceFileSet,
    pub(crate) file_index: usize,
    pub(crate) symbol_table: SymbolTable,
    pub(crate) constants: Vec<Value>,
    pub(crate) scopes: Vec<CompilationScope>,
    pub(crate) scope_index: usize,
    modules: ModuleMap,
    compiled_modules: HashMap<String, Rc<CompiledFunction>>,
    import_stack: Vec<String>,
    pub(crate) in_module: bool,
    allow_file_import: bool,
    import_dir: PathBuf,
    import_file_ext: Vec<String>,
    pub(crate) trace: Option<Box<dyn Write>>,
}

impl Compiler {
    pub fn new(
        file_set: SourceFileSet,
        file_index: usize,
        symbol_table: SymbolTable,
        constants: Vec<Value>,
        modules: ModuleMap,
    ) -> Self {
        Self {
            file_set,
            file_index,
            symbol_table,
            constants,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
            modules,
            compiled_modules: HashMap::new(),
            import_stack: Vec::new(),
            in_module: false,
            allow_file_import: false,
            import_dir: PathBuf::from("."),
            import_file_ext: vec![SOURCE_FILE_EXT.to_string()],
            trace: None,
        }
    }

    pub fn set_trace(&mut self, trace: Option<Box<dyn Write>>) {
        self.trace = trace;
    }

    pub fn enable_file_import(&mut self, enable: bool) {
        self.allow_file_import = enable;
    }

    pub fn set_import_dir(&mut self, dir: impl Into<PathBuf>) {
        self.import_dir = dir.into();
    }

    /// Replaces the recognised import file extensions. Each must begin with
    /// a dot and contain no further dots.
    pub fn set_import_file_ext(&mut self, exts: &[&str]) -> CompileResult<()> {
        if exts.is_empty() {
            return Err(CompileError::plain(
                "missing arg: at least one extension is required",
            ));
        }
        for ext in exts {
            if ext.len() < 2 || !ext.starts_with('.') || ext[1..].contains('.') {
                return Err(CompileError::plain(format!(
                    "invalid file extension: {}",
                    ext
                )));
            }
        }
        self.import_file_ext = exts.iter().map(|e| e.to_string()).collect();
        Ok(())
    }

    pub fn get_import_file_ext(&self) -> Vec<String> {
        self.import_file_ext.clone()
    }

    /// Compiles a parsed file into the main function, terminated by
    /// `Suspend`.
    pub fn compile(&mut self, file: &crate::syntax::ast::File) -> CompileResult<()> {
        self.compile_stmts(&file.stmts)?;
        self.emit(crate::syntax::source::NO_POS, OpCode::OpSuspend, &[]);
        Ok(())
    }

    /// Consumes the compiler, producing the bytecode and the symbol table
    /// (which the REPL and the engine feed into the next compilation).
    pub fn finish(mut self) -> (Bytecode, SymbolTable) {
        let scope = self.scopes.pop().expect("unbalanced scopes");
        let main_function = Rc::new(CompiledFunction::new(
            scope.instructions,
            0,
            0,
            false,
            scope.source_map,
        ));
        (
            Bytecode {
                file_set: self.file_set,
                main_function,
                constants: self.constants,
            },
            self.symbol_table,
        )
    }

    pub(crate) fn error(&self, pos: Pos, message: impl Into<String>) -> CompileError {
        CompileError::new(message, self.file_set.position(pos))
    }

    // -- scope management ---------------------------------------------------

    pub(crate) fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;
        self.symbol_table = std::mem::take(&mut self.symbol_table).fork(false);
    }

    pub(crate) fn leave_scope(&mut self) -> CompilationScope {
        let scope = self.scopes.pop().expect("unbalanced scopes");
        self.scope_index -= 1;
        self.symbol_table = std::mem::take(&mut self.symbol_table).unfork();
        scope
    }

    pub(crate) fn enter_block(&mut self) {
        self.symbol_table = std::mem::take(&mut self.symbol_table).fork(true);
    }

    pub(crate) fn leave_block(&mut self) {
        self.symbol_table = std::mem::take(&mut self.symbol_table).unfork();
    }

    // -- module import ------------------------------------------------------

    pub(crate) fn compile_import(&mut self, module_name: &str, pos: Pos) -> CompileResult<()> {
        if module_name.is_empty() {
            return Err(self.error(pos, "empty module name"));
        }

        if let Some(importable) = self.modules.get(module_name).cloned() {
            match importable {
                Importable::Builtin(module) => {
                    let constant = module.as_immutable_map(module_name);
                    let idx = self.add_constant(constant);
                    self.emit(pos, OpCode::OpConstant, &[idx]);
                }
                Importable::Source(src) => {
                    let compiled =
                        self.compile_module(module_name, module_name, &src, pos)?;
                    let idx = self.add_constant(Value::Function(compiled));
                    self.emit(pos, OpCode::OpConstant, &[idx]);
                    self.emit(pos, OpCode::OpCall, &[0, 0]);
                }
            }
            return Ok(());
        }

        if self.allow_file_import {
            let path = self.resolve_import_file(module_name, pos)?;
            let src = std::fs::read(&path)
                .map_err(|e| self.error(pos, format!("module file read error: {}", e)))?;
            let mut src = src;
            if src.len() > 1 && &src[..2] == b"#!" {
                src[0] = b'/';
                src[1] = b'/';
            }
            let key = path.to_string_lossy().into_owned();
            let display = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| key.clone());
            let compiled = self.compile_module(&key, &display, &src, pos)?;
            let idx = self.add_constant(Value::Function(compiled));
            self.emit(pos, OpCode::OpConstant, &[idx]);
            self.emit(pos, OpCode::OpCall, &[0, 0]);
            return Ok(());
        }

        Err(self.error(pos, format!("module '{}' not found", module_name)))
    }

    fn resolve_import_file(&self, module_name: &str, pos: Pos) -> CompileResult<PathBuf> {
        let named: &Path = Path::new(module_name);
        if named.extension().is_some() {
            let candidate = self.import_dir.join(named);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        for ext in &self.import_file_ext {
            let candidate = self.import_dir.join(format!("{}{}", module_name, ext));
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(self.error(pos, format!("module '{}' not found", module_name)))
    }

    /// Compiles a source module body into a zero-parameter function whose
    /// locals are the module's top-level bindings. Memoised per compilation;
    /// the import stack catches cycles.
    fn compile_module(
        &mut self,
        module_key: &str,
        display_name: &str,
        src: &[u8],
        pos: Pos,
    ) -> CompileResult<Rc<CompiledFunction>> {
        if self.import_stack.iter().any(|m| m == module_key) {
            return Err(self.error(pos, format!("cyclic module import: {}", display_name)));
        }
        if let Some(cached) = self.compiled_modules.get(module_key) {
            return Ok(cached.clone());
        }

        let file_index = self.file_set.add_file(display_name, src);
        let file = parse_file(&self.file_set.files[file_index], src)
            .map_err(|list| CompileError::plain(list.to_string()))?;

        self.import_stack.push(module_key.to_string());

        // Swap in a fresh module compilation state; builtins carry over.
        let saved_file_index = std::mem::replace(&mut self.file_index, file_index);
        let saved_table = std::mem::take(&mut self.symbol_table);
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_scope_index = std::mem::replace(&mut self.scope_index, 0);
        let saved_in_module = std::mem::replace(&mut self.in_module, true);

        let mut module_table = SymbolTable::new();
        for sym in saved_table.builtin_symbols() {
            module_table.define_builtin(sym.index, sym.name);
        }
        // One function-level fork: module globals become frame locals.
        self.symbol_table = module_table.fork(false);
        self.scopes = vec![CompilationScope::default()];

        let result = self.compile_module_body(&file);

        let num_locals = self.symbol_table.max_symbols();
        let scope = self.scopes.pop().unwrap_or_default();

        self.file_index = saved_file_index;
        self.symbol_table = saved_table;
        self.scopes = saved_scopes;
        self.scope_index = saved_scope_index;
        self.in_module = saved_in_module;
        self.import_stack.pop();

        result?;

        let compiled = Rc::new(CompiledFunction::new(
            scope.instructions,
            num_locals,
            0,
            false,
            scope.source_map,
        ));
        self.compiled_modules
            .insert(module_key.to_string(), compiled.clone());
        Ok(compiled)
    }

    fn compile_module_body(&mut self, file: &crate::syntax::ast::File) -> CompileResult<()> {
        let end = self.compile_stmts(&file.stmts)?;
        if end != statement::BlockEnd::Return {
            self.emit(crate::syntax::source::NO_POS, OpCode::OpReturn, &[0]);
        }
        Ok(())
    }
}
