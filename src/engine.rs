use std::collections::HashMap;

use crate::bytecode::bytecode::Bytecode;
use crate::bytecode::compiler::Compiler;
use crate::bytecode::symbol_scope::SymbolScope;
use crate::bytecode::symbol_table::SymbolTable;
use crate::error::Error;
use crate::modules::ModuleMap;
use crate::runtime::builtins::BUILTINS;
use crate::runtime::value::Value;
use crate::runtime::vm::{AbortSignal, GLOBALS_SIZE, VM};
use crate::scope::Scope;
use crate::syntax::parser::parse_file;
use crate::syntax::source::SourceFileSet;

/// The embedding façade: holds the module registry and resource ceilings,
/// and compiles programs against a [`Scope`] whose variables seed the
/// globals. Negative ceilings mean unlimited.
pub struct Engine {
    modules: ModuleMap,
    max_allocs: i64,
    max_const_objects: i64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            modules: ModuleMap::new(),
            max_allocs: -1,
            max_const_objects: -1,
        }
    }

    pub fn set_imports(&mut self, modules: ModuleMap) {
        self.modules = modules;
    }

    pub fn set_max_allocs(&mut self, n: i64) {
        self.max_allocs = n;
    }

    pub fn set_max_const_objects(&mut self, n: i64) {
        self.max_const_objects = n;
    }

    pub fn run(&self, script: &str) -> Result<(), Error> {
        self.run_with_scope(&Scope::new(), script)
    }

    pub fn run_with_scope(&self, scope: &Scope, script: &str) -> Result<(), Error> {
        let mut compiled = self.compile(scope, "(main)", script)?;
        compiled.run()
    }

    /// Parses, compiles, deduplicates constants, and checks the constant
    /// ceiling. The scope's variables become the first globals.
    pub fn compile(&self, scope: &Scope, name: &str, script: &str) -> Result<Compiled, Error> {
        let names = scope.get_all_names();

        let mut symbol_table = SymbolTable::new();
        for (idx, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(idx, builtin.name);
        }

        let mut globals = vec![Value::Undefined; GLOBALS_SIZE];
        for var_name in &names {
            let symbol = symbol_table.define(var_name);
            globals[symbol.index] = scope.get(var_name);
        }

        let mut file_set = SourceFileSet::new();
        let file_index = file_set.add_file(name, script.as_bytes());
        let file = parse_file(&file_set.files[file_index], script.as_bytes())?;

        let mut compiler = Compiler::new(
            file_set,
            file_index,
            symbol_table,
            Vec::new(),
            self.modules.clone(),
        );
        compiler.compile(&file)?;
        let (mut bytecode, mut symbol_table) = compiler.finish();

        bytecode.remove_duplicates();
        if self.max_const_objects >= 0 {
            let count = bytecode.count_objects();
            if count as i64 > self.max_const_objects {
                return Err(Error::Limit(format!(
                    "exceeding constant objects limit: {}",
                    count
                )));
            }
        }

        globals.truncate(symbol_table.max_symbols() + 1);

        let mut global_indexes = HashMap::new();
        for var_name in symbol_table.names() {
            if let Some((symbol, _)) = symbol_table.resolve(&var_name, false)
                && symbol.scope == SymbolScope::Global
            {
                global_indexes.insert(var_name, symbol.index);
            }
        }

        Ok(Compiled {
            bytecode,
            global_indexes,
            globals,
            max_allocs: self.max_allocs,
            scope: scope.clone(),
            abort: AbortSignal::new(),
        })
    }
}

/// A compiled program bound to its scope and globals, ready to run. The
/// globals persist across runs, which is how a REPL-style host accumulates
/// state.
pub struct Compiled {
    bytecode: Bytecode,
    global_indexes: HashMap<String, usize>,
    globals: Vec<Value>,
    max_allocs: i64,
    scope: Scope,
    abort: AbortSignal,
}

impl Compiled {
    /// Cancellation handle for this program's runs.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    pub fn scope(&self) -> Scope {
        self.scope.clone()
    }

    /// Runs the program, then flows plain-data globals back into the scope.
    /// Names starting with `_`, callables, and immutable maps holding a
    /// callable stay out of the scope.
    pub fn run(&mut self) -> Result<(), Error> {
        let globals = std::mem::take(&mut self.globals);
        let mut vm = VM::new(self.bytecode.clone(), globals, self.max_allocs);
        vm.set_abort_signal(self.abort.clone());
        let result = vm.run();
        self.globals = vm.into_globals();
        result?;

        'names: for (name, idx) in &self.global_indexes {
            if name.starts_with('_') {
                continue;
            }
            let value = self
                .globals
                .get(*idx)
                .cloned()
                .unwrap_or(Value::Undefined);
            match &value {
                Value::Function(_) | Value::Closure(_) | Value::UserFunction(_) => continue,
                Value::ImmutableMap(entries) => {
                    for entry in entries.values() {
                        if matches!(
                            entry,
                            Value::Function(_) | Value::Closure(_) | Value::UserFunction(_)
                        ) {
                            continue 'names;
                        }
                    }
                }
                _ => {}
            }
            self.scope.set(name.clone(), value);
        }
        Ok(())
    }
}
