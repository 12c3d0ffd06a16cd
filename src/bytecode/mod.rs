#[allow(clippy::module_inception)]
pub mod bytecode;
pub mod cache;
pub mod compiler;
pub mod op_code;
pub mod serialization;
pub mod symbol;
pub mod symbol_scope;
pub mod symbol_table;

pub use bytecode::Bytecode;
pub use compiler::{CompileError, Compiler};
pub use symbol::Symbol;
pub use symbol_scope::SymbolScope;
pub use symbol_table::SymbolTable;
