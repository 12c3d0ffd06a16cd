use std::collections::HashMap;

use crate::syntax::source::{NO_POS, Pos};

/// A function lowered to bytecode. Immutable once emitted by the compiler.
#[derive(Debug, Clone, Default)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_parameters: usize,
    pub variadic: bool,
    /// Instruction offset to source position, for runtime error reports.
    pub source_map: HashMap<usize, Pos>,
}

impl CompiledFunction {
    pub fn new(
        instructions: Vec<u8>,
        num_locals: usize,
        num_parameters: usize,
        variadic: bool,
        source_map: HashMap<usize, Pos>,
    ) -> Self {
        Self {
            instructions,
            num_locals,
            num_parameters,
            variadic,
            source_map,
        }
    }

    pub fn source_pos(&self, ip: usize) -> Pos {
        self.source_map.get(&ip).copied().unwrap_or(NO_POS)
    }
}

/// Structural equality ignores the source map: two functions with the same
/// code are the same function for constant-pool deduplication.
impl PartialEq for CompiledFunction {
    fn eq(&self, other: &Self) -> bool {
        self.instructions == other.instructions
            && self.num_locals == other.num_locals
            && self.num_parameters == other.num_parameters
            && self.variadic == other.variadic
    }
}
