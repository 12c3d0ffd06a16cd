use thiserror::Error;

use crate::bytecode::compiler::CompileError;
use crate::runtime::vm::VmError;
use crate::syntax::errors::ErrorList;

/// Top-level error surface of the embedding API and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Parse(ErrorList),

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Runtime(#[from] VmError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Limit(String),
}

impl From<ErrorList> for Error {
    fn from(list: ErrorList) -> Self {
        Error::Parse(list)
    }
}
