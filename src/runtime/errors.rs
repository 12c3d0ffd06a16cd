use thiserror::Error;

/// Runtime error taxonomy. Messages are part of the user-facing contract and
/// are matched verbatim by tests; change them only deliberately.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("wrong number of arguments")]
    WrongNumArguments,

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArity { want: String, got: usize },

    #[error("invalid type for argument '{name}': expected {expected}, found {found}")]
    InvalidArgumentType {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid operation: {lhs} {op} {rhs}")]
    InvalidOperation {
        op: String,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("invalid operation: {op}{operand}")]
    InvalidUnaryOperation {
        op: String,
        operand: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("index out of bounds")]
    IndexOutOfBounds,

    #[error("invalid index type")]
    InvalidIndexType,

    #[error("invalid slice index")]
    InvalidSliceIndex,

    #[error("not indexable: {0}")]
    NotIndexable(&'static str),

    #[error("not index-assignable: {0}")]
    NotIndexAssignable(&'static str),

    #[error("not iterable: {0}")]
    NotIterable(&'static str),

    #[error("not callable: {0}")]
    NotCallable(&'static str),

    #[error("invalid range step")]
    InvalidRangeStep,

    #[error("exceeding string size limit")]
    StringLimit,

    #[error("exceeding bytes size limit")]
    BytesLimit,

    #[error("allocation limit exceeded")]
    AllocLimit,

    #[error("stack overflow")]
    StackOverflow,

    #[error("VM aborted")]
    Aborted,

    /// Host-origin error surfaced by a builtin or user function.
    #[error("{0}")]
    Host(String),
}

impl RuntimeError {
    pub fn host(message: impl Into<String>) -> Self {
        RuntimeError::Host(message.into())
    }
}
