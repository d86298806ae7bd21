use thiserror::Error;

/// Errors that can occur while reading or evaluating slisp code.
/// Every error aborts the current run; no form has local recovery.
#[derive(Debug, Clone, Error)]
pub enum LispError {
    /// Symbol resolution failed at every frame in the environment chain.
    #[error("undefined local variable {0}")]
    UnboundName(String),

    /// A value of the wrong shape where a specific variant was required.
    /// Carries the value's rendering and the expected type name.
    #[error("{0} is not {1}")]
    TypeMismatch(String, &'static str),

    /// The head of a call evaluated to something that is neither a
    /// special form nor a closure or macro.
    #[error("undefined function: {0}")]
    UndefinedOperator(String),

    /// Wrong argument count or shape for a special form.
    #[error("malformed {0} form: {1}")]
    MalformedForm(&'static str, String),

    /// The `require` capability could not locate or initialize a module.
    #[error("can't load dynamic module: {0}")]
    ModuleLoad(String),

    /// Reader error: the source text does not match the grammar.
    #[error("read error: {0}")]
    ReadError(String),

    /// Heap capacity exceeded.
    #[error("heap capacity exceeded")]
    HeapOverflow,
}

pub type LispResult<T> = Result<T, LispError>;
