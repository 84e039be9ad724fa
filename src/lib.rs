pub mod cli;
pub mod config;
pub mod driver;
pub mod interpreter;

// Re-export main types
pub use interpreter::{
    compile, CompileError, DeserializationError, EncodeError, Error, EvaluationError,
    EvaluationErrorKind, Limits, Process, ProcessError, RunStatus, Script, SerializedState, Value,
};
