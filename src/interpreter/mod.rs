//! The stagehand language: lexer, parser, statement graph, executor and codec
//!
//! ```no_run
//! use stagehand::interpreter::{compile, Process, RunStatus};
//!
//! let script = compile("x = 1\nwhile x < 100: x *= 2\nprint x\n")?;
//! let mut process = Process::new(script);
//! while process.run(1000)? == RunStatus::Running {}
//! assert_eq!(process.take_output(), vec!["128".to_string()]);
//! # Ok::<(), stagehand::interpreter::Error>(())
//! ```

pub mod codec;
pub mod errors;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod types;

use std::sync::Arc;

pub use codec::SerializedState;
pub use errors::{
    CompileError, DeserializationError, EncodeError, Error, EvaluationError, EvaluationErrorKind,
    LexError, ParseError, ProcessError, UnhandledScriptError,
};
pub use executor::{Limits, Process, RunStatus};
pub use types::{Script, Value};

/// Parse source text into a shareable compiled script
pub fn compile(source: &str) -> Result<Arc<Script>, CompileError> {
    let script = parser::parse(source)?;
    tracing::debug!(
        statements = script.statements.len(),
        expressions = script.expressions.len(),
        functions = script.functions.len(),
        "script compiled"
    );
    Ok(Arc::new(script))
}
