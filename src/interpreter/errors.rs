//! Error taxonomy
//!
//! Lex and parse errors are fatal to compilation and surface before any
//! process exists. Evaluation errors and unhandled throws terminate a single
//! process. Deserialization errors reject corrupt or mismatched blobs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Position, Value};

/* ===================== Compilation ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("unterminated text literal")]
    UnterminatedText,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("malformed number literal '{0}'")]
    MalformedNumber(String),
    #[error("unindent does not match any outer indentation level")]
    InconsistentDedent,
    #[error("tabs are not supported for indentation")]
    TabIndentation,
}

/// Malformed token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {pos}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub pos: Position,
}

impl LexError {
    pub fn new(kind: LexErrorKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

/// Malformed grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {pos}")]
pub struct ParseError {
    pub pos: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: Position, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl CompileError {
    pub fn position(&self) -> Position {
        match self {
            CompileError::Lex(err) => err.pos,
            CompileError::Parse(err) => err.pos,
        }
    }
}

/* ===================== Evaluation ===================== */

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum EvaluationErrorKind {
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    #[error("unsupported operand types for {op}: {lhs} and {rhs}")]
    TypeMismatch { op: String, lhs: String, rhs: String },
    #[error("bad operand type for {op}: {operand}")]
    UnaryTypeMismatch { op: String, operand: String },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("{name}() expects {expected} argument(s), got {given}")]
    ArityMismatch {
        name: String,
        expected: String,
        given: usize,
    },
    #[error("value of type {0} is not callable")]
    NotCallable(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidFlow(String),
    #[error("native function '{name}' failed: {message}")]
    Native { name: String, message: String },
    #[error("native function '{0}' is not registered")]
    UnknownNative(String),
    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),
}

impl EvaluationErrorKind {
    pub fn type_mismatch(op: &str, lhs: &Value, rhs: &Value) -> Self {
        EvaluationErrorKind::TypeMismatch {
            op: op.to_string(),
            lhs: lhs.type_name().to_string(),
            rhs: rhs.type_name().to_string(),
        }
    }

    pub fn unary_mismatch(op: &str, operand: &Value) -> Self {
        EvaluationErrorKind::UnaryTypeMismatch {
            op: op.to_string(),
            operand: operand.type_name().to_string(),
        }
    }

    pub fn at(self, pos: Position) -> EvaluationError {
        EvaluationError { kind: self, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind} at {pos}")]
pub struct EvaluationError {
    pub kind: EvaluationErrorKind,
    pub pos: Position,
}

/// A `throw` that found no enclosing `try` anywhere on the context stack
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("unhandled script error: {value} (thrown at {pos})")]
pub struct UnhandledScriptError {
    pub value: Value,
    pub pos: Position,
}

/// Why a process terminated abnormally
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProcessError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Unhandled(#[from] UnhandledScriptError),
}

/* ===================== Serialization ===================== */

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("not a {expected} blob (bad magic bytes)")]
    BadMagic { expected: &'static str },
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("truncated data")]
    Truncated,
    #[error("state was saved from a different script")]
    ScriptMismatch,
    #[error("corrupt data: {0}")]
    Corrupt(String),
    #[error("dangling {what} index {index}")]
    Dangling { what: &'static str, index: u64 },
}

impl From<bincode::Error> for DeserializationError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                DeserializationError::Truncated
            }
            _ => DeserializationError::Corrupt(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to encode: {0}")]
pub struct EncodeError(String);

impl From<bincode::Error> for EncodeError {
    fn from(err: bincode::Error) -> Self {
        EncodeError(err.to_string())
    }
}

/* ===================== Umbrella ===================== */

/// Any error the interpreter can report to a host
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
