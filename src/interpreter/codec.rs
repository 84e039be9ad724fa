//! Binary encoding for compiled scripts and suspended process state
//!
//! Payloads are bincode 1.x with fixed-width integers: every enum variant is
//! a little-endian `u32` tag followed by its fields in declaration order, and
//! unknown tags are rejected on decode. Each blob carries a 4-byte magic and
//! a `u16` format version; process state additionally carries the SHA-256
//! fingerprint of the script it was running.
//!
//! Decoding never trusts indices: every statement, expression, function and
//! record id in a decoded blob is checked before it can reach the executor.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::errors::{DeserializationError, EncodeError};
use super::executor::{ProcessState, Status, Task};
use super::types::{
    Accessor, ControlEntry, ExprId, ExprKind, FuncId, Function, RecordId, RecordStore, Script,
    StmtId, StmtKind, Value,
};

pub const FORMAT_VERSION: u16 = 1;

const SCRIPT_MAGIC: &[u8; 4] = b"SHSC";
const STATE_MAGIC: &[u8; 4] = b"SHST";
const HEADER_LEN: usize = 6;
const FINGERPRINT_LEN: usize = 32;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Raw payload encoding without framing
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    Ok(options().serialize(value)?)
}

/// Raw payload decoding without framing or validation
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DeserializationError> {
    Ok(options().deserialize(bytes)?)
}

fn header(magic: &[u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(magic);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out
}

/// Check magic and version, returning the rest of the blob
fn strip_header<'a>(
    bytes: &'a [u8],
    magic: &[u8; 4],
    what: &'static str,
) -> Result<&'a [u8], DeserializationError> {
    let found = bytes.get(..4).ok_or(DeserializationError::Truncated)?;
    if found != magic {
        return Err(DeserializationError::BadMagic { expected: what });
    }
    let version = bytes.get(4..HEADER_LEN).ok_or(DeserializationError::Truncated)?;
    let version = u16::from_le_bytes([version[0], version[1]]);
    if version != FORMAT_VERSION {
        return Err(DeserializationError::UnsupportedVersion(version));
    }
    Ok(&bytes[HEADER_LEN..])
}

/* ===================== Scripts ===================== */

pub fn encode_script(script: &Script) -> Result<Vec<u8>, EncodeError> {
    let mut out = header(SCRIPT_MAGIC);
    out.extend(encode(script)?);
    Ok(out)
}

pub fn decode_script(bytes: &[u8]) -> Result<Script, DeserializationError> {
    let payload = strip_header(bytes, SCRIPT_MAGIC, "script")?;
    let script: Script = decode(payload)?;
    validate_script(&script)?;
    Ok(script)
}

impl Script {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        encode_script(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializationError> {
        decode_script(bytes)
    }
}

/// SHA-256 of the encoded script payload
pub fn fingerprint(script: &Script) -> Result<[u8; FINGERPRINT_LEN], EncodeError> {
    let digest = Sha256::digest(encode(script)?);
    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Hex form of [`fingerprint`], for display
pub fn fingerprint_hex(script: &Script) -> Result<String, EncodeError> {
    Ok(fingerprint(script)?
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

fn dangling(what: &'static str, index: u64) -> DeserializationError {
    DeserializationError::Dangling { what, index }
}

fn check_stmt(script: &Script, id: StmtId) -> Result<(), DeserializationError> {
    if script.has_stmt(id) {
        Ok(())
    } else {
        Err(dangling("statement", id.0 as u64))
    }
}

fn check_expr(script: &Script, id: ExprId) -> Result<(), DeserializationError> {
    if script.has_expr(id) {
        Ok(())
    } else {
        Err(dangling("expression", id.0 as u64))
    }
}

fn check_function(script: &Script, id: FuncId) -> Result<(), DeserializationError> {
    if script.has_function(id) {
        Ok(())
    } else {
        Err(dangling("function", id.0 as u64))
    }
}

fn validate_script(script: &Script) -> Result<(), DeserializationError> {
    if let Some(entry) = script.entry {
        check_stmt(script, entry)?;
    }

    for stmt in &script.statements {
        if let Some(next) = stmt.next {
            check_stmt(script, next)?;
        }
        match &stmt.kind {
            StmtKind::Expression(expr) => check_expr(script, *expr)?,
            StmtKind::Print(args) => {
                for arg in args {
                    check_expr(script, *arg)?;
                }
            }
            StmtKind::Assign { target, value, .. } => {
                for accessor in &target.path {
                    if let Accessor::Index(index) = accessor {
                        check_expr(script, *index)?;
                    }
                }
                check_expr(script, *value)?;
            }
            StmtKind::Local { value, .. } => check_expr(script, *value)?,
            StmtKind::Def { function, .. } => check_function(script, *function)?,
            StmtKind::Flow { argument, .. } => {
                if let Some(argument) = argument {
                    check_expr(script, *argument)?;
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                check_expr(script, *condition)?;
                check_stmt(script, *then_branch)?;
                if let Some(else_branch) = else_branch {
                    check_stmt(script, *else_branch)?;
                }
            }
            StmtKind::While { condition, body } => {
                check_expr(script, *condition)?;
                check_stmt(script, *body)?;
            }
            StmtKind::For { iterable, body, .. } => {
                check_expr(script, *iterable)?;
                check_stmt(script, *body)?;
            }
            StmtKind::Try { body, handler, .. } => {
                check_stmt(script, *body)?;
                check_stmt(script, *handler)?;
            }
        }
    }

    // Children always precede their parent in the arena, which also rules out cycles
    for (index, expr) in script.expressions.iter().enumerate() {
        let child = |id: ExprId| -> Result<(), DeserializationError> {
            if id.index() < index {
                Ok(())
            } else {
                Err(dangling("expression", id.0 as u64))
            }
        };
        match &expr.kind {
            ExprKind::Constant(value) => check_constant(value)?,
            ExprKind::Name(_) | ExprKind::Reference(_) => {}
            ExprKind::Unary { operand, .. } => child(*operand)?,
            ExprKind::Binary { lhs, rhs, .. } => {
                child(*lhs)?;
                child(*rhs)?;
            }
            ExprKind::Call { callee, args } => {
                child(*callee)?;
                for arg in args {
                    child(*arg)?;
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    child(*item)?;
                }
            }
            ExprKind::Dictionary(entries) => {
                for (key, value) in entries {
                    child(*key)?;
                    child(*value)?;
                }
            }
            ExprKind::Index { base, index } => {
                child(*base)?;
                child(*index)?;
            }
            ExprKind::Slice { base, start, end } => {
                child(*base)?;
                for bound in [start, end].into_iter().flatten() {
                    child(*bound)?;
                }
            }
            ExprKind::Member { base, .. } => child(*base)?,
        }
    }

    for function in &script.functions {
        check_stmt(script, function.body)?;
    }
    Ok(())
}

/// Literals can only hold plain data
fn check_constant(value: &Value) -> Result<(), DeserializationError> {
    match value {
        Value::None | Value::Number(_) | Value::Text(_) => Ok(()),
        Value::Array(items) => items.iter().try_for_each(check_constant),
        Value::Dictionary(dict) => dict
            .iter()
            .try_for_each(|(key, value)| check_constant(key).and_then(|_| check_constant(value))),
        Value::Reference(_) | Value::Function(_) => Err(DeserializationError::Corrupt(format!(
            "{} value in a script constant",
            value.type_name()
        ))),
    }
}

/* ===================== Process State ===================== */

/// Encoded process state, opaque to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedState {
    bytes: Vec<u8>,
}

impl SerializedState {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn encode_state(state: &ProcessState, script: &Script) -> Result<SerializedState, EncodeError> {
    let mut out = header(STATE_MAGIC);
    out.extend_from_slice(&fingerprint(script)?);
    out.extend(encode(state)?);
    Ok(SerializedState::from_bytes(out))
}

pub fn decode_state(
    state: &SerializedState,
    script: &Script,
) -> Result<ProcessState, DeserializationError> {
    let rest = strip_header(state.as_bytes(), STATE_MAGIC, "process state")?;
    let saved = rest
        .get(..FINGERPRINT_LEN)
        .ok_or(DeserializationError::Truncated)?;
    let expected =
        fingerprint(script).map_err(|err| DeserializationError::Corrupt(err.to_string()))?;
    if saved != expected {
        return Err(DeserializationError::ScriptMismatch);
    }

    let decoded: ProcessState = decode(&rest[FINGERPRINT_LEN..])?;
    validate_state(&decoded, script)?;
    Ok(decoded)
}

fn check_record(records: &RecordStore, id: RecordId) -> Result<(), DeserializationError> {
    if records.contains(id) {
        Ok(())
    } else {
        Err(dangling("record", id.0))
    }
}

/// Runtime values may point at records and functions; both must exist
fn check_value(value: &Value, records: &RecordStore, script: &Script) -> Result<(), DeserializationError> {
    match value {
        Value::None | Value::Number(_) | Value::Text(_) => Ok(()),
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| check_value(item, records, script)),
        Value::Dictionary(dict) => dict.iter().try_for_each(|(key, value)| {
            check_value(key, records, script)?;
            check_value(value, records, script)
        }),
        Value::Reference(reference) => check_record(records, reference.record),
        Value::Function(Function::Script { def, scope, .. }) => {
            check_function(script, *def)?;
            check_record(records, *scope)
        }
        Value::Function(Function::Builtin(_) | Function::Native { .. }) => Ok(()),
    }
}

fn validate_state(state: &ProcessState, script: &Script) -> Result<(), DeserializationError> {
    let records = &state.records;
    check_record(records, state.global)?;

    for (id, record) in records.iter() {
        if id.0 >= records.next_id() {
            return Err(DeserializationError::Corrupt(format!(
                "record {} is beyond the allocation counter {}",
                id.0,
                records.next_id()
            )));
        }
        if let Some(parent) = record.parent {
            check_record(records, parent)?;
            // parents are always allocated first, which also rules out cycles
            if parent >= id {
                return Err(DeserializationError::Corrupt(format!(
                    "record {} has parent {} that is not older",
                    id.0, parent.0
                )));
            }
        }
        for var in record.variables() {
            check_value(&var.value, records, script)?;
        }
    }

    for frame in &state.frames {
        check_record(records, frame.record)?;
        if let Some(current) = frame.current {
            check_stmt(script, current)?;
        }
        if let Some(function) = frame.function {
            check_function(script, function)?;
        }
        for entry in &frame.control {
            match entry {
                ControlEntry::Branch { resume } => {
                    if let Some(resume) = resume {
                        check_stmt(script, *resume)?;
                    }
                }
                ControlEntry::Loop { head } => check_stmt(script, *head)?,
                ControlEntry::Iteration { head, items, .. } => {
                    check_stmt(script, *head)?;
                    for item in items {
                        check_value(item, records, script)?;
                    }
                }
                ControlEntry::Guard { handler } => check_stmt(script, *handler)?,
            }
        }
        for task in frame.evaluator.tasks() {
            let (Task::Eval(expr) | Task::Apply(expr) | Task::Decide(expr)) = task;
            check_expr(script, *expr)?;
        }
        for operand in frame.evaluator.operands() {
            check_value(operand, records, script)?;
        }
    }

    if let Status::Finished(value) = &state.status {
        check_value(value, records, script)?;
    }
    Ok(())
}
