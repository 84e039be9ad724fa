//! Execution contexts (frames)

use serde::{Deserialize, Serialize};

use super::expressions::{Evaluator, Invocation};
use crate::interpreter::types::{ControlEntry, FuncId, RecordId, Script, StmtId};

/// One frame of a process: where it is, what it has entered, and its locals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Local record (the global record for the module-level context)
    pub record: RecordId,
    pub control: Vec<ControlEntry>,
    /// Statement to execute next; `None` once the current chain has run out
    pub current: Option<StmtId>,
    pub evaluator: Evaluator,
    /// Function being executed; `None` for the module-level context
    pub function: Option<FuncId>,
}

impl Context {
    pub fn module(global: RecordId, entry: Option<StmtId>) -> Self {
        Self {
            record: global,
            control: Vec::new(),
            current: entry,
            evaluator: Evaluator::new(),
            function: None,
        }
    }

    pub fn call(invocation: Invocation, script: &Script) -> Self {
        Self {
            record: invocation.record,
            control: Vec::new(),
            current: Some(script.function(invocation.function).body),
            evaluator: Evaluator::new(),
            function: Some(invocation.function),
        }
    }

    pub fn is_module(&self) -> bool {
        self.function.is_none()
    }

    /// Number of enclosing loops in this frame
    pub fn loop_depth(&self) -> usize {
        self.control.iter().filter(|entry| entry.is_loop()).count()
    }
}
