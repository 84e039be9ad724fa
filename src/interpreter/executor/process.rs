//! Process - one running (or suspended) instance of a compiled script
//!
//! A process owns its records, its context stack and its printed output; the
//! script is shared read-only through an `Arc`. All of [`ProcessState`] is
//! serializable, which is what makes [`Process::suspend`] and
//! [`Process::resume`] possible between any two steps.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::Context;
use super::exec_loop::{self, Step};
use super::natives::NativeRegistry;
use super::stdlib::inject_stdlib;
use crate::interpreter::codec::{self, SerializedState};
use crate::interpreter::errors::{DeserializationError, EncodeError, ProcessError};
use crate::interpreter::types::{ControlEntry, Function, RecordId, RecordStore, Script, Value};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Host-imposed resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of contexts on the stack, module context included
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Status {
    Running,
    /// Completed with the module-level return value (`none` when it fell off the end)
    Finished(Value),
    Failed(ProcessError),
}

/// Everything that is persisted when a process is suspended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub records: RecordStore,
    pub global: RecordId,
    pub frames: Vec<Context>,
    pub status: Status,
    /// Printed lines not yet taken by the host
    pub output: Vec<String>,
}

impl ProcessState {
    /// Free the records nothing live can reach any more
    ///
    /// Roots are the global record, every frame's record and the values held
    /// by evaluators, `for` loops and a finished result.
    pub fn collect_records(&mut self) -> usize {
        let roots = std::iter::once(self.global).chain(self.frames.iter().map(|frame| frame.record));
        let mut values: Vec<&Value> = Vec::new();
        for frame in &self.frames {
            values.extend(frame.evaluator.operands());
            for entry in &frame.control {
                if let ControlEntry::Iteration { items, .. } = entry {
                    values.extend(items);
                }
            }
        }
        if let Status::Finished(value) = &self.status {
            values.push(value);
        }

        let freed = self.records.collect(roots, values);
        debug!(freed, live = self.records.len(), "collected records");
        freed
    }
}

/// Outcome of a bounded run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The step budget ran out first
    Running,
    Finished,
}

#[derive(Debug)]
pub struct Process {
    script: Arc<Script>,
    natives: NativeRegistry,
    limits: Limits,
    state: ProcessState,
}

impl Process {
    pub fn new(script: Arc<Script>) -> Self {
        let mut records = RecordStore::new();
        let global = records.allocate(None);
        if let Some(record) = records.get_mut(global) {
            inject_stdlib(record);
        }
        let frames = vec![Context::module(global, script.entry)];
        debug!(statements = script.statements.len(), "process created");

        Self {
            script,
            natives: NativeRegistry::new(),
            limits: Limits::default(),
            state: ProcessState {
                records,
                global,
                frames,
                status: Status::Running,
                output: Vec::new(),
            },
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Define (or overwrite) a global before or between runs
    pub fn install(&mut self, name: &str, value: Value) {
        if let Some(record) = self.state.records.get_mut(self.state.global) {
            record.define(name, value);
        }
    }

    /// Register a host callable and expose it as the global `name`
    pub fn install_native<F>(&mut self, name: &str, arity: Option<usize>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register_native(name, arity, func);
        self.install(
            name,
            Value::Function(Function::Native {
                name: name.to_string(),
            }),
        );
    }

    /// Register a host callable without touching globals (after [`Process::resume`])
    pub fn register_native<F>(&mut self, name: &str, arity: Option<usize>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.natives.register(name, arity, func);
    }

    /// Execute up to `max_steps` steps
    ///
    /// Evaluation errors and unhandled throws terminate the process; the same
    /// error is returned again by every later call.
    pub fn run(&mut self, max_steps: usize) -> Result<RunStatus, ProcessError> {
        let step = exec_loop::run(
            &self.script,
            &self.natives,
            &self.limits,
            &mut self.state,
            max_steps,
        )?;
        Ok(match step {
            Step::Continue => RunStatus::Running,
            Step::Done => RunStatus::Finished,
        })
    }

    pub fn step(&mut self) -> Result<RunStatus, ProcessError> {
        self.run(1)
    }

    /// Serialize the complete execution state
    pub fn suspend(&self) -> Result<SerializedState, EncodeError> {
        let state = codec::encode_state(&self.state, &self.script)?;
        debug!(bytes = state.len(), depth = self.depth(), "process suspended");
        Ok(state)
    }

    /// Rebuild a process from a suspended state and the script it was running
    ///
    /// Natives are not part of the state; re-register them with
    /// [`Process::register_native`] before continuing.
    pub fn resume(state: &SerializedState, script: Arc<Script>) -> Result<Self, DeserializationError> {
        let state = codec::decode_state(state, &script)?;
        debug!(depth = state.frames.len(), "process resumed");
        Ok(Self {
            script,
            natives: NativeRegistry::new(),
            limits: Limits::default(),
            state,
        })
    }

    /* ===================== Inspection ===================== */

    /// Global value as stored (references are not followed)
    pub fn global(&self, name: &str) -> Option<Value> {
        self.state
            .records
            .get(self.state.global)
            .and_then(|record| record.get(name))
            .cloned()
    }

    pub fn globals(&self) -> BTreeMap<String, Value> {
        self.state
            .records
            .get(self.state.global)
            .map(|record| {
                record
                    .variables()
                    .iter()
                    .map(|var| (var.name.clone(), var.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drain printed lines
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.state.output)
    }

    pub fn output(&self) -> &[String] {
        &self.state.output
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state.status, Status::Finished(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state.status, Status::Running)
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.state.status {
            Status::Finished(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ProcessError> {
        match &self.state.status {
            Status::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Contexts currently on the stack
    pub fn depth(&self) -> usize {
        self.state.frames.len()
    }

    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }
}
