//! Core execution loop
//!
//! `step()` is the heart of the interpreter: it advances the topmost context
//! by one statement (or completes it), and never recurses. Everything it
//! touches lives in [`ProcessState`], so the process can be suspended after
//! any step.
//!
//! ## Function Organization
//! 1. run() - bounded driver (calls step repeatedly)
//! 2. step() - one statement execution or frame completion
//! 3. advance() - resolve the next statement and dispatch it
//!
//! Unreachable records are collected between steps, never inside one.

use tracing::warn;

use super::natives::NativeRegistry;
use super::process::{Limits, ProcessState, Status};
use super::statements::{self, Machine};
use crate::interpreter::errors::ProcessError;
use crate::interpreter::types::{Script, Value};

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More statements remain
    Continue,
    /// The process has finished
    Done,
}

/* ===================== Public API ===================== */

/// Run up to `max_steps` steps, stopping early when the process finishes or fails
pub fn run(
    script: &Script,
    natives: &NativeRegistry,
    limits: &Limits,
    state: &mut ProcessState,
    max_steps: usize,
) -> Result<Step, ProcessError> {
    let mut machine = Machine {
        script,
        natives,
        limits,
        state,
    };

    if let Some(step) = terminal(machine.state)? {
        return Ok(step);
    }
    for _ in 0..max_steps {
        if step(&mut machine)? == Step::Done {
            return Ok(Step::Done);
        }
    }
    Ok(Step::Continue)
}

/// Execute one step
///
/// A step is one statement execution, or the completion of a context whose
/// statement chain and control stack are both exhausted. Control markers left
/// by finished branches and loop bodies are resolved within the same step.
pub fn step(machine: &mut Machine<'_>) -> Result<Step, ProcessError> {
    if let Some(step) = terminal(machine.state)? {
        return Ok(step);
    }

    if let Err(err) = advance(machine) {
        warn!(error = %err, "process failed");
        machine.state.frames.clear();
        machine.state.status = Status::Failed(err.clone());
        return Err(err);
    }
    if machine.state.records.should_collect() {
        machine.state.collect_records();
    }

    match machine.state.status {
        Status::Running => Ok(Step::Continue),
        _ => Ok(Step::Done),
    }
}

/// Already-terminated processes keep reporting their outcome
fn terminal(state: &ProcessState) -> Result<Option<Step>, ProcessError> {
    match &state.status {
        Status::Running => Ok(None),
        Status::Finished(_) => Ok(Some(Step::Done)),
        Status::Failed(err) => Err(err.clone()),
    }
}

fn advance(machine: &mut Machine<'_>) -> Result<(), ProcessError> {
    let Some(frame) = machine.state.frames.last() else {
        // Nothing left to run: falling off the end of the module
        statements::finish(machine, Value::None);
        return Ok(());
    };

    let current = frame.current;
    let current = match current {
        Some(id) => id,
        None => match statements::resolve_chain_end(machine)? {
            Some(id) => id,
            None => return Ok(()),
        },
    };
    statements::execute(machine, current)
}
