//! Statement handlers
//!
//! Each handler executes one statement of the topmost context and leaves the
//! context's `current` pointer and control stack describing what runs next.
//! Handlers whose expressions reach a script-function call push the callee's
//! context and return without advancing; the statement runs again after the
//! callee returns, and its evaluator continues where it stopped.

use tracing::{debug, trace};

use super::context::Context;
use super::expressions::{Env, Invocation, Poll};
use super::natives::NativeRegistry;
use super::process::{Limits, ProcessState, Status};
use crate::interpreter::errors::{
    EvaluationError, EvaluationErrorKind, ProcessError, UnhandledScriptError,
};
use crate::interpreter::types::{
    Accessor, AssignOp, ControlEntry, ExprId, FlowKind, Function, Position, Script, StmtId,
    StmtKind, Value,
};

/// Borrowed view of a process for the duration of a run
pub struct Machine<'a> {
    pub script: &'a Script,
    pub natives: &'a NativeRegistry,
    pub limits: &'a Limits,
    pub state: &'a mut ProcessState,
}

type ExecResult<T = ()> = Result<T, ProcessError>;

/* ===================== Dispatch ===================== */

pub fn execute(machine: &mut Machine<'_>, id: StmtId) -> ExecResult {
    let script = machine.script;
    let stmt = script.stmt(id);
    let pos = stmt.pos;
    trace!(stmt = id.0, line = pos.line, "execute");

    match &stmt.kind {
        StmtKind::Expression(expr) => {
            if evaluate(machine, &[*expr])?.is_some() {
                goto(machine, stmt.next);
            }
        }

        StmtKind::Print(args) => {
            let Some(values) = evaluate(machine, args)? else {
                return Ok(());
            };
            let scope = env(machine);
            let rendered = values
                .into_iter()
                .map(|value| scope.deref(value).map(|v| v.to_string()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|kind| kind.at(pos))?;
            let line = rendered.join(" ");
            trace!(output = %line, "print");
            machine.state.output.push(line);
            goto(machine, stmt.next);
        }

        StmtKind::Assign { target, op, value } => {
            let mut roots: Vec<ExprId> = target
                .path
                .iter()
                .filter_map(|accessor| match accessor {
                    Accessor::Index(expr) => Some(*expr),
                    Accessor::Member(_) => None,
                })
                .collect();
            roots.push(*value);
            let Some(mut values) = evaluate(machine, &roots)? else {
                return Ok(());
            };
            let value = values.pop().unwrap_or(Value::None);
            env(machine)
                .assign(&target.name, &target.path, values, *op, value)
                .map_err(|kind| kind.at(pos))?;
            goto(machine, stmt.next);
        }

        StmtKind::Local { name, value } => {
            let Some(value) = evaluate_one(machine, *value)? else {
                return Ok(());
            };
            env(machine)
                .define_local(name, value)
                .map_err(|kind| kind.at(pos))?;
            goto(machine, stmt.next);
        }

        StmtKind::Def { name, function } => {
            let mut scope_env = env(machine);
            let scope = scope_env.local;
            // Closures keep their defining record alive past its frame
            scope_env.records.pin(scope);
            let function = Value::Function(Function::Script {
                def: *function,
                scope,
                name: name.clone(),
            });
            scope_env
                .define_local(name, function)
                .map_err(|kind| kind.at(pos))?;
            goto(machine, stmt.next);
        }

        StmtKind::Flow { kind, argument } => execute_flow(machine, *kind, *argument, stmt.next, pos)?,

        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let Some(truthy) = evaluate_condition(machine, *condition, pos)? else {
                return Ok(());
            };
            let branch = if truthy { Some(*then_branch) } else { *else_branch };
            match branch {
                Some(first) => enter(machine, ControlEntry::Branch { resume: stmt.next }, first),
                None => goto(machine, stmt.next),
            }
        }

        StmtKind::While { condition, body } => {
            let Some(truthy) = evaluate_condition(machine, *condition, pos)? else {
                return Ok(());
            };
            if truthy {
                enter(machine, ControlEntry::Loop { head: id }, *body);
            } else {
                goto(machine, stmt.next);
            }
        }

        StmtKind::For { iterable, .. } => {
            let Some(iterable) = evaluate_one(machine, *iterable)? else {
                return Ok(());
            };
            let iterable = env(machine).deref(iterable).map_err(|kind| kind.at(pos))?;
            let items = match iterable {
                Value::Array(items) => items,
                Value::Dictionary(dict) => dict.keys().cloned().collect(),
                Value::Text(text) => text.chars().map(|c| Value::Text(c.to_string())).collect(),
                other => {
                    return Err(EvaluationErrorKind::unary_mismatch("for", &other)
                        .at(pos)
                        .into())
                }
            };
            next_iteration(machine, id, items, 0)?;
        }

        StmtKind::Try { body, .. } => {
            enter(machine, ControlEntry::Guard { handler: id }, *body);
        }
    }
    Ok(())
}

fn execute_flow(
    machine: &mut Machine<'_>,
    kind: FlowKind,
    argument: Option<ExprId>,
    next: Option<StmtId>,
    pos: Position,
) -> ExecResult {
    let value = match argument {
        Some(expr) => match evaluate_one(machine, expr)? {
            Some(value) => value,
            None => return Ok(()),
        },
        None => Value::None,
    };

    match kind {
        FlowKind::Pass => goto(machine, next),
        FlowKind::Break | FlowKind::Continue => {
            let count = match argument {
                Some(_) => loop_count(machine, kind, value, pos)?,
                None => 1,
            };
            jump_loop(machine, kind, count, pos)?;
        }
        FlowKind::Return => return_from_frame(machine, value),
        FlowKind::Throw => {
            let value = env(machine).deref(value).map_err(|kind| kind.at(pos))?;
            throw(machine, value, pos)?;
        }
    }
    Ok(())
}

/* ===================== Evaluation Helpers ===================== */

/// Evaluate `roots` in the top context
///
/// `None` means a script call was reached and its context has been pushed.
fn evaluate(machine: &mut Machine<'_>, roots: &[ExprId]) -> ExecResult<Option<Vec<Value>>> {
    let depth = machine.state.frames.len();
    let ProcessState {
        records, frames, ..
    } = &mut *machine.state;
    let Some(frame) = frames.last_mut() else {
        return Err(no_context());
    };
    let mut scope = Env {
        records,
        local: frame.record,
        natives: machine.natives,
        depth,
        max_depth: machine.limits.max_call_depth,
    };

    match frame.evaluator.evaluate(roots, machine.script, &mut scope)? {
        Poll::Ready(values) => Ok(Some(values)),
        Poll::Call(invocation) => {
            push_frame(machine, invocation);
            Ok(None)
        }
    }
}

fn evaluate_one(machine: &mut Machine<'_>, root: ExprId) -> ExecResult<Option<Value>> {
    Ok(evaluate(machine, &[root])?.and_then(|mut values| values.pop()))
}

fn evaluate_condition(
    machine: &mut Machine<'_>,
    condition: ExprId,
    pos: Position,
) -> ExecResult<Option<bool>> {
    let Some(value) = evaluate_one(machine, condition)? else {
        return Ok(None);
    };
    let value = env(machine).deref(value).map_err(|kind| kind.at(pos))?;
    Ok(Some(value.is_truthy()))
}

/// Environment rooted at the top context's record
fn env<'m>(machine: &'m mut Machine<'_>) -> Env<'m> {
    let state = &mut *machine.state;
    let local = state
        .frames
        .last()
        .map_or(state.global, |frame| frame.record);
    Env {
        local,
        depth: state.frames.len(),
        records: &mut state.records,
        natives: machine.natives,
        max_depth: machine.limits.max_call_depth,
    }
}

fn no_context() -> ProcessError {
    EvaluationError {
        kind: EvaluationErrorKind::InvalidFlow("no active context".to_string()),
        pos: Position::default(),
    }
    .into()
}

/* ===================== Control Flow ===================== */

fn goto(machine: &mut Machine<'_>, next: Option<StmtId>) {
    if let Some(frame) = machine.state.frames.last_mut() {
        frame.current = next;
    }
}

/// Start a compound, remembering how to leave it
fn enter(machine: &mut Machine<'_>, entry: ControlEntry, first: StmtId) {
    if let Some(frame) = machine.state.frames.last_mut() {
        frame.control.push(entry);
        frame.current = Some(first);
    }
}

/// The top context's chain ran out: pop control markers until a statement is found
///
/// Returns `None` when the context itself completed (its control stack was empty).
pub fn resolve_chain_end(machine: &mut Machine<'_>) -> ExecResult<Option<StmtId>> {
    let script = machine.script;
    loop {
        let Some(frame) = machine.state.frames.last_mut() else {
            return Ok(None);
        };
        if let Some(id) = frame.current {
            return Ok(Some(id));
        }
        match frame.control.pop() {
            None => {
                return_from_frame(machine, Value::None);
                return Ok(None);
            }
            Some(ControlEntry::Branch { resume }) => frame.current = resume,
            Some(ControlEntry::Loop { head }) => frame.current = Some(head),
            Some(ControlEntry::Guard { handler }) => frame.current = script.stmt(handler).next,
            Some(ControlEntry::Iteration { head, items, index }) => {
                next_iteration(machine, head, items, index)?;
            }
        }
    }
}

/// Bind the item at `index` and enter the body, or leave the loop when exhausted
fn next_iteration(
    machine: &mut Machine<'_>,
    head: StmtId,
    items: Vec<Value>,
    index: usize,
) -> ExecResult {
    let script = machine.script;
    let stmt = script.stmt(head);
    let StmtKind::For { variable, body, .. } = &stmt.kind else {
        return Err(no_context());
    };

    let Some(item) = items.get(index).cloned() else {
        goto(machine, stmt.next);
        return Ok(());
    };
    enter(
        machine,
        ControlEntry::Iteration {
            head,
            items,
            index: index + 1,
        },
        *body,
    );
    env(machine)
        .assign(variable, &[], Vec::new(), AssignOp::Set, item)
        .map_err(|kind| kind.at(stmt.pos))?;
    Ok(())
}

fn loop_count(machine: &mut Machine<'_>, kind: FlowKind, value: Value, pos: Position) -> ExecResult<usize> {
    let value = env(machine).deref(value).map_err(|k| k.at(pos))?;
    match value.as_integer() {
        Some(n) if n >= 1 => Ok(n as usize),
        _ => Err(EvaluationErrorKind::InvalidFlow(format!(
            "{} count must be a positive integer, got {}",
            kind.keyword(),
            value.repr()
        ))
        .at(pos)
        .into()),
    }
}

/// `break n` leaves the n-th enclosing loop; `continue n` starts its next iteration
fn jump_loop(machine: &mut Machine<'_>, kind: FlowKind, count: usize, pos: Position) -> ExecResult {
    let script = machine.script;
    let Some(frame) = machine.state.frames.last_mut() else {
        return Err(no_context());
    };

    let available = frame.loop_depth();
    if count > available {
        return Err(EvaluationErrorKind::InvalidFlow(format!(
            "cannot {} {} loop(s), only {} enclosing",
            kind.keyword(),
            count,
            available
        ))
        .at(pos)
        .into());
    }

    // Discard everything above the target loop
    let mut remaining = count;
    while let Some(entry) = frame.control.last() {
        if entry.is_loop() {
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        frame.control.pop();
    }

    if kind == FlowKind::Continue {
        // Chain-end resolution re-tests the loop or binds the next item
        frame.current = None;
        return Ok(());
    }
    frame.current = match frame.control.pop() {
        Some(ControlEntry::Loop { head }) | Some(ControlEntry::Iteration { head, .. }) => {
            script.stmt(head).next
        }
        _ => return Err(no_context()),
    };
    Ok(())
}

/// Transfer control to the nearest enclosing catch, searching outward across contexts
fn throw(machine: &mut Machine<'_>, value: Value, pos: Position) -> ExecResult {
    let script = machine.script;

    while let Some(frame) = machine.state.frames.last_mut() {
        let guard = frame
            .control
            .iter()
            .enumerate()
            .rev()
            .find_map(|(at, entry)| match entry {
                ControlEntry::Guard { handler } => Some((at, *handler)),
                _ => None,
            });

        let Some((at, try_stmt)) = guard else {
            if frame.is_module() {
                break;
            }
            pop_frame(machine);
            continue;
        };

        let stmt = script.stmt(try_stmt);
        let StmtKind::Try {
            binding, handler, ..
        } = &stmt.kind
        else {
            return Err(no_context());
        };

        frame.control.truncate(at);
        frame.control.push(ControlEntry::Branch { resume: stmt.next });
        frame.current = Some(*handler);
        // A caller may have been mid-expression when the callee threw
        frame.evaluator.reset();

        if let Some(name) = binding {
            env(machine)
                .define_local(name, value)
                .map_err(|kind| kind.at(pos))?;
        }
        debug!(line = stmt.pos.line, "caught script error");
        return Ok(());
    }

    Err(UnhandledScriptError { value, pos }.into())
}

/* ===================== Frames ===================== */

fn push_frame(machine: &mut Machine<'_>, invocation: Invocation) {
    let context = Context::call(invocation, machine.script);
    debug!(
        function = %machine.script.function(invocation.function).name,
        depth = machine.state.frames.len() + 1,
        "push context"
    );
    machine.state.frames.push(context);
}

/// Remove the top context, releasing its record unless something captured it
fn pop_frame(machine: &mut Machine<'_>) -> Option<Context> {
    let context = machine.state.frames.pop()?;
    if !context.is_module() {
        machine.state.records.release(context.record);
    }
    debug!(depth = machine.state.frames.len(), "pop context");
    Some(context)
}

/// Leave the top context, handing `value` to the caller's evaluator
///
/// Leaving the module-level context finishes the process with `value`.
fn return_from_frame(machine: &mut Machine<'_>, value: Value) {
    pop_frame(machine);
    match machine.state.frames.last_mut() {
        Some(caller) => caller.evaluator.deliver(value),
        None => finish(machine, value),
    }
}

pub fn finish(machine: &mut Machine<'_>, value: Value) {
    machine.state.frames.clear();
    debug!(result = %value, "process finished");
    machine.state.status = Status::Finished(value);
}
