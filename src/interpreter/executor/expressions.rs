//! Expression evaluation as an explicit stack machine
//!
//! The evaluator never recurses on the native stack. Pending work lives in
//! `tasks` and intermediate results in `operands`, both serializable, so an
//! evaluation interrupted by a script-function call is part of the suspended
//! state. When a call to a script function is reached the evaluator returns
//! [`Poll::Call`]; the executor pushes a frame, and once that frame returns it
//! hands the result back through [`Evaluator::deliver`] and evaluation picks
//! up exactly where it stopped.

use serde::{Deserialize, Serialize};

use super::natives::NativeRegistry;
use crate::interpreter::errors::{EvaluationError, EvaluationErrorKind};
use crate::interpreter::types::operators::{self, OpResult};
use crate::interpreter::types::{
    Accessor, AssignOp, BinaryOp, Dictionary, ExprId, ExprKind, FuncId, Function, RecordId,
    RecordStore, Reference, Script, Value,
};

/// Longest chain of references followed before giving up
const MAX_REFERENCE_HOPS: usize = 64;

/* ===================== Evaluator ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Schedule the children of an expression
    Eval(ExprId),
    /// Combine the evaluated children of an expression
    Apply(ExprId),
    /// Left operand of `and`/`or` is ready: keep it or evaluate the right side
    Decide(ExprId),
}

/// A script function call the executor must run in a new context
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Invocation {
    pub function: FuncId,
    /// Fresh record with the arguments bound, parented to the captured scope
    pub record: RecordId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    /// One value per requested root, in order
    Ready(Vec<Value>),
    Call(Invocation),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evaluator {
    tasks: Vec<Task>,
    operands: Vec<Value>,
    /// An evaluation has been seeded and not yet produced its values
    active: bool,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        !self.active
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// Drop any half-finished evaluation (its frame is being unwound)
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.operands.clear();
        self.active = false;
    }

    /// Result of the script call this evaluator was waiting on
    pub fn deliver(&mut self, value: Value) {
        self.operands.push(value);
    }

    /// Evaluate `roots` left to right, or continue an interrupted evaluation of them
    pub fn evaluate(
        &mut self,
        roots: &[ExprId],
        script: &Script,
        env: &mut Env<'_>,
    ) -> Result<Poll, EvaluationError> {
        if !self.active {
            self.tasks.clear();
            self.operands.clear();
            self.tasks.extend(roots.iter().rev().map(|id| Task::Eval(*id)));
            self.active = true;
        }

        while let Some(task) = self.tasks.pop() {
            let outcome = match task {
                Task::Eval(id) => self.schedule(id, script, env),
                Task::Decide(id) => self.decide(id, script, env),
                Task::Apply(id) => self.apply(id, script, env),
            };
            match outcome {
                Ok(None) => {}
                Ok(Some(invocation)) => return Ok(Poll::Call(invocation)),
                Err(kind) => {
                    let pos = match task {
                        Task::Eval(id) | Task::Decide(id) | Task::Apply(id) => script.expr(id).pos,
                    };
                    self.reset();
                    return Err(kind.at(pos));
                }
            }
        }

        self.active = false;
        Ok(Poll::Ready(std::mem::take(&mut self.operands)))
    }

    fn schedule(&mut self, id: ExprId, script: &Script, env: &mut Env<'_>) -> OpResult<Option<Invocation>> {
        match &script.expr(id).kind {
            ExprKind::Constant(value) => self.operands.push(value.clone()),
            ExprKind::Name(name) => self.operands.push(env.lookup(name)?),
            ExprKind::Reference(name) => self.operands.push(env.make_reference(name)?),
            ExprKind::Unary { operand, .. } => {
                self.tasks.push(Task::Apply(id));
                self.tasks.push(Task::Eval(*operand));
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_short_circuit() {
                    self.tasks.push(Task::Decide(id));
                } else {
                    self.tasks.push(Task::Apply(id));
                    self.tasks.push(Task::Eval(*rhs));
                }
                self.tasks.push(Task::Eval(*lhs));
            }
            ExprKind::Call { callee, args } => {
                self.tasks.push(Task::Apply(id));
                self.tasks.extend(args.iter().rev().map(|arg| Task::Eval(*arg)));
                self.tasks.push(Task::Eval(*callee));
            }
            ExprKind::Array(items) => {
                self.tasks.push(Task::Apply(id));
                self.tasks.extend(items.iter().rev().map(|item| Task::Eval(*item)));
            }
            ExprKind::Dictionary(entries) => {
                self.tasks.push(Task::Apply(id));
                for (key, value) in entries.iter().rev() {
                    self.tasks.push(Task::Eval(*value));
                    self.tasks.push(Task::Eval(*key));
                }
            }
            ExprKind::Index { base, index } => {
                self.tasks.push(Task::Apply(id));
                self.tasks.push(Task::Eval(*index));
                self.tasks.push(Task::Eval(*base));
            }
            ExprKind::Slice { base, start, end } => {
                self.tasks.push(Task::Apply(id));
                self.tasks.extend(end.iter().chain(start.iter()).map(|e| Task::Eval(*e)));
                self.tasks.push(Task::Eval(*base));
            }
            ExprKind::Member { base, .. } => {
                self.tasks.push(Task::Apply(id));
                self.tasks.push(Task::Eval(*base));
            }
        }
        Ok(None)
    }

    fn decide(&mut self, id: ExprId, script: &Script, env: &mut Env<'_>) -> OpResult<Option<Invocation>> {
        let ExprKind::Binary { op, rhs, .. } = &script.expr(id).kind else {
            return Err(internal("decide on a non-binary expression"));
        };
        let lhs = env.deref(self.pop()?)?;
        let decided = match op {
            BinaryOp::Or => lhs.is_truthy(),
            _ => !lhs.is_truthy(),
        };
        if decided {
            self.operands.push(lhs);
        } else {
            self.tasks.push(Task::Eval(*rhs));
        }
        Ok(None)
    }

    fn apply(&mut self, id: ExprId, script: &Script, env: &mut Env<'_>) -> OpResult<Option<Invocation>> {
        let value = match &script.expr(id).kind {
            ExprKind::Unary { op, .. } => {
                let operand = env.deref(self.pop()?)?;
                operators::unary(*op, &operand)?
            }
            ExprKind::Binary { op, .. } => {
                let rhs = env.deref(self.pop()?)?;
                let lhs = env.deref(self.pop()?)?;
                operators::binary(*op, &lhs, &rhs)?
            }
            ExprKind::Call { args, .. } => {
                let args = self.pop_many(args.len())?;
                let callee = env.deref(self.pop()?)?;
                match call(callee, args, script, env)? {
                    Called::Value(value) => value,
                    Called::Script(invocation) => return Ok(Some(invocation)),
                }
            }
            ExprKind::Array(items) => Value::Array(self.pop_many(items.len())?),
            ExprKind::Dictionary(entries) => {
                let flat = self.pop_many(entries.len() * 2)?;
                let mut dict = Dictionary::new();
                let mut iter = flat.into_iter();
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    dict.insert(env.deref(key)?, value);
                }
                Value::Dictionary(dict)
            }
            ExprKind::Index { .. } => {
                let index = env.deref(self.pop()?)?;
                let base = env.deref(self.pop()?)?;
                operators::index(&base, &index)?
            }
            ExprKind::Slice { start, end, .. } => {
                let end = match end {
                    Some(_) => Some(env.deref(self.pop()?)?),
                    None => None,
                };
                let start = match start {
                    Some(_) => Some(env.deref(self.pop()?)?),
                    None => None,
                };
                let base = env.deref(self.pop()?)?;
                operators::slice(&base, start.as_ref(), end.as_ref())?
            }
            ExprKind::Member { name, .. } => {
                let base = env.deref(self.pop()?)?;
                operators::member(&base, name)?
            }
            ExprKind::Constant(_) | ExprKind::Name(_) | ExprKind::Reference(_) => {
                return Err(internal("apply on a leaf expression"))
            }
        };
        self.operands.push(value);
        Ok(None)
    }

    fn pop(&mut self) -> OpResult {
        self.operands
            .pop()
            .ok_or_else(|| internal("operand stack underflow"))
    }

    fn pop_many(&mut self, count: usize) -> OpResult<Vec<Value>> {
        let Some(split) = self.operands.len().checked_sub(count) else {
            return Err(internal("operand stack underflow"));
        };
        Ok(self.operands.split_off(split))
    }
}

/// Broken evaluator invariants surface as errors rather than panics; they can
/// only arise from state that was tampered with between suspend and resume
fn internal(message: &str) -> EvaluationErrorKind {
    EvaluationErrorKind::InvalidFlow(format!("corrupt evaluator state: {}", message))
}

/* ===================== Calls ===================== */

enum Called {
    Value(Value),
    Script(Invocation),
}

fn call(callee: Value, args: Vec<Value>, script: &Script, env: &mut Env<'_>) -> OpResult<Called> {
    let function = match callee {
        Value::Function(function) => function,
        other => return Err(EvaluationErrorKind::NotCallable(other.type_name().to_string())),
    };

    match function {
        Function::Script { def, scope, name } => {
            let params = &script.function(def).params;
            if params.len() != args.len() {
                return Err(EvaluationErrorKind::ArityMismatch {
                    name,
                    expected: params.len().to_string(),
                    given: args.len(),
                });
            }
            if env.depth >= env.max_depth {
                return Err(EvaluationErrorKind::CallDepthExceeded(env.max_depth));
            }
            let record = env.records.allocate(Some(scope));
            if let Some(locals) = env.records.get_mut(record) {
                for (param, arg) in params.iter().zip(args) {
                    locals.define(param, arg);
                }
            }
            Ok(Called::Script(Invocation {
                function: def,
                record,
            }))
        }
        Function::Builtin(builtin) => {
            let args = env.deref_all(args)?;
            builtin.call(&args).map(Called::Value)
        }
        Function::Native { name } => {
            let args = env.deref_all(args)?;
            env.natives.call(&name, &args).map(Called::Value)
        }
    }
}

/* ===================== Environment ===================== */

/// Everything an evaluation may read or write besides the script itself
pub struct Env<'a> {
    pub records: &'a mut RecordStore,
    /// Record of the executing context
    pub local: RecordId,
    pub natives: &'a NativeRegistry,
    /// Contexts currently on the stack
    pub depth: usize,
    pub max_depth: usize,
}

impl Env<'_> {
    /// Value of `name` as seen from the local record; references are followed
    pub fn lookup(&self, name: &str) -> OpResult {
        let record = self
            .records
            .resolve(self.local, name)
            .ok_or_else(|| EvaluationErrorKind::UndefinedName(name.to_string()))?;
        let value = self.read(record, name)?;
        self.deref(value)
    }

    /// `&name`: alias of the slot `name` resolves to
    pub fn make_reference(&mut self, name: &str) -> OpResult {
        let record = self
            .records
            .resolve(self.local, name)
            .ok_or_else(|| EvaluationErrorKind::UndefinedName(name.to_string()))?;
        let current = self.read(record, name)?;
        if let Value::Reference(_) = current {
            return Ok(current);
        }
        self.records.pin(record);
        Ok(Value::Reference(Reference {
            record,
            name: name.to_string(),
        }))
    }

    /// Follow references until a plain value is reached
    pub fn deref(&self, value: Value) -> OpResult {
        let mut current = value;
        for _ in 0..MAX_REFERENCE_HOPS {
            match current {
                Value::Reference(Reference { record, name }) => {
                    current = self.read(record, &name)?;
                }
                other => return Ok(other),
            }
        }
        Err(EvaluationErrorKind::InvalidArgument(
            "reference chain too long (cyclic reference?)".to_string(),
        ))
    }

    pub fn deref_all(&self, values: Vec<Value>) -> OpResult<Vec<Value>> {
        values.into_iter().map(|v| self.deref(v)).collect()
    }

    fn read(&self, record: RecordId, name: &str) -> OpResult {
        self.records
            .get(record)
            .and_then(|r| r.get(name))
            .cloned()
            .ok_or_else(|| EvaluationErrorKind::NotFound(format!("variable '{}'", name)))
    }

    /// Define `name` in the local record, shadowing outer bindings
    pub fn define_local(&mut self, name: &str, value: Value) -> OpResult<()> {
        let local = self.local;
        self.records
            .get_mut(local)
            .ok_or_else(|| EvaluationErrorKind::NotFound(format!("record {}", local.0)))?
            .define(name, value);
        Ok(())
    }

    /// Slot an assignment to `name` writes: the nearest existing binding, through
    /// any references it holds; `None` when the name is unbound
    fn write_slot(&self, name: &str) -> OpResult<Option<(RecordId, String)>> {
        let Some(mut record) = self.records.resolve(self.local, name) else {
            return Ok(None);
        };
        let mut slot = name.to_string();
        for _ in 0..MAX_REFERENCE_HOPS {
            match self.read(record, &slot)? {
                Value::Reference(reference) => {
                    record = reference.record;
                    slot = reference.name;
                }
                _ => return Ok(Some((record, slot))),
            }
        }
        Err(EvaluationErrorKind::InvalidArgument(
            "reference chain too long (cyclic reference?)".to_string(),
        ))
    }

    /// Perform `name[path...] op= value`
    ///
    /// Index keys in `keys` correspond, in order, to the `Accessor::Index`
    /// entries of `path`; they are already evaluated.
    pub fn assign(
        &mut self,
        name: &str,
        path: &[Accessor],
        keys: Vec<Value>,
        op: AssignOp,
        value: Value,
    ) -> OpResult<()> {
        // Plain `x = v` on an unbound name creates a local
        let slot = match self.write_slot(name)? {
            Some(slot) => slot,
            None if op == AssignOp::Set && path.is_empty() => (self.local, name.to_string()),
            None => return Err(EvaluationErrorKind::UndefinedName(name.to_string())),
        };

        let keys = self.deref_all(keys)?;
        // Stored as-is for plain assignment so `r = &x` keeps the alias
        let value = match op {
            AssignOp::Set => value,
            _ => self.deref(value)?,
        };

        let (record, slot_name) = slot;
        let record = self
            .records
            .get_mut(record)
            .ok_or_else(|| EvaluationErrorKind::NotFound(format!("variable '{}'", name)))?;
        if !record.contains(&slot_name) {
            record.define(&slot_name, Value::None);
        }
        let Some(mut place) = record.get_mut(&slot_name) else {
            return Err(EvaluationErrorKind::NotFound(format!("variable '{}'", name)));
        };

        let mut keys = keys.into_iter();
        for (i, accessor) in path.iter().enumerate() {
            let key = match accessor {
                Accessor::Index(_) => keys
                    .next()
                    .ok_or_else(|| internal("missing index value for assignment"))?,
                Accessor::Member(member) => Value::text(member.as_str()),
            };
            if let Accessor::Member(member) = accessor {
                if !matches!(place, Value::Dictionary(_)) {
                    return Err(EvaluationErrorKind::NotFound(format!(
                        "member '{}' on {}",
                        member,
                        place.type_name()
                    )));
                }
            }
            let last = i + 1 == path.len();
            place = operators::element_mut(place, &key, last && op == AssignOp::Set)?;
        }

        match op {
            AssignOp::Set => *place = value,
            AssignOp::Sum => operators::sum(place, value)?,
            AssignOp::Subtract => operators::subtract(place, &value)?,
            AssignOp::Multiply => *place = operators::binary(BinaryOp::Multiply, place, &value)?,
            AssignOp::Divide => *place = operators::binary(BinaryOp::Divide, place, &value)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::parser::parse;
    use crate::interpreter::types::StmtKind;

    fn first_expression(script: &Script) -> ExprId {
        match &script.stmt(script.entry.unwrap()).kind {
            StmtKind::Expression(expr) => *expr,
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluates_without_calls() {
        let script = parse("[x, x * 2, {'k': x}.k]\n").unwrap();
        let mut records = RecordStore::new();
        let global = records.allocate(None);
        records.get_mut(global).unwrap().define("x", Value::Number(4.0));
        let natives = NativeRegistry::new();
        let mut env = Env {
            records: &mut records,
            local: global,
            natives: &natives,
            depth: 1,
            max_depth: 8,
        };

        let mut evaluator = Evaluator::new();
        let poll = evaluator
            .evaluate(&[first_expression(&script)], &script, &mut env)
            .unwrap();
        assert_eq!(
            poll,
            Poll::Ready(vec![Value::Array(vec![
                Value::Number(4.0),
                Value::Number(8.0),
                Value::Number(4.0)
            ])])
        );
        assert!(evaluator.is_idle());
    }

    #[test]
    fn test_suspends_at_script_call_and_resumes() {
        let script = parse("def f(a): return a\n1 + f(2) * 10\n").unwrap();
        let call_stmt = script.stmt(script.entry.unwrap()).next.unwrap();
        let StmtKind::Expression(root) = script.stmt(call_stmt).kind else {
            panic!("Expected expression statement");
        };

        let mut records = RecordStore::new();
        let global = records.allocate(None);
        records.get_mut(global).unwrap().define(
            "f",
            Value::Function(Function::Script {
                def: FuncId(0),
                scope: global,
                name: "f".to_string(),
            }),
        );
        let natives = NativeRegistry::new();
        let mut evaluator = Evaluator::new();

        let poll = {
            let mut env = Env {
                records: &mut records,
                local: global,
                natives: &natives,
                depth: 1,
                max_depth: 8,
            };
            evaluator.evaluate(&[root], &script, &mut env).unwrap()
        };
        let Poll::Call(invocation) = poll else {
            panic!("Expected a call, got {:?}", poll);
        };
        assert_eq!(invocation.function, FuncId(0));
        assert_eq!(
            records.get(invocation.record).unwrap().get("a"),
            Some(&Value::Number(2.0))
        );
        assert!(!evaluator.is_idle());

        evaluator.deliver(Value::Number(2.0));
        let mut env = Env {
            records: &mut records,
            local: global,
            natives: &natives,
            depth: 1,
            max_depth: 8,
        };
        let poll = evaluator.evaluate(&[root], &script, &mut env).unwrap();
        assert_eq!(poll, Poll::Ready(vec![Value::Number(21.0)]));
    }

    #[test]
    fn test_error_carries_expression_position() {
        let script = parse("1 + missing\n").unwrap();
        let mut records = RecordStore::new();
        let global = records.allocate(None);
        let natives = NativeRegistry::new();
        let mut env = Env {
            records: &mut records,
            local: global,
            natives: &natives,
            depth: 1,
            max_depth: 8,
        };
        let mut evaluator = Evaluator::new();
        let err = evaluator
            .evaluate(&[first_expression(&script)], &script, &mut env)
            .unwrap_err();
        assert_eq!(err.kind, EvaluationErrorKind::UndefinedName("missing".to_string()));
        assert_eq!((err.pos.line, err.pos.column), (1, 5));
        assert!(evaluator.is_idle());
    }
}
