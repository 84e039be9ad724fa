//! Runtime value types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ast::FuncId;
use super::record::RecordId;
use crate::interpreter::executor::stdlib::Builtin;

/// Runtime value
///
/// Values are immutable once built. The only in-place mutations are the
/// `sum`/`subtract` compound assignments in [`super::operators`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    /// Numbers double as booleans: `true` is 1, `false` is 0
    Number(f64),
    Text(String),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    /// Alias of a variable slot, not a copy of its value
    Reference(Reference),
    Function(Function),
}

/// Points at the variable `name` inside record `record`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub record: RecordId,
    pub name: String,
}

/// Callable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Function {
    /// Script-defined function with the record captured at definition time
    Script {
        def: FuncId,
        scope: RecordId,
        name: String,
    },
    Builtin(Builtin),
    /// Host callable, resolved by name through the process's native registry
    Native { name: String },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Script { name, .. } => name,
            Function::Builtin(builtin) => builtin.name(),
            Function::Native { name } => name,
        }
    }
}

impl Value {
    pub fn boolean(b: bool) -> Value {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Dictionary(_) => "dictionary",
            Value::Reference(_) => "reference",
            Value::Function(_) => "function",
        }
    }

    /// Check if value is truthy (for conditionals)
    ///
    /// References must be dereferenced by the caller first; a bare reference is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Dictionary(dict) => !dict.is_empty(),
            Value::Reference(_) | Value::Function(_) => true,
        }
    }

    /// Copy of this value that shares nothing with it, except that a
    /// reference keeps aliasing the same slot
    pub fn duplicate(&self) -> Value {
        self.clone()
    }

    /// Integral number usable as an index or count
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Push every record this value points at, through nested containers
    pub fn record_ids(&self, out: &mut Vec<RecordId>) {
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            match value {
                Value::Array(items) => stack.extend(items.iter()),
                Value::Dictionary(dict) => {
                    for (key, item) in dict.iter() {
                        stack.push(key);
                        stack.push(item);
                    }
                }
                Value::Reference(reference) => out.push(reference.record),
                Value::Function(Function::Script { scope, .. }) => out.push(*scope),
                Value::None
                | Value::Number(_)
                | Value::Text(_)
                | Value::Function(Function::Builtin(_) | Function::Native { .. }) => {}
            }
        }
    }

    /// Rendering used inside containers: text is quoted
    pub fn repr(&self) -> String {
        match self {
            Value::Text(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Dictionary(dict) => {
                let parts: Vec<String> = dict
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Reference(r) => write!(f, "<reference {}>", r.name),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
        }
    }
}

/// Integral numbers render without a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/* ===================== Dictionary ===================== */

/// Insertion-ordered mapping keyed by value equality
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    entries: Vec<(Value, Value)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace, keeping the original position of an existing key
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl FromIterator<(Value, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// Order-insensitive: same keys mapping to equal values
impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}
