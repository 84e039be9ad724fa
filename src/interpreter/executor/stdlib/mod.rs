//! Builtin function implementations
//!
//! Builtins are identified by a serializable enum so a global record holding
//! them can be suspended and resumed like any other state.

pub mod collections;
pub mod math;

use serde::{Deserialize, Serialize};

use crate::interpreter::errors::EvaluationErrorKind;
use crate::interpreter::types::operators::OpResult;
use crate::interpreter::types::{Function, Record, Value};

/* ===================== Builtin Identifiers ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    Len,
    Str,
    Num,
    Type,
    Keys,
    Range,
    Abs,
    Floor,
    Min,
    Max,
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::Len,
        Builtin::Str,
        Builtin::Num,
        Builtin::Type,
        Builtin::Keys,
        Builtin::Range,
        Builtin::Abs,
        Builtin::Floor,
        Builtin::Min,
        Builtin::Max,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Num => "num",
            Builtin::Type => "type",
            Builtin::Keys => "keys",
            Builtin::Range => "range",
            Builtin::Abs => "abs",
            Builtin::Floor => "floor",
            Builtin::Min => "min",
            Builtin::Max => "max",
        }
    }

    /// Accepted argument counts as (minimum, maximum)
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Builtin::Range => (1, Some(3)),
            Builtin::Min | Builtin::Max => (1, None),
            _ => (1, Some(1)),
        }
    }

    fn check_arity(self, given: usize) -> OpResult<()> {
        let (min, max) = self.arity();
        if given >= min && max.map_or(true, |max| given <= max) {
            return Ok(());
        }
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        Err(EvaluationErrorKind::ArityMismatch {
            name: self.name().to_string(),
            expected,
            given,
        })
    }

    /// Call with already dereferenced arguments
    pub fn call(self, args: &[Value]) -> OpResult {
        self.check_arity(args.len())?;
        match self {
            Builtin::Len => collections::len(&args[0]),
            Builtin::Str => Ok(Value::Text(args[0].to_string())),
            Builtin::Num => math::num(&args[0]),
            Builtin::Type => Ok(Value::text(args[0].type_name())),
            Builtin::Keys => collections::keys(&args[0]),
            Builtin::Range => collections::range(args),
            Builtin::Abs => math::abs(&args[0]),
            Builtin::Floor => math::floor(&args[0]),
            Builtin::Min => math::extreme(args, "min", false),
            Builtin::Max => math::extreme(args, "max", true),
        }
    }
}

/* ===================== Environment Injection ===================== */

/// Define every builtin in a fresh global record
pub fn inject_stdlib(record: &mut Record) {
    for builtin in Builtin::ALL {
        record.define(builtin.name(), Value::Function(Function::Builtin(builtin)));
    }
}
