//! Numeric builtins

use crate::interpreter::errors::EvaluationErrorKind;
use crate::interpreter::types::operators::{self, OpResult};
use crate::interpreter::types::{BinaryOp, Value};

fn number(name: &str, value: &Value) -> OpResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(EvaluationErrorKind::unary_mismatch(name, other)),
    }
}

/// num(x) - parse text as a number; numbers pass through
pub fn num(value: &Value) -> OpResult {
    match value {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Text(s) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
            EvaluationErrorKind::InvalidArgument(format!("cannot convert {:?} to a number", s))
        }),
        other => Err(EvaluationErrorKind::unary_mismatch("num", other)),
    }
}

pub fn abs(value: &Value) -> OpResult {
    Ok(Value::Number(number("abs", value)?.abs()))
}

pub fn floor(value: &Value) -> OpResult {
    Ok(Value::Number(number("floor", value)?.floor()))
}

/// min/max over the arguments, or over the elements of a single array argument
pub fn extreme(args: &[Value], name: &str, want_greater: bool) -> OpResult {
    let candidates = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };
    let Some((first, rest)) = candidates.split_first() else {
        return Err(EvaluationErrorKind::InvalidArgument(format!(
            "{}() of an empty array",
            name
        )));
    };

    let op = if want_greater {
        BinaryOp::Greater
    } else {
        BinaryOp::Less
    };
    let mut best = first;
    for candidate in rest {
        if operators::binary(op, candidate, best)?.is_truthy() {
            best = candidate;
        }
    }
    Ok(best.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num_value(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_num_parses_text() {
        assert_eq!(num(&Value::text(" 2.5 ")), Ok(num_value(2.5)));
        assert!(matches!(
            num(&Value::text("abc")),
            Err(EvaluationErrorKind::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_floor_and_abs() {
        assert_eq!(floor(&num_value(-3.2)), Ok(num_value(-4.0)));
        assert_eq!(abs(&num_value(-3.0)), Ok(num_value(3.0)));
        assert!(floor(&Value::text("x")).is_err());
    }

    #[test]
    fn test_extremes() {
        let args = [num_value(3.0), num_value(1.0), num_value(2.0)];
        assert_eq!(extreme(&args, "min", false), Ok(num_value(1.0)));
        assert_eq!(extreme(&args, "max", true), Ok(num_value(3.0)));

        let array = [Value::Array(vec![Value::text("b"), Value::text("a")])];
        assert_eq!(extreme(&array, "min", false), Ok(Value::text("a")));

        assert!(extreme(&[Value::Array(vec![])], "max", true).is_err());
        assert!(extreme(&[num_value(1.0), Value::text("a")], "max", true).is_err());
    }
}
