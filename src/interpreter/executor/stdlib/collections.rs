//! Container builtins

use crate::interpreter::errors::EvaluationErrorKind;
use crate::interpreter::types::operators::{check_sequence_len, OpResult};
use crate::interpreter::types::Value;

pub fn len(value: &Value) -> OpResult {
    let n = match value {
        Value::Text(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Dictionary(dict) => dict.len(),
        other => return Err(EvaluationErrorKind::unary_mismatch("len", other)),
    };
    Ok(Value::Number(n as f64))
}

/// Dictionary keys in insertion order
pub fn keys(value: &Value) -> OpResult {
    match value {
        Value::Dictionary(dict) => Ok(Value::Array(dict.keys().cloned().collect())),
        other => Err(EvaluationErrorKind::unary_mismatch("keys", other)),
    }
}

/// range(end), range(start, end), range(start, end, step)
pub fn range(args: &[Value]) -> OpResult {
    let integer = |v: &Value| {
        v.as_integer().ok_or_else(|| {
            EvaluationErrorKind::InvalidArgument(format!(
                "range() arguments must be integers, got {}",
                v.repr()
            ))
        })
    };
    let (start, end, step) = match args {
        [end] => (0, integer(end)?, 1),
        [start, end] => (integer(start)?, integer(end)?, 1),
        [start, end, step] => (integer(start)?, integer(end)?, integer(step)?),
        _ => {
            return Err(EvaluationErrorKind::InvalidArgument(
                "range() takes 1 to 3 arguments".to_string(),
            ))
        }
    };
    if step == 0 {
        return Err(EvaluationErrorKind::InvalidArgument(
            "range() step must not be zero".to_string(),
        ));
    }

    let span = if step > 0 {
        i128::from(end) - i128::from(start)
    } else {
        i128::from(start) - i128::from(end)
    };
    let step_size = i128::from(step).abs();
    let count = if span > 0 { (span + step_size - 1) / step_size } else { 0 };
    let count = check_sequence_len(usize::try_from(count).ok(), "range()")?;

    let mut items = Vec::with_capacity(count);
    let mut i = start;
    for _ in 0..count {
        items.push(Value::Number(i as f64));
        // the last step may leave the i64 range; it is never pushed
        i = i.checked_add(step).unwrap_or(i);
    }
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::Dictionary;

    fn numbers(values: &[f64]) -> Value {
        Value::Array(values.iter().map(|n| Value::Number(*n)).collect())
    }

    #[test]
    fn test_len() {
        assert_eq!(len(&Value::text("héllo")), Ok(Value::Number(5.0)));
        assert_eq!(len(&numbers(&[1.0, 2.0])), Ok(Value::Number(2.0)));
        assert!(len(&Value::Number(1.0)).is_err());
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let dict: Dictionary = vec![
            (Value::text("b"), Value::None),
            (Value::text("a"), Value::None),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            keys(&Value::Dictionary(dict)),
            Ok(Value::Array(vec![Value::text("b"), Value::text("a")]))
        );
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(range(&[Value::Number(3.0)]), Ok(numbers(&[0.0, 1.0, 2.0])));
        assert_eq!(
            range(&[Value::Number(5.0), Value::Number(1.0), Value::Number(-2.0)]),
            Ok(numbers(&[5.0, 3.0]))
        );
        assert_eq!(range(&[Value::Number(-1.0)]), Ok(numbers(&[])));
        assert!(range(&[Value::Number(0.0), Value::Number(3.0), Value::Number(0.0)]).is_err());
        assert!(range(&[Value::Number(1.5)]).is_err());
        assert_eq!(range(&[Value::Number(1.0), Value::Number(6.0), Value::Number(2.0)]), Ok(numbers(&[1.0, 3.0, 5.0])));
    }

    #[test]
    fn test_range_is_bounded() {
        assert_eq!(
            range(&[Value::Number(9.2e18), Value::Number(9.3e18), Value::Number(1e18)]),
            Ok(numbers(&[9.2e18]))
        );
        assert!(matches!(
            range(&[Value::Number(1e15)]),
            Err(EvaluationErrorKind::InvalidArgument(_))
        ));
        assert!(matches!(
            range(&[Value::Number(-9e18), Value::Number(9e18)]),
            Err(EvaluationErrorKind::InvalidArgument(_))
        ));
    }
}
