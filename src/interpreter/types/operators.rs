//! Operator semantics for runtime values
//!
//! Direct enum dispatch over the closed value set. Every function here is
//! pure except `sum`/`subtract`, which implement the in-place compound
//! assignments. Callers dereference references before calling in.

use std::cmp::Ordering;

use super::ast::{BinaryOp, UnaryOp};
use super::values::Value;
use crate::interpreter::errors::EvaluationErrorKind;

pub type OpResult<T = Value> = Result<T, EvaluationErrorKind>;

/// Largest text (in bytes) or array a single operation may build
pub const MAX_SEQUENCE_LEN: usize = 1 << 22;

/// Reject a sequence length above [`MAX_SEQUENCE_LEN`] before allocating it
pub fn check_sequence_len(len: Option<usize>, what: &str) -> OpResult<usize> {
    match len {
        Some(len) if len <= MAX_SEQUENCE_LEN => Ok(len),
        _ => Err(EvaluationErrorKind::InvalidArgument(format!(
            "{} would exceed {} elements",
            what, MAX_SEQUENCE_LEN
        ))),
    }
}

/* ===================== Unary / Binary ===================== */

pub fn unary(op: UnaryOp, operand: &Value) -> OpResult {
    match (op, operand) {
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
        (UnaryOp::Not, v) => Ok(Value::boolean(!v.is_truthy())),
        (op, v) => Err(EvaluationErrorKind::unary_mismatch(op.symbol(), v)),
    }
}

/// Apply a binary operator to two evaluated operands
///
/// `and`/`or` are accepted for completeness (they pick the deciding operand);
/// the evaluator handles them itself so the right side is only evaluated when needed.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult {
    match op {
        BinaryOp::Or => Ok(if lhs.is_truthy() { lhs } else { rhs }.clone()),
        BinaryOp::And => Ok(if lhs.is_truthy() { rhs } else { lhs }.clone()),
        BinaryOp::Equal => Ok(Value::boolean(lhs == rhs)),
        BinaryOp::NotEqual => Ok(Value::boolean(lhs != rhs)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = compare(op, lhs, rhs)?;
            let result = match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Less, Some(ord)) => ord == Ordering::Less,
                (BinaryOp::LessEqual, Some(ord)) => ord != Ordering::Greater,
                (BinaryOp::Greater, Some(ord)) => ord == Ordering::Greater,
                (_, Some(ord)) => ord != Ordering::Less,
            };
            Ok(Value::boolean(result))
        }
        BinaryOp::In => contains(rhs, lhs).map(Value::boolean),
        BinaryOp::Add => {
            let mut out = lhs.duplicate();
            sum(&mut out, rhs.clone())?;
            Ok(out)
        }
        BinaryOp::Subtract => {
            let mut out = lhs.duplicate();
            subtract(&mut out, rhs)?;
            Ok(out)
        }
        BinaryOp::Multiply => multiply(lhs, rhs),
        BinaryOp::Divide => match (lhs, rhs) {
            (Value::Number(_), Value::Number(b)) if *b == 0.0 => {
                Err(EvaluationErrorKind::DivisionByZero)
            }
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            _ => Err(EvaluationErrorKind::type_mismatch("/", lhs, rhs)),
        },
        BinaryOp::Modulo => match (lhs, rhs) {
            (Value::Number(_), Value::Number(b)) if *b == 0.0 => {
                Err(EvaluationErrorKind::DivisionByZero)
            }
            // Result takes the sign of the divisor
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b * (a / b).floor())),
            _ => Err(EvaluationErrorKind::type_mismatch("%", lhs, rhs)),
        },
        BinaryOp::Power => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.powf(*b))),
            _ => Err(EvaluationErrorKind::type_mismatch("**", lhs, rhs)),
        },
    }
}

/// Ordering between comparable values; `Ok(None)` for unordered numbers (NaN)
fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult<Option<Ordering>> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(Some(a.cmp(b))),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match compare(op, x, y)? {
                    Some(Ordering::Equal) => continue,
                    other => return Ok(other),
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => Err(EvaluationErrorKind::type_mismatch(op.symbol(), lhs, rhs)),
    }
}

fn multiply(lhs: &Value, rhs: &Value) -> OpResult {
    let count = |v: &Value| -> OpResult<usize> {
        match v.as_integer() {
            Some(n) if n >= 0 => usize::try_from(n).map_err(|_| {
                EvaluationErrorKind::InvalidArgument(format!("repeat count {} is too large", n))
            }),
            _ => Err(EvaluationErrorKind::InvalidArgument(format!(
                "repeat count must be a non-negative integer, got {}",
                v.repr()
            ))),
        }
    };
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (Value::Text(s), n @ Value::Number(_)) | (n @ Value::Number(_), Value::Text(s)) => {
            let times = count(n)?;
            check_sequence_len(s.len().checked_mul(times), "text repetition")?;
            Ok(Value::Text(s.repeat(times)))
        }
        (Value::Array(items), n @ Value::Number(_)) => {
            let times = count(n)?;
            let len = check_sequence_len(items.len().checked_mul(times), "array repetition")?;
            let mut out = Vec::with_capacity(len);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::Array(out))
        }
        _ => Err(EvaluationErrorKind::type_mismatch("*", lhs, rhs)),
    }
}

/// Membership test backing the `in` operator
pub fn contains(container: &Value, item: &Value) -> OpResult<bool> {
    match (container, item) {
        (Value::Array(items), _) => Ok(items.contains(item)),
        (Value::Dictionary(dict), _) => Ok(dict.contains_key(item)),
        (Value::Text(haystack), Value::Text(needle)) => Ok(haystack.contains(needle.as_str())),
        _ => Err(EvaluationErrorKind::type_mismatch("in", item, container)),
    }
}

/* ===================== In-place Compound Assignment ===================== */

/// `target += rhs`
pub fn sum(target: &mut Value, rhs: Value) -> OpResult<()> {
    match (target, rhs) {
        (Value::Number(a), Value::Number(b)) => *a += b,
        (Value::Text(a), Value::Text(b)) => a.push_str(&b),
        (Value::Array(a), Value::Array(b)) => a.extend(b),
        (Value::Dictionary(a), Value::Dictionary(b)) => {
            for (k, v) in b.iter() {
                a.insert(k.clone(), v.clone());
            }
        }
        (t, r) => return Err(EvaluationErrorKind::type_mismatch("+", t, &r)),
    }
    Ok(())
}

/// `target -= rhs`
///
/// Arrays drop every element equal to `rhs` (or contained in `rhs` when it is
/// an array); dictionaries drop the key `rhs`.
pub fn subtract(target: &mut Value, rhs: &Value) -> OpResult<()> {
    match (target, rhs) {
        (Value::Number(a), Value::Number(b)) => *a -= b,
        (Value::Array(items), Value::Array(remove)) => items.retain(|x| !remove.contains(x)),
        (Value::Array(items), other) => items.retain(|x| x != other),
        (Value::Dictionary(dict), key) => {
            dict.remove(key);
        }
        (t, r) => return Err(EvaluationErrorKind::type_mismatch("-", t, r)),
    }
    Ok(())
}

/* ===================== Indexing ===================== */

/// Resolve a possibly negative index against `len`
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let adjusted = if index < 0 { index + len as i64 } else { index };
    if adjusted >= 0 && (adjusted as usize) < len {
        Some(adjusted as usize)
    } else {
        None
    }
}

fn integer_index(base: &Value, index: &Value) -> OpResult<i64> {
    index
        .as_integer()
        .ok_or_else(|| EvaluationErrorKind::type_mismatch("[]", base, index))
}

pub fn index(base: &Value, index: &Value) -> OpResult {
    match base {
        Value::Array(items) => {
            let i = integer_index(base, index)?;
            normalize_index(i, items.len())
                .map(|at| items[at].clone())
                .ok_or(EvaluationErrorKind::IndexOutOfRange {
                    index: i,
                    len: items.len(),
                })
        }
        Value::Text(s) => {
            let i = integer_index(base, index)?;
            let len = s.chars().count();
            normalize_index(i, len)
                .and_then(|at| s.chars().nth(at))
                .map(|c| Value::Text(c.to_string()))
                .ok_or(EvaluationErrorKind::IndexOutOfRange { index: i, len })
        }
        Value::Dictionary(dict) => dict
            .get(index)
            .cloned()
            .ok_or_else(|| EvaluationErrorKind::NotFound(format!("key {}", index.repr()))),
        _ => Err(EvaluationErrorKind::type_mismatch("[]", base, index)),
    }
}

/// `base[start:end]` over arrays and text; missing bounds default to the ends
pub fn slice(base: &Value, start: Option<&Value>, end: Option<&Value>) -> OpResult {
    let len = match base {
        Value::Array(items) => items.len(),
        Value::Text(s) => s.chars().count(),
        _ => {
            return Err(EvaluationErrorKind::type_mismatch(
                "[:]",
                base,
                start.or(end).unwrap_or(&Value::None),
            ))
        }
    };

    let bound = |v: Option<&Value>, default: usize| -> OpResult<usize> {
        let Some(v) = v.filter(|v| !matches!(v, Value::None)) else {
            return Ok(default);
        };
        let raw = integer_index(base, v)?;
        let adjusted = if raw < 0 { raw + len as i64 } else { raw };
        if adjusted < 0 || adjusted as usize > len {
            return Err(EvaluationErrorKind::IndexOutOfRange { index: raw, len });
        }
        Ok(adjusted as usize)
    };

    let from = bound(start, 0)?;
    let to = bound(end, len)?;
    if from > to {
        return Err(EvaluationErrorKind::IndexOutOfRange {
            index: from as i64,
            len: to,
        });
    }

    match base {
        Value::Text(s) => Ok(Value::Text(s.chars().skip(from).take(to - from).collect())),
        Value::Array(items) => Ok(Value::Array(items[from..to].to_vec())),
        _ => unreachable!("length was computed for arrays and text only"),
    }
}

/// `base.name` - dictionary lookup of a text key
pub fn member(base: &Value, name: &str) -> OpResult {
    match base {
        Value::Dictionary(dict) => dict
            .get(&Value::text(name))
            .cloned()
            .ok_or_else(|| EvaluationErrorKind::NotFound(format!("member '{}'", name))),
        other => Err(EvaluationErrorKind::NotFound(format!(
            "member '{}' on {}",
            name,
            other.type_name()
        ))),
    }
}

/// Mutable element slot for indexed/member assignment
///
/// With `create`, a missing dictionary key is inserted (as `none`) so the
/// caller can store into it. Arrays never grow through assignment.
pub fn element_mut<'a>(container: &'a mut Value, key: &Value, create: bool) -> OpResult<&'a mut Value> {
    match container {
        Value::Array(items) => {
            let i = key
                .as_integer()
                .ok_or_else(|| EvaluationErrorKind::type_mismatch("[]=", &Value::Array(vec![]), key))?;
            let len = items.len();
            let at = normalize_index(i, len)
                .ok_or(EvaluationErrorKind::IndexOutOfRange { index: i, len })?;
            Ok(&mut items[at])
        }
        Value::Dictionary(dict) => {
            if !dict.contains_key(key) {
                if !create {
                    return Err(EvaluationErrorKind::NotFound(format!("key {}", key.repr())));
                }
                dict.insert(key.clone(), Value::None);
            }
            dict.get_mut(key)
                .ok_or_else(|| EvaluationErrorKind::NotFound(format!("key {}", key.repr())))
        }
        other => Err(EvaluationErrorKind::type_mismatch("[]=", other, key)),
    }
}
