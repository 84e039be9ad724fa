//! Operator tests: precedence, short-circuit, per-type arithmetic

use super::helpers::{num, output, run, run_err, text};
use crate::interpreter::{EvaluationErrorKind, ProcessError, Value};

fn result_of(expression: &str) -> Value {
    let process = run(&format!("return {}\n", expression));
    process.result().cloned().unwrap_or(Value::None)
}

#[test]
fn test_precedence() {
    assert_eq!(result_of("-2 + 3 * 4"), num(10.0));
    assert_eq!(result_of("(1 + 2) * 3"), num(9.0));
    assert_eq!(result_of("2 ** 3 ** 2"), num(512.0));
    assert_eq!(result_of("-2 ** 2"), num(-4.0));
    assert_eq!(result_of("1 + 2 == 3 and 4 > 3"), num(1.0));
    // `not` binds tighter than comparison
    assert_eq!(result_of("not 1 == 2"), num(0.0));
    assert_eq!(result_of("not (1 == 2)"), num(1.0));
    assert_eq!(result_of("not 0 == 1"), num(1.0));
}

#[test]
fn test_short_circuit_at_runtime() {
    // Names keep the parser from folding, so the evaluator decides
    let process = run("t = true\nf = false\nreturn [t or (1/0 == 0), f and (1/0 == 0)]\n");
    assert_eq!(
        process.result(),
        Some(&Value::Array(vec![num(1.0), num(0.0)]))
    );
}

#[test]
fn test_short_circuit_literal() {
    assert_eq!(result_of("true or (1/0 == 0)"), num(1.0));
}

#[test]
fn test_and_or_yield_deciding_operand() {
    assert_eq!(result_of("none or 'fallback'"), text("fallback"));
    assert_eq!(result_of("'first' or 'second'"), text("first"));
    assert_eq!(result_of("[] and 1"), Value::Array(vec![]));
    assert_eq!(result_of("1 and 'last'"), text("last"));
}

#[test]
fn test_right_side_skipped_when_decided() {
    let source = "calls = 0\ndef touch():\n    calls += 1\n    return true\nx = false and touch()\ny = true or touch()\nz = true and touch()\nprint calls\n";
    assert_eq!(output(source), vec!["1"]);
}

#[test]
fn test_text_and_array_arithmetic() {
    assert_eq!(result_of("'ab' + 'cd'"), text("abcd"));
    assert_eq!(result_of("'ab' * 3"), text("ababab"));
    assert_eq!(
        result_of("[1, 2, 1, 3] - 1"),
        Value::Array(vec![num(2.0), num(3.0)])
    );
    assert_eq!(
        result_of("[0] * 3"),
        Value::Array(vec![num(0.0), num(0.0), num(0.0)])
    );
}

#[test]
fn test_dictionary_merge_and_removal() {
    let merged = result_of("{'a': 1, 'b': 2} + {'b': 20, 'c': 3}");
    let Value::Dictionary(dict) = merged else {
        panic!("Expected dictionary, got {:?}", merged);
    };
    assert_eq!(dict.get(&text("a")), Some(&num(1.0)));
    assert_eq!(dict.get(&text("b")), Some(&num(20.0)));
    assert_eq!(dict.get(&text("c")), Some(&num(3.0)));

    assert_eq!(result_of("len({'a': 1, 'b': 2} - 'a')"), num(1.0));
}

#[test]
fn test_membership() {
    assert_eq!(result_of("2 in [1, 2, 3]"), num(1.0));
    assert_eq!(result_of("'x' in {'x': none}"), num(1.0));
    assert_eq!(result_of("'ell' in 'hello'"), num(1.0));
    assert_eq!(result_of("'z' in 'hello'"), num(0.0));
}

#[test]
fn test_comparisons() {
    assert_eq!(result_of("'abc' < 'abd'"), num(1.0));
    assert_eq!(result_of("[1, 2] < [1, 3]"), num(1.0));
    assert_eq!(result_of("{'a': 1, 'b': 2} == {'b': 2, 'a': 1}"), num(1.0));
    assert_eq!(result_of("1 == '1'"), num(0.0));
    assert_eq!(result_of("none != 0"), num(1.0));
}

#[test]
fn test_indexing_and_slicing() {
    assert_eq!(result_of("[10, 20, 30][-1]"), num(30.0));
    assert_eq!(result_of("'hello'[1:3]"), text("el"));
    assert_eq!(result_of("'hello'[:-1]"), text("hell"));
    assert_eq!(
        result_of("[1, 2, 3, 4][2:]"),
        Value::Array(vec![num(3.0), num(4.0)])
    );
    assert_eq!(result_of("{'k': 'v'}.k"), text("v"));
    assert_eq!(result_of("{1: 'one'}[1]"), text("one"));
}

#[test]
fn test_ordering_mismatch_is_an_error() {
    let err = run_err("x = 1\nreturn x < 'a'\n");
    let ProcessError::Evaluation(e) = err else {
        panic!("Expected evaluation error, got {:?}", err);
    };
    assert!(matches!(e.kind, EvaluationErrorKind::TypeMismatch { .. }));
    assert_eq!(e.pos.line, 2);
}

#[test]
fn test_compound_assignment_operators() {
    let process = run("n = 10\nn -= 4\nn *= 2\nn /= 3\nt = 'a'\nt += 'b'\nd = {'x': 1}\nd += {'y': 2}\nd -= 'x'\n");
    assert_eq!(process.global("n"), Some(num(4.0)));
    assert_eq!(process.global("t"), Some(text("ab")));
    assert_eq!(result_of("{'y': 2}"), process.global("d").unwrap_or(Value::None));
}
