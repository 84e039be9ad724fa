//! Try/catch and throw tests

use super::helpers::{new_process, num, output, run, run_err, text};
use crate::interpreter::ProcessError;

#[test]
fn test_throw_is_caught() {
    let source = "try:\n    throw 'boom'\n    print 'not reached'\ncatch err:\n    print 'caught', err\nprint 'after'\n";
    let process = run(source);
    assert_eq!(process.output(), ["caught boom", "after"]);
    assert_eq!(process.global("err"), Some(text("boom")));
}

#[test]
fn test_try_without_throw_skips_handler() {
    let source = "try: x = 1\ncatch: x = 2\nprint x\n";
    assert_eq!(output(source), vec!["1"]);
}

#[test]
fn test_catch_without_binding() {
    assert_eq!(output("try: throw 1\ncatch: print 'handled'\n"), vec!["handled"]);
}

#[test]
fn test_throw_any_value() {
    let source = "try: throw {'code': 7}\ncatch e: print e.code\n";
    assert_eq!(output(source), vec!["7"]);
}

#[test]
fn test_throw_unwinds_calls() {
    let source = r#"
def inner(n):
    if n == 0: throw 'bottom'
    return inner(n - 1) + 1
def outer():
    try:
        return inner(5)
    catch e:
        return 'outer caught ' + e
print outer()
"#;
    assert_eq!(output(source), vec!["outer caught bottom"]);
}

#[test]
fn test_caller_expression_abandoned_after_catch() {
    let source = r#"
def fail(): throw 'x'
total = 0
try:
    total = 100 + fail()
catch:
    total = -1
print total
"#;
    assert_eq!(output(source), vec!["-1"]);
}

#[test]
fn test_nested_try_rethrow() {
    let source = r#"
log = []
try:
    try:
        throw 'first'
    catch e:
        log += ['inner ' + e]
        throw 'second'
catch e:
    log += ['outer ' + e]
print log
"#;
    assert_eq!(output(source), vec!["[\"inner first\", \"outer second\"]"]);
}

#[test]
fn test_throw_inside_loop_inside_try() {
    let source = "i = 0\ntry:\n    while true:\n        i += 1\n        if i == 4: throw i\ncatch n:\n    print 'stopped at', n\nprint 'done'\n";
    assert_eq!(output(source), vec!["stopped at 4", "done"]);
}

#[test]
fn test_try_inside_loop_keeps_looping() {
    let source = "hits = 0\nfor i in range(3):\n    try:\n        if i == 1: throw 'skip'\n        hits += 1\n    catch:\n        continue\nprint hits\n";
    assert_eq!(output(source), vec!["2"]);
}

#[test]
fn test_unhandled_throw_terminates_process() {
    let err = run_err("print 'before'\nthrow 'boom'\nprint 'after'\n");
    let ProcessError::Unhandled(unhandled) = err else {
        panic!("Expected unhandled script error, got {:?}", err);
    };
    assert_eq!(unhandled.value, text("boom"));
    assert_eq!(unhandled.pos.line, 2);
}

#[test]
fn test_unhandled_throw_from_nested_call() {
    let source = "def a(): throw 42\ndef b(): return a()\nb()\n";
    let mut process = new_process(source);

    let err = process.run(1000).unwrap_err();
    assert!(matches!(
        &err,
        ProcessError::Unhandled(e) if e.value == num(42.0)
    ));
    assert_eq!(process.depth(), 0);
    assert_eq!(process.error(), Some(&err));

    // A failed process keeps reporting the same error
    assert_eq!(process.run(10).unwrap_err(), err);
    assert_eq!(process.result(), None);
}

#[test]
fn test_evaluation_errors_are_not_catchable() {
    let err = run_err("try: x = 1 / 0\ncatch: print 'nope'\n");
    assert!(matches!(err, ProcessError::Evaluation(_)));
}
