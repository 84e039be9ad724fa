//! Basic tests: assignment, printing, module result

use super::helpers::{new_process, num, output, run, text};
use crate::interpreter::executor::RunStatus;
use crate::interpreter::Value;
use maplit::btreemap;

#[test]
fn test_empty_script_finishes_with_none() {
    let process = run("");
    assert!(process.is_finished());
    assert_eq!(process.result(), Some(&Value::None));
}

#[test]
fn test_module_return_value() {
    let process = run("x = 20\nreturn x + 22\nprint 'unreachable'\n");
    assert_eq!(process.result(), Some(&num(42.0)));
    assert!(process.output().is_empty());
}

#[test]
fn test_print_joins_arguments() {
    let lines = output("print 1, 'two', [3, 'four'], {'k': none}\nprint 2.5\n");
    assert_eq!(lines, vec!["1 two [3, \"four\"] {\"k\": none}", "2.5"]);
}

#[test]
fn test_assignments_end_up_in_globals() {
    let process = run("a = 1\nb = 'x'\nlocal c = [a]\na += 4\nb *= 3\n");

    let globals = process.globals();
    let user: std::collections::BTreeMap<_, _> = globals
        .into_iter()
        .filter(|(name, _)| ["a", "b", "c"].contains(&name.as_str()))
        .collect();

    assert_eq!(
        user,
        btreemap! {
            "a".to_string() => num(5.0),
            "b".to_string() => text("xxx"),
            "c".to_string() => Value::Array(vec![num(1.0)]),
        }
    );
}

#[test]
fn test_element_and_member_assignment() {
    let process = run(
        "d = {'hp': 10, 'tags': []}\nd.hp -= 3\nd['tags'] += ['new']\nd.mp = 5\nxs = [1, 2, 3]\nxs[-1] = 30\n",
    );

    let mut expected = crate::interpreter::types::Dictionary::new();
    expected.insert(text("hp"), num(7.0));
    expected.insert(text("tags"), Value::Array(vec![text("new")]));
    expected.insert(text("mp"), num(5.0));

    assert_eq!(process.global("d"), Some(Value::Dictionary(expected)));
    assert_eq!(
        process.global("xs"),
        Some(Value::Array(vec![num(1.0), num(2.0), num(30.0)]))
    );
}

#[test]
fn test_values_are_copied_on_assignment() {
    let process = run("a = [1]\nb = a\nb += [2]\n");
    assert_eq!(process.global("a"), Some(Value::Array(vec![num(1.0)])));
    assert_eq!(process.global("b"), Some(Value::Array(vec![num(1.0), num(2.0)])));
}

#[test]
fn test_one_statement_per_step() {
    let mut process = new_process("a = 1\nb = 2\nc = 3\n");

    assert_eq!(process.step().unwrap(), RunStatus::Running);
    assert_eq!(process.global("a"), Some(num(1.0)));
    assert_eq!(process.global("b"), None);

    assert_eq!(process.run(2).unwrap(), RunStatus::Running);
    assert_eq!(process.global("c"), Some(num(3.0)));

    // Falling off the end takes one more step
    assert_eq!(process.step().unwrap(), RunStatus::Finished);
    assert!(process.is_finished());
    assert_eq!(process.step().unwrap(), RunStatus::Finished);
}

#[test]
fn test_builtins_are_available() {
    let lines = output(
        "print len('abc'), str(12) + '!', num(' 2.5 '), type({}), keys({'a': 1})\nprint range(3), abs(-4), floor(2.7), min(3, 1, 2), max([4, 9])\n",
    );
    assert_eq!(lines, vec!["3 12! 2.5 dictionary [\"a\"]", "[0, 1, 2] 4 2 1 9"]);
}

#[test]
fn test_install_global_before_run() {
    let mut process = new_process("print greeting + ', ' + name\n");
    process.install("greeting", text("hello"));
    process.install("name", text("stage"));
    super::helpers::run_to_end(&mut process);

    assert_eq!(process.take_output(), vec!["hello, stage"]);
    assert!(process.output().is_empty());
}
