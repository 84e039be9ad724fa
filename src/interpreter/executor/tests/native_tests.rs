//! Host-native function tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::helpers::{compile_round_trip, new_process, num, run_to_end, text};
use crate::interpreter::executor::{Process, RunStatus};
use crate::interpreter::{EvaluationErrorKind, ProcessError, Value};

fn install_host(process: &mut Process) {
    process.install_native("double", Some(1), |args| match &args[0] {
        Value::Number(n) => Ok(Value::Number(n * 2.0)),
        other => Err(format!("cannot double {}", other.type_name())),
    });
    process.install_native("join", None, |args| {
        let parts: Vec<String> = args.iter().map(|v| v.to_string()).collect();
        Ok(Value::text(parts.join("-")))
    });
}

#[test]
fn test_native_called_like_script_function() {
    let mut process = new_process("def apply(f, x): return f(x)\nprint double(4), apply(double, 5), join(1, 'a', [2])\n");
    install_host(&mut process);
    run_to_end(&mut process);

    assert_eq!(process.take_output(), vec!["8 10 1-a-[2]"]);
}

#[test]
fn test_native_receives_dereferenced_arguments() {
    let mut process = new_process("x = 21\nreturn double(&x)\n");
    install_host(&mut process);
    run_to_end(&mut process);

    assert_eq!(process.result(), Some(&num(42.0)));
}

#[test]
fn test_native_arity_checked() {
    let mut process = new_process("double(1, 2)\n");
    install_host(&mut process);

    let err = process.run(100).unwrap_err();
    let ProcessError::Evaluation(e) = err else {
        panic!("Expected evaluation error, got {:?}", err);
    };
    assert_eq!(
        e.kind,
        EvaluationErrorKind::ArityMismatch {
            name: "double".to_string(),
            expected: "1".to_string(),
            given: 2,
        }
    );
}

#[test]
fn test_native_error_becomes_evaluation_error() {
    let mut process = new_process("double('x')\n");
    install_host(&mut process);

    let err = process.run(100).unwrap_err();
    assert!(matches!(
        err,
        ProcessError::Evaluation(ref e) if e.kind == EvaluationErrorKind::Native {
            name: "double".to_string(),
            message: "cannot double text".to_string(),
        }
    ));
}

#[test]
fn test_natives_reregistered_after_resume() {
    let script = compile_round_trip("a = double(1)\nb = double(a)\n");
    let calls = Arc::new(AtomicUsize::new(0));

    let counting = |process: &mut Process, calls: Arc<AtomicUsize>| {
        process.register_native("double", Some(1), move |args| {
            calls.fetch_add(1, Ordering::SeqCst);
            match &args[0] {
                Value::Number(n) => Ok(Value::Number(n * 2.0)),
                _ => Err("number expected".to_string()),
            }
        });
    };

    let mut process = Process::new(script.clone());
    process.install("double", Value::Function(crate::interpreter::types::Function::Native {
        name: "double".to_string(),
    }));
    counting(&mut process, calls.clone());
    assert_eq!(process.step().unwrap(), RunStatus::Running);

    let state = process.suspend().unwrap();
    let mut resumed = Process::resume(&state, script).unwrap();
    counting(&mut resumed, calls.clone());
    run_to_end(&mut resumed);

    assert_eq!(resumed.global("b"), Some(num(4.0)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_installed_values_survive_suspension() {
    let script = compile_round_trip("print greeting\n");
    let mut process = Process::new(script.clone());
    process.install("greeting", text("hello"));

    let state = process.suspend().unwrap();
    let mut resumed = Process::resume(&state, script).unwrap();
    run_to_end(&mut resumed);

    assert_eq!(resumed.take_output(), vec!["hello"]);
}
