//! Test helpers for executor tests
//!
//! Common utilities for compiling scripts and driving processes

use std::sync::Arc;

use crate::interpreter::executor::{Process, RunStatus};
use crate::interpreter::{compile, ProcessError, Script, Value};

/// Generous step budget for scripts that are expected to terminate
pub const STEP_LIMIT: usize = 100_000;

/// Compile source and round-trip the script through the binary codec
///
/// Every process in these tests runs the decoded copy, so the codec is
/// exercised by every script the suite compiles.
pub fn compile_round_trip(source: &str) -> Arc<Script> {
    let script = compile(source).expect("Compile failed");
    let bytes = script.to_bytes().expect("Script encoding failed");
    let decoded = Script::from_bytes(&bytes).expect("Script decoding failed");
    assert_eq!(decoded, *script, "Script changed across the codec");
    Arc::new(decoded)
}

pub fn new_process(source: &str) -> Process {
    Process::new(compile_round_trip(source))
}

/// Run a process to completion, panicking if it fails or does not finish
pub fn run_to_end(process: &mut Process) {
    match process.run(STEP_LIMIT) {
        Ok(RunStatus::Finished) => {}
        Ok(RunStatus::Running) => panic!("Process did not finish within {} steps", STEP_LIMIT),
        Err(err) => panic!("Process failed: {}", err),
    }
}

/// Compile and run `source`, returning the finished process
pub fn run(source: &str) -> Process {
    let mut process = new_process(source);
    run_to_end(&mut process);
    process
}

/// Compile and run `source`, returning its printed lines
pub fn output(source: &str) -> Vec<String> {
    run(source).take_output()
}

/// Compile and run `source`, expecting it to fail
pub fn run_err(source: &str) -> ProcessError {
    let mut process = new_process(source);
    match process.run(STEP_LIMIT) {
        Err(err) => err,
        Ok(status) => panic!("Expected failure, got {:?} with result {:?}", status, process.result()),
    }
}

/// Run one step at a time, suspending and resuming the process between every step
///
/// `setup` is applied to the fresh process and again after every resume,
/// since natives are not part of the suspended state.
pub fn run_stepwise_resumed(source: &str, setup: impl Fn(&mut Process)) -> (Process, usize) {
    let script = compile_round_trip(source);
    let mut process = Process::new(script.clone());
    setup(&mut process);

    let mut steps = 0;
    loop {
        steps += 1;
        assert!(steps <= STEP_LIMIT, "Process did not finish within {} steps", STEP_LIMIT);

        let status = process.step().expect("Step failed");
        let state = process.suspend().expect("Suspend failed");
        let printed = process.output().to_vec();

        process = Process::resume(&state, script.clone()).expect("Resume failed");
        setup(&mut process);
        assert_eq!(process.output(), printed.as_slice(), "Output lost across resume");

        if status == RunStatus::Finished {
            return (process, steps);
        }
    }
}

pub fn num(n: f64) -> Value {
    Value::Number(n)
}

pub fn text(s: &str) -> Value {
    Value::text(s)
}
