//! # Executor - Resumable Stack-Driven Interpreter
//!
//! ## Core Principles
//!
//! 1. **Stack-driven execution**: all state in `frames: Vec<Context>`, no recursion
//! 2. **Statement-level stepping**: one step executes one statement
//! 3. **Explicit control stack**: branch/loop/guard markers per context resolve
//!    break, continue, return and throw
//! 4. **Pure executor**: no I/O, no async; the host decides how many steps to run

pub mod context;
pub mod exec_loop;
pub mod expressions;
pub mod natives;
pub mod process;
pub mod statements;
pub mod stdlib;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use context::Context;
pub use exec_loop::Step;
pub use expressions::{Evaluator, Poll, Task};
pub use natives::{NativeFn, NativeRegistry};
pub use process::{Limits, Process, ProcessState, RunStatus, Status, DEFAULT_MAX_CALL_DEPTH};
pub use stdlib::Builtin;
