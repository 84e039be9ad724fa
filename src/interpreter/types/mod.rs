//! Type definitions for the interpreter
//!
//! This module contains all the core types shared by parser and executor:
//! - Statement graph and expression trees (Script, Stmt, Expr)
//! - Runtime values (Value) and their operators
//! - Namespaces (Record, RecordStore)
//! - Control-flow stack entries (ControlEntry)

pub mod ast;
pub mod control;
pub mod operators;
pub mod record;
pub mod values;

// Re-export all types for convenient access
pub use ast::{
    Accessor, AssignOp, BinaryOp, Expr, ExprId, ExprKind, FlowKind, FuncId, FunctionDef,
    Position, Script, Stmt, StmtId, StmtKind, Target, UnaryOp,
};
pub use control::ControlEntry;
pub use record::{Record, RecordId, RecordStore, Variable};
pub use values::{Dictionary, Function, Reference, Value};
