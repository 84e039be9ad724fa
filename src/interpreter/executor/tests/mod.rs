//! Tests for the executor
//!
//! Organized by feature area

mod helpers;

mod basic_tests;
mod native_tests;
mod operator_tests;
mod try_tests;
