//! Host-native callables
//!
//! Natives are looked up by name at call time. Script state only ever holds
//! `Function::Native { name }`, so a suspended process carries no host
//! pointers and the host re-registers its callables after resuming.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::interpreter::errors::EvaluationErrorKind;
use crate::interpreter::types::operators::OpResult;
use crate::interpreter::types::Value;

/// Host callable: receives dereferenced arguments, returns a value or an error message
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub struct NativeFunction {
    /// Exact argument count, or `None` for variadic
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NativeRegistry {
    functions: HashMap<String, NativeFunction>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, arity: Option<usize>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.to_string(),
            NativeFunction {
                arity,
                func: Arc::new(func),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Invoke `name` with the same arity contract as script functions
    pub fn call(&self, name: &str, args: &[Value]) -> OpResult {
        let native = self
            .functions
            .get(name)
            .ok_or_else(|| EvaluationErrorKind::UnknownNative(name.to_string()))?;
        if let Some(arity) = native.arity {
            if arity != args.len() {
                return Err(EvaluationErrorKind::ArityMismatch {
                    name: name.to_string(),
                    expected: arity.to_string(),
                    given: args.len(),
                });
            }
        }
        (native.func)(args).map_err(|message| EvaluationErrorKind::Native {
            name: name.to_string(),
            message,
        })
    }
}
