//! Control-flow stack entries
//!
//! Each context keeps a stack of these markers. When a compound's chain runs
//! out (`current == None`) the top marker says where execution continues;
//! break/continue/throw pop markers to find their target. Markers only hold
//! statement ids and values, so the stack serializes with the context.

use serde::{Deserialize, Serialize};

use super::ast::StmtId;
use super::values::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlEntry {
    /// An if-branch or catch-compound: continue at `resume` when it ends
    Branch { resume: Option<StmtId> },
    /// A while body: re-run the loop head when it ends; exit to the head's `next`
    Loop { head: StmtId },
    /// A for body over a snapshot of the iterable; `index` is the next item to bind
    Iteration {
        head: StmtId,
        items: Vec<Value>,
        index: usize,
    },
    /// A try's guarded compound; `handler` is the try statement itself
    Guard { handler: StmtId },
}

impl ControlEntry {
    pub fn is_loop(&self) -> bool {
        matches!(self, ControlEntry::Loop { .. } | ControlEntry::Iteration { .. })
    }
}
