//! Statement graph and expression tree node types
//!
//! A compiled [`Script`] is a set of arenas. Statements reference their lexical
//! successor and the first statement of each nested compound by [`StmtId`];
//! expressions reference their operands by [`ExprId`]. Nothing in a script is
//! mutated after parsing, so any number of processes can share one `Arc<Script>`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::values::Value;

/* ===================== Source Positions ===================== */

/// Source location for diagnostics (line and column are 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset into the source text
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/* ===================== Arena Indices ===================== */

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Index of a statement in [`Script::statements`]
    StmtId
);
arena_id!(
    /// Index of an expression in [`Script::expressions`]
    ExprId
);
arena_id!(
    /// Index of a function definition in [`Script::functions`]
    FuncId
);

/* ===================== Statements ===================== */

/// Statement node
///
/// `next` is the lexical successor. The last statement of a compound has no
/// successor; control leaves the compound through the owning context's
/// control-flow stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub next: Option<StmtId>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Evaluate and discard
    Expression(ExprId),
    /// Evaluate every argument and emit them as one line of text
    Print(Vec<ExprId>),
    Assign {
        target: Target,
        op: AssignOp,
        value: ExprId,
    },
    /// `local name = value` - always defines in the frame's own record
    Local {
        name: String,
        value: ExprId,
    },
    /// `def name(params): body` - binds a function capturing the current record
    Def {
        name: String,
        function: FuncId,
    },
    /// pass / continue / break / return / throw
    Flow {
        kind: FlowKind,
        argument: Option<ExprId>,
    },
    If {
        condition: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    While {
        condition: ExprId,
        body: StmtId,
    },
    For {
        variable: String,
        iterable: ExprId,
        body: StmtId,
    },
    Try {
        body: StmtId,
        binding: Option<String>,
        handler: StmtId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    Pass,
    Continue,
    Break,
    Return,
    Throw,
}

impl FlowKind {
    pub fn keyword(self) -> &'static str {
        match self {
            FlowKind::Pass => "pass",
            FlowKind::Continue => "continue",
            FlowKind::Break => "break",
            FlowKind::Return => "return",
            FlowKind::Throw => "throw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Set,
    Sum,
    Subtract,
    Multiply,
    Divide,
}

/// Assignment target: a variable, optionally followed by index/member steps
///
/// `a[i].b = v` is `Target { name: "a", path: [Index(i), Member("b")] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub path: Vec<Accessor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accessor {
    Index(ExprId),
    Member(String),
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Constant(Value),
    Name(String),
    /// `&name`
    Reference(String),
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Array(Vec<ExprId>),
    Dictionary(Vec<(ExprId, ExprId)>),
    Index {
        base: ExprId,
        index: ExprId,
    },
    Slice {
        base: ExprId,
        start: Option<ExprId>,
        end: Option<ExprId>,
    },
    Member {
        base: ExprId,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOp {
    /// Binding power for precedence climbing (higher binds tighter)
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual
            | BinaryOp::In => 3,
            BinaryOp::Add | BinaryOp::Subtract => 4,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 5,
            BinaryOp::Power => 7,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, BinaryOp::Power)
    }

    /// `and`/`or` only evaluate their right operand when the left one does not decide
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
        }
    }
}

/// Binding power of prefix operators: tighter than every binary operator except `**`
pub const UNARY_PRECEDENCE: u8 = 6;

/* ===================== Functions & Scripts ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: StmtId,
    pub pos: Position,
}

/// A compiled script: the read-only statement graph shared by processes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Script {
    pub statements: Vec<Stmt>,
    pub expressions: Vec<Expr>,
    pub functions: Vec<FunctionDef>,
    /// First top-level statement; `None` for a script without statements
    pub entry: Option<StmtId>,
}

impl Script {
    /// Statement by id
    ///
    /// Ids come from the parser or from a validated decode, so they are always in range.
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.statements[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.expressions[id.index()]
    }

    pub fn function(&self, id: FuncId) -> &FunctionDef {
        &self.functions[id.index()]
    }

    /// Walk a compound: the chain of statements starting at `first`
    pub fn compound(&self, first: StmtId) -> impl Iterator<Item = StmtId> + '_ {
        std::iter::successors(Some(first), move |id| self.stmt(*id).next)
    }

    pub fn has_stmt(&self, id: StmtId) -> bool {
        id.index() < self.statements.len()
    }

    pub fn has_expr(&self, id: ExprId) -> bool {
        id.index() < self.expressions.len()
    }

    pub fn has_function(&self, id: FuncId) -> bool {
        id.index() < self.functions.len()
    }
}
