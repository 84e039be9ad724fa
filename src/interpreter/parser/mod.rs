//! Parser - tokens to a linked statement graph
//!
//! Statements are parsed by recursive descent, expressions by precedence
//! climbing (see `expressions.rs`). Every node is appended to the arenas of
//! the [`Script`] under construction. A compound (suite) is a chain of
//! statements linked through `next`; the last statement of a chain keeps
//! `next == None` and the executor's control-flow stack decides where control
//! goes when the chain runs out.

mod expressions;


use std::collections::VecDeque;

use super::errors::{CompileError, ParseError};
use super::lexer::{Lexer, Token, TokenKind};
use super::types::{
    Accessor, AssignOp, Expr, ExprId, ExprKind, FlowKind, FuncId, FunctionDef, Position, Script,
    Stmt, StmtId, StmtKind, Target, Value,
};

pub type ParseResult<T> = Result<T, CompileError>;

/// Deepest expression or block nesting accepted before reporting an error
pub const MAX_NESTING: usize = 128;

/// Parse a complete source text into a script
pub fn parse(source: &str) -> ParseResult<Script> {
    Parser::new(source).parse_script()
}

/// First and last statement of a chain under construction
#[derive(Debug, Default, Clone, Copy)]
struct Chain {
    first: Option<StmtId>,
    last: Option<StmtId>,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: VecDeque<Token>,
    script: Script,
    /// Enclosing loops in the current function body
    loop_depth: usize,
    /// Open expressions and blocks; bounds parser recursion
    nesting: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: VecDeque::new(),
            script: Script::default(),
            loop_depth: 0,
            nesting: 0,
        }
    }

    pub fn parse_script(mut self) -> ParseResult<Script> {
        let mut chain = Chain::default();
        while self.peek_kind()? != TokenKind::Eof {
            self.parse_statement(&mut chain)?;
        }
        self.script.entry = chain.first;
        Ok(self.script)
    }

    /* ===================== Statements ===================== */

    fn parse_statement(&mut self, chain: &mut Chain) -> ParseResult<()> {
        let token = self.peek()?.clone();
        let id = match token.kind {
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Def => self.parse_def()?,
            TokenKind::Try => self.parse_try()?,
            TokenKind::Indent => return Err(self.error_at(&token, "unexpected indent")),
            TokenKind::Elif | TokenKind::Else => {
                return Err(self.error_at(&token, format!("{} without matching 'if'", token)))
            }
            TokenKind::Catch => {
                return Err(self.error_at(&token, "'catch' without matching 'try'"))
            }
            _ => return self.parse_simple_line(chain),
        };
        self.append(chain, id);
        Ok(())
    }

    /// `simple (';' simple)* [';'] NEWLINE`
    fn parse_simple_line(&mut self, chain: &mut Chain) -> ParseResult<()> {
        loop {
            let id = self.parse_simple()?;
            self.append(chain, id);
            if self.eat(TokenKind::Semicolon)?.is_none() || self.check(TokenKind::Newline)? {
                break;
            }
        }
        self.expect(TokenKind::Newline, "end of line after statement")?;
        Ok(())
    }

    fn parse_simple(&mut self) -> ParseResult<StmtId> {
        let token = self.peek()?.clone();
        let pos = token.pos;
        match token.kind {
            TokenKind::Pass => {
                self.advance()?;
                Ok(self.push_stmt(
                    StmtKind::Flow {
                        kind: FlowKind::Pass,
                        argument: None,
                    },
                    pos,
                ))
            }
            TokenKind::Break => self.parse_loop_flow(FlowKind::Break),
            TokenKind::Continue => self.parse_loop_flow(FlowKind::Continue),
            TokenKind::Return => {
                self.advance()?;
                let argument = self.parse_optional_expression()?;
                Ok(self.push_stmt(
                    StmtKind::Flow {
                        kind: FlowKind::Return,
                        argument,
                    },
                    pos,
                ))
            }
            TokenKind::Throw => {
                self.advance()?;
                let argument = Some(self.parse_expression()?);
                Ok(self.push_stmt(
                    StmtKind::Flow {
                        kind: FlowKind::Throw,
                        argument,
                    },
                    pos,
                ))
            }
            TokenKind::Print => {
                self.advance()?;
                let mut args = Vec::new();
                if self.starts_expression()? {
                    args.push(self.parse_expression()?);
                    while self.eat(TokenKind::Comma)?.is_some() {
                        args.push(self.parse_expression()?);
                    }
                }
                Ok(self.push_stmt(StmtKind::Print(args), pos))
            }
            TokenKind::Local => {
                self.advance()?;
                let name = self.expect(TokenKind::Identifier, "variable name after 'local'")?;
                self.expect(TokenKind::Assign, "'=' in local declaration")?;
                let value = self.parse_expression()?;
                Ok(self.push_stmt(
                    StmtKind::Local {
                        name: name.text,
                        value,
                    },
                    pos,
                ))
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Expression statement, or an assignment when an assignment operator follows
    fn parse_expression_statement(&mut self) -> ParseResult<StmtId> {
        let pos = self.peek()?.pos;
        let expr = self.parse_expression()?;

        let op = match self.peek_kind()? {
            TokenKind::Assign => AssignOp::Set,
            TokenKind::PlusAssign => AssignOp::Sum,
            TokenKind::MinusAssign => AssignOp::Subtract,
            TokenKind::StarAssign => AssignOp::Multiply,
            TokenKind::SlashAssign => AssignOp::Divide,
            _ => return Ok(self.push_stmt(StmtKind::Expression(expr), pos)),
        };
        let op_token = self.advance()?;
        let target = self
            .to_target(expr)
            .ok_or_else(|| ParseError::new(op_token.pos, "invalid assignment target"))?;
        let value = self.parse_expression()?;
        Ok(self.push_stmt(StmtKind::Assign { target, op, value }, pos))
    }

    /// Reinterpret a parsed expression as an assignment target
    fn to_target(&self, expr: ExprId) -> Option<Target> {
        match &self.script.expr(expr).kind {
            ExprKind::Name(name) => Some(Target {
                name: name.clone(),
                path: Vec::new(),
            }),
            ExprKind::Index { base, index } => {
                let mut target = self.to_target(*base)?;
                target.path.push(Accessor::Index(*index));
                Some(target)
            }
            ExprKind::Member { base, name } => {
                let mut target = self.to_target(*base)?;
                target.path.push(Accessor::Member(name.clone()));
                Some(target)
            }
            _ => None,
        }
    }

    /// `break [count]` / `continue [count]`
    fn parse_loop_flow(&mut self, kind: FlowKind) -> ParseResult<StmtId> {
        let token = self.advance()?;
        if self.loop_depth == 0 {
            return Err(self.error_at(&token, format!("'{}' outside loop", kind.keyword())));
        }
        let argument = self.parse_optional_expression()?;

        if let Some(arg) = argument {
            if let ExprKind::Constant(value) = &self.script.expr(arg).kind {
                match value.as_integer() {
                    Some(n) if n >= 1 && n as usize <= self.loop_depth => {}
                    Some(n) if n >= 1 => {
                        return Err(self.error_at(
                            &token,
                            format!(
                                "cannot {} {} loops, only {} enclosing",
                                kind.keyword(),
                                n,
                                self.loop_depth
                            ),
                        ))
                    }
                    _ => {
                        return Err(self.error_at(
                            &token,
                            format!("{} count must be a positive integer", kind.keyword()),
                        ))
                    }
                }
            }
        }
        Ok(self.push_stmt(StmtKind::Flow { kind, argument }, token.pos))
    }

    /* ===================== Compound Statements ===================== */

    /// `if cond: suite (elif cond: suite)* [else: suite]`
    fn parse_if(&mut self) -> ParseResult<StmtId> {
        let token = self.advance()?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Colon, "':' after if condition")?;
        let then_branch = self.parse_suite()?;

        let else_branch = match self.peek_kind()? {
            // elif is an if nested as the sole statement of the else branch
            TokenKind::Elif => Some(self.parse_if()?),
            TokenKind::Else => {
                self.advance()?;
                self.expect(TokenKind::Colon, "':' after else")?;
                Some(self.parse_suite()?)
            }
            _ => None,
        };

        Ok(self.push_stmt(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            token.pos,
        ))
    }

    fn parse_while(&mut self) -> ParseResult<StmtId> {
        let token = self.advance()?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Colon, "':' after while condition")?;
        let body = self.parse_loop_body()?;
        Ok(self.push_stmt(StmtKind::While { condition, body }, token.pos))
    }

    fn parse_for(&mut self) -> ParseResult<StmtId> {
        let token = self.advance()?;
        let variable = self.expect(TokenKind::Identifier, "loop variable after 'for'")?;
        self.expect(TokenKind::In, "'in' after loop variable")?;
        let iterable = self.parse_expression()?;
        self.expect(TokenKind::Colon, "':' after for clause")?;
        let body = self.parse_loop_body()?;
        Ok(self.push_stmt(
            StmtKind::For {
                variable: variable.text,
                iterable,
                body,
            },
            token.pos,
        ))
    }

    fn parse_loop_body(&mut self) -> ParseResult<StmtId> {
        self.loop_depth += 1;
        let body = self.parse_suite();
        self.loop_depth -= 1;
        body
    }

    /// `def name(params): suite`
    fn parse_def(&mut self) -> ParseResult<StmtId> {
        let token = self.advance()?;
        let name = self.expect(TokenKind::Identifier, "function name after 'def'")?;
        self.expect(TokenKind::LParen, "'(' after function name")?;

        let mut params: Vec<String> = Vec::new();
        while !self.check(TokenKind::RParen)? {
            let param = self.expect(TokenKind::Identifier, "parameter name")?;
            if params.contains(&param.text) {
                return Err(self.error_at(
                    &param,
                    format!("duplicate parameter '{}'", param.text),
                ));
            }
            params.push(param.text);
            if self.eat(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' after parameters")?;
        self.expect(TokenKind::Colon, "':' after function signature")?;

        // Loops do not extend into function bodies
        let outer_depth = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.parse_suite();
        self.loop_depth = outer_depth;
        let body = body?;

        let function = FuncId(self.script.functions.len() as u32);
        self.script.functions.push(FunctionDef {
            name: name.text.clone(),
            params,
            body,
            pos: token.pos,
        });
        Ok(self.push_stmt(
            StmtKind::Def {
                name: name.text,
                function,
            },
            token.pos,
        ))
    }

    /// `try: suite catch [name]: suite`
    fn parse_try(&mut self) -> ParseResult<StmtId> {
        let token = self.advance()?;
        self.expect(TokenKind::Colon, "':' after 'try'")?;
        let body = self.parse_suite()?;

        self.expect(TokenKind::Catch, "'catch' after try block")?;
        let binding = self
            .eat(TokenKind::Identifier)?
            .map(|identifier| identifier.text);
        self.expect(TokenKind::Colon, "':' after catch")?;
        let handler = self.parse_suite()?;

        Ok(self.push_stmt(
            StmtKind::Try {
                body,
                binding,
                handler,
            },
            token.pos,
        ))
    }

    /// Inline simple statements, or NEWLINE INDENT statements DEDENT
    ///
    /// Returns the first statement of the chain; its last statement has no successor.
    fn parse_suite(&mut self) -> ParseResult<StmtId> {
        self.nested(Self::parse_suite_body)
    }

    fn parse_suite_body(&mut self) -> ParseResult<StmtId> {
        let pos = self.peek()?.pos;
        let mut chain = Chain::default();

        if self.eat(TokenKind::Newline)?.is_some() {
            self.expect(TokenKind::Indent, "an indented block")?;
            while !self.check(TokenKind::Dedent)? {
                if self.check(TokenKind::Eof)? {
                    let token = self.peek()?.clone();
                    return Err(self.error_at(&token, "unterminated block"));
                }
                self.parse_statement(&mut chain)?;
            }
            self.advance()?;
        } else {
            self.parse_simple_line(&mut chain)?;
        }

        chain
            .first
            .ok_or_else(|| ParseError::new(pos, "expected an indented block").into())
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.nesting >= MAX_NESTING {
            let token = self.peek()?.clone();
            return Err(self.error_at(&token, format!("nesting exceeds {} levels", MAX_NESTING)));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    /* ===================== Arena ===================== */

    fn push_stmt(&mut self, kind: StmtKind, pos: Position) -> StmtId {
        let id = StmtId(self.script.statements.len() as u32);
        self.script.statements.push(Stmt {
            kind,
            next: None,
            pos,
        });
        id
    }

    fn push_expr(&mut self, kind: ExprKind, pos: Position) -> ExprId {
        let id = ExprId(self.script.expressions.len() as u32);
        self.script.expressions.push(Expr { kind, pos });
        id
    }

    fn constant(&self, id: ExprId) -> Option<&Value> {
        match &self.script.expr(id).kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    fn append(&mut self, chain: &mut Chain, id: StmtId) {
        match chain.last {
            Some(last) => self.script.statements[last.index()].next = Some(id),
            None => chain.first = Some(id),
        }
        chain.last = Some(id);
    }

    /* ===================== Token Cursor ===================== */

    fn peek(&mut self) -> ParseResult<&Token> {
        if self.lookahead.is_empty() {
            let token = self.lexer.next_token()?;
            self.lookahead.push_back(token);
        }
        Ok(&self.lookahead[0])
    }

    fn peek_kind(&mut self) -> ParseResult<TokenKind> {
        Ok(self.peek()?.kind)
    }

    fn advance(&mut self) -> ParseResult<Token> {
        self.peek()?;
        match self.lookahead.pop_front() {
            Some(token) => Ok(token),
            None => Ok(self.lexer.next_token()?),
        }
    }

    fn check(&mut self, kind: TokenKind) -> ParseResult<bool> {
        Ok(self.peek_kind()? == kind)
    }

    fn eat(&mut self, kind: TokenKind) -> ParseResult<Option<Token>> {
        if self.check(kind)? {
            Ok(Some(self.advance()?))
        } else {
            Ok(None)
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        let token = self.peek()?.clone();
        if token.kind == kind {
            return self.advance();
        }
        Err(self.error_at(&token, format!("expected {}, found {}", what, token)))
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> CompileError {
        ParseError::new(token.pos, message).into()
    }
}
