//! Expression parsing by precedence climbing, with constant folding

use super::{ParseResult, Parser};
use crate::interpreter::errors::ParseError;
use crate::interpreter::lexer::TokenKind;
use crate::interpreter::types::{
    operators, BinaryOp, ExprId, ExprKind, Position, UnaryOp, Value,
};
use crate::interpreter::types::ast::UNARY_PRECEDENCE;

/// Largest text or array a repetition may fold into a constant
const MAX_FOLDED_LEN: usize = 1024;

/// Repetitions producing large sequences are left to run time
fn small_enough_to_fold(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    if !matches!(op, BinaryOp::Multiply) {
        return true;
    }
    let (len, count) = match (lhs, rhs) {
        (Value::Text(s), n) | (n, Value::Text(s)) => (s.len(), n),
        (Value::Array(items), n) => (items.len(), n),
        _ => return true,
    };
    match count.as_integer() {
        Some(n) if n >= 0 => usize::try_from(n)
            .ok()
            .and_then(|n| n.checked_mul(len))
            .is_some_and(|total| total <= MAX_FOLDED_LEN),
        // invalid counts fail to fold anyway
        _ => true,
    }
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Or => BinaryOp::Or,
        TokenKind::And => BinaryOp::And,
        TokenKind::EqualEqual => BinaryOp::Equal,
        TokenKind::NotEqual => BinaryOp::NotEqual,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::In => BinaryOp::In,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Subtract,
        TokenKind::Star => BinaryOp::Multiply,
        TokenKind::Slash => BinaryOp::Divide,
        TokenKind::Percent => BinaryOp::Modulo,
        TokenKind::StarStar => BinaryOp::Power,
        _ => return None,
    };
    Some(op)
}

impl Parser<'_> {
    pub(super) fn parse_expression(&mut self) -> ParseResult<ExprId> {
        self.parse_binary(1)
    }

    /// Expression if one starts here (`return`, `break 2`, ...)
    pub(super) fn parse_optional_expression(&mut self) -> ParseResult<Option<ExprId>> {
        if self.starts_expression()? {
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    pub(super) fn starts_expression(&mut self) -> ParseResult<bool> {
        Ok(matches!(
            self.peek_kind()?,
            TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::Text
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::Not
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Ampersand
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
        ))
    }

    /// Climb binary operators binding at least as tightly as `min_precedence`
    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<ExprId> {
        self.nested(|parser| parser.climb(min_precedence))
    }

    fn climb(&mut self, min_precedence: u8) -> ParseResult<ExprId> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = binary_op(self.peek_kind()?) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            let token = self.advance()?;
            let next_min = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let rhs = self.parse_binary(next_min)?;
            lhs = self.make_binary(op, lhs, rhs, token.pos);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<ExprId> {
        let op = match self.peek_kind()? {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let token = self.advance()?;
        // Only `**` binds tighter: -2 ** 2 is -(2 ** 2)
        let operand = self.parse_binary(UNARY_PRECEDENCE + 1)?;
        Ok(self.make_unary(op, operand, token.pos))
    }

    /// Calls, indexing, slicing and member access, left to right
    fn parse_postfix(&mut self) -> ParseResult<ExprId> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind()? {
                TokenKind::LParen => {
                    let token = self.advance()?;
                    let args = self.parse_list(TokenKind::RParen, "')' after arguments")?;
                    expr = self.push_expr(ExprKind::Call { callee: expr, args }, token.pos);
                }
                TokenKind::LBracket => {
                    let token = self.advance()?;
                    expr = self.parse_subscript(expr, token.pos)?;
                }
                TokenKind::Dot => {
                    let token = self.advance()?;
                    let name = self.expect(TokenKind::Identifier, "member name after '.'")?;
                    expr = self.push_expr(
                        ExprKind::Member {
                            base: expr,
                            name: name.text,
                        },
                        token.pos,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `[index]` or `[start:end]` after the opening bracket
    fn parse_subscript(&mut self, base: ExprId, pos: Position) -> ParseResult<ExprId> {
        let start = if self.check(TokenKind::Colon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };

        if self.eat(TokenKind::Colon)?.is_some() {
            let end = if self.check(TokenKind::RBracket)? {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.expect(TokenKind::RBracket, "']' after slice")?;
            return Ok(self.push_expr(ExprKind::Slice { base, start, end }, pos));
        }

        self.expect(TokenKind::RBracket, "']' after index")?;
        match start {
            Some(index) => Ok(self.push_expr(ExprKind::Index { base, index }, pos)),
            None => Err(ParseError::new(pos, "expected index expression").into()),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<ExprId> {
        let token = self.advance()?;
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::Number => {
                let n = token.text.parse::<f64>().map_err(|_| {
                    ParseError::new(pos, format!("invalid number literal '{}'", token.text))
                })?;
                ExprKind::Constant(Value::Number(n))
            }
            TokenKind::Text => ExprKind::Constant(Value::Text(token.text)),
            TokenKind::True => ExprKind::Constant(Value::boolean(true)),
            TokenKind::False => ExprKind::Constant(Value::boolean(false)),
            TokenKind::None => ExprKind::Constant(Value::None),
            TokenKind::Identifier => ExprKind::Name(token.text),
            TokenKind::Ampersand => {
                let name = self.expect(TokenKind::Identifier, "variable name after '&'")?;
                ExprKind::Reference(name.text)
            }
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                let items = self.parse_list(TokenKind::RBracket, "']' after array items")?;
                return Ok(self.make_array(items, pos));
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.check(TokenKind::RBrace)? {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::Colon, "':' after dictionary key")?;
                    let value = self.parse_expression()?;
                    entries.push((key, value));
                    if self.eat(TokenKind::Comma)?.is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}' after dictionary entries")?;
                ExprKind::Dictionary(entries)
            }
            _ => {
                return Err(self.error_at(&token, format!("expected expression, found {}", token)))
            }
        };
        Ok(self.push_expr(kind, pos))
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed
    fn parse_list(&mut self, close: TokenKind, what: &str) -> ParseResult<Vec<ExprId>> {
        let mut items = Vec::new();
        while !self.check(close)? {
            items.push(self.parse_expression()?);
            if self.eat(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.expect(close, what)?;
        Ok(items)
    }

    /* ===================== Folding ===================== */

    fn make_unary(&mut self, op: UnaryOp, operand: ExprId, pos: Position) -> ExprId {
        if self.is_tail(operand) {
            if let Some(Ok(value)) = self.constant(operand).map(|v| operators::unary(op, v)) {
                self.script.expressions.truncate(operand.index());
                return self.push_expr(ExprKind::Constant(value), pos);
            }
        }
        self.push_expr(ExprKind::Unary { op, operand }, pos)
    }

    /// Operations that would fail at runtime are left for the evaluator to report
    fn make_binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId, pos: Position) -> ExprId {
        if self.is_tail(rhs) && lhs.index() + 1 == rhs.index() {
            let folded = match (self.constant(lhs), self.constant(rhs)) {
                (Some(a), Some(b)) if small_enough_to_fold(op, a, b) => {
                    operators::binary(op, a, b).ok()
                }
                _ => None,
            };
            if let Some(value) = folded {
                self.script.expressions.truncate(lhs.index());
                return self.push_expr(ExprKind::Constant(value), pos);
            }
        }
        self.push_expr(ExprKind::Binary { op, lhs, rhs }, pos)
    }

    /// Arrays of constants become a single constant
    fn make_array(&mut self, items: Vec<ExprId>, pos: Position) -> ExprId {
        let contiguous = items
            .iter()
            .enumerate()
            .all(|(i, id)| items[0].index() + i == id.index())
            && items.last().is_some_and(|last| self.is_tail(*last));
        if contiguous {
            let values: Option<Vec<Value>> =
                items.iter().map(|id| self.constant(*id).cloned()).collect();
            if let Some(values) = values {
                self.script.expressions.truncate(items[0].index());
                return self.push_expr(ExprKind::Constant(Value::Array(values)), pos);
            }
        }
        self.push_expr(ExprKind::Array(items), pos)
    }

    fn is_tail(&self, id: ExprId) -> bool {
        id.index() + 1 == self.script.expressions.len()
    }
}

