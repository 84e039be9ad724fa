//! Lexer - source text to layout-aware tokens
//!
//! Tokens are produced lazily by [`Lexer::next_token`]. Indentation at the
//! start of a logical line becomes `Indent`/`Dedent` tokens and the end of a
//! non-blank line becomes `Newline`. Inside brackets, line breaks and
//! indentation are ignored. Blank lines and `#` comments emit nothing.

mod token;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

pub use token::{Token, TokenKind};

use super::errors::{LexError, LexErrorKind};
use super::types::Position;

const TAB_WIDTH: usize = 4;

pub struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    indent_stack: Vec<usize>,
    pending: VecDeque<Token>,
    at_line_start: bool,
    line_has_tokens: bool,
    bracket_depth: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            pending: VecDeque::new(),
            at_line_start: true,
            line_has_tokens: false,
            bracket_depth: 0,
            finished: false,
        }
    }

    /// Produce the next token; returns `Eof` forever once input is exhausted
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            if self.finished {
                return Ok(Token::new(TokenKind::Eof, "", self.cursor()));
            }

            if self.at_line_start && self.bracket_depth == 0 {
                self.at_line_start = false;
                self.measure_indentation()?;
                continue;
            }

            self.skip_trivia();

            let Some(ch) = self.peek() else {
                self.finish();
                continue;
            };

            if ch == '\n' {
                let pos = self.cursor();
                self.bump();
                if self.bracket_depth > 0 {
                    continue;
                }
                self.at_line_start = true;
                if self.line_has_tokens {
                    self.line_has_tokens = false;
                    return Ok(Token::new(TokenKind::Newline, "", pos));
                }
                continue;
            }

            let token = self.lex_token(ch)?;
            self.line_has_tokens = true;
            return Ok(token);
        }
    }

    /* ===================== Layout ===================== */

    /// Compare this line's indentation with the stack, queueing Indent/Dedent
    fn measure_indentation(&mut self) -> Result<(), LexError> {
        let mut width = 0;
        while let Some(ch) = self.peek() {
            match ch {
                ' ' => width += 1,
                '\t' => {
                    // Tabs only matter when the line has content
                    let rest = &self.source[self.offset..];
                    let content = rest.trim_start_matches(&[' ', '\t', '\r'][..]);
                    if !(content.is_empty() || content.starts_with(|c: char| c == '\n' || c == '#')) {
                        return Err(LexError::new(LexErrorKind::TabIndentation, self.cursor()));
                    }
                    width += TAB_WIDTH;
                }
                '\r' => {}
                _ => break,
            }
            self.bump();
        }

        // Blank and comment-only lines do not affect layout
        match self.peek() {
            None | Some('\n') | Some('#') => return Ok(()),
            _ => {}
        }

        let pos = self.cursor();
        let current = self.indent_stack.last().copied().unwrap_or(0);
        if width > current {
            self.indent_stack.push(width);
            self.pending.push_back(Token::new(TokenKind::Indent, "", pos));
        } else if width < current {
            while self.indent_stack.last().is_some_and(|&top| top > width) {
                self.indent_stack.pop();
                self.pending.push_back(Token::new(TokenKind::Dedent, "", pos));
            }
            if self.indent_stack.last().copied().unwrap_or(0) != width {
                return Err(LexError::new(LexErrorKind::InconsistentDedent, pos));
            }
        }
        Ok(())
    }

    /// Close the last line and every open block at end of input
    fn finish(&mut self) {
        let pos = self.cursor();
        if self.line_has_tokens {
            self.line_has_tokens = false;
            self.pending.push_back(Token::new(TokenKind::Newline, "", pos));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending.push_back(Token::new(TokenKind::Dedent, "", pos));
        }
        self.pending.push_back(Token::new(TokenKind::Eof, "", pos));
        self.finished = true;
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /* ===================== Tokens ===================== */

    fn lex_token(&mut self, ch: char) -> Result<Token, LexError> {
        let pos = self.cursor();

        if ch.is_alphabetic() || ch == '_' {
            let ident = self.take_while(|c| c.is_alphanumeric() || c == '_');
            let kind = TokenKind::keyword(&ident).unwrap_or(TokenKind::Identifier);
            return Ok(Token::new(kind, ident, pos));
        }
        if ch.is_ascii_digit() {
            return self.lex_number(pos);
        }
        if ch == '"' || ch == '\'' {
            return self.lex_text(ch, pos);
        }

        self.bump();
        let kind = match ch {
            '+' => self.with_equals(TokenKind::Plus, TokenKind::PlusAssign),
            '-' => self.with_equals(TokenKind::Minus, TokenKind::MinusAssign),
            '*' if self.peek() == Some('*') => {
                self.bump();
                TokenKind::StarStar
            }
            '*' => self.with_equals(TokenKind::Star, TokenKind::StarAssign),
            '/' => self.with_equals(TokenKind::Slash, TokenKind::SlashAssign),
            '%' => TokenKind::Percent,
            '=' => self.with_equals(TokenKind::Assign, TokenKind::EqualEqual),
            '<' => self.with_equals(TokenKind::Less, TokenKind::LessEqual),
            '>' => self.with_equals(TokenKind::Greater, TokenKind::GreaterEqual),
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::NotEqual
            }
            '&' => TokenKind::Ampersand,
            '(' | '[' | '{' => {
                self.bracket_depth += 1;
                match ch {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                }
            }
            ')' | ']' | '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                match ch {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            other => {
                return Err(LexError::new(
                    LexErrorKind::UnexpectedCharacter(other),
                    pos,
                ))
            }
        };
        Ok(Token::new(kind, "", pos))
    }

    fn with_equals(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.bump();
            with_eq
        } else {
            plain
        }
    }

    /// digits ('.' digits)? ([eE] [+-]? digits)?
    fn lex_number(&mut self, pos: Position) -> Result<Token, LexError> {
        let start = self.offset;
        self.take_while(|c| c.is_ascii_digit());

        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }

        let mut malformed = false;
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            malformed = self.take_while(|c| c.is_ascii_digit()).is_empty();
        }

        // `12abc` is one bad literal, not a number followed by a name
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.take_while(|c| c.is_alphanumeric() || c == '_');
            malformed = true;
        }

        let lexeme = &self.source[start..self.offset];
        if malformed || lexeme.parse::<f64>().is_err() {
            return Err(LexError::new(
                LexErrorKind::MalformedNumber(lexeme.to_string()),
                pos,
            ));
        }
        Ok(Token::new(TokenKind::Number, lexeme, pos))
    }

    fn lex_text(&mut self, quote: char, pos: Position) -> Result<Token, LexError> {
        self.bump();
        let mut text = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(LexError::new(LexErrorKind::UnterminatedText, pos));
            };
            match ch {
                '\n' => return Err(LexError::new(LexErrorKind::UnterminatedText, pos)),
                c if c == quote => {
                    self.bump();
                    return Ok(Token::new(TokenKind::Text, text, pos));
                }
                '\\' => {
                    let escape_pos = self.cursor();
                    self.bump();
                    let Some(esc) = self.bump() else {
                        return Err(LexError::new(LexErrorKind::UnterminatedText, pos));
                    };
                    let decoded = match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        'u' => self.lex_unicode_escape(escape_pos)?,
                        other => {
                            return Err(LexError::new(LexErrorKind::InvalidEscape(other), escape_pos))
                        }
                    };
                    text.push(decoded);
                }
                c => {
                    self.bump();
                    text.push(c);
                }
            }
        }
    }

    /// `\u{HEX}` after the `u` has been consumed
    fn lex_unicode_escape(&mut self, escape_pos: Position) -> Result<char, LexError> {
        let invalid = || LexError::new(LexErrorKind::InvalidEscape('u'), escape_pos);
        if self.peek() != Some('{') {
            return Err(invalid());
        }
        self.bump();
        let digits = self.take_while(|c| c.is_ascii_hexdigit());
        if self.peek() != Some('}') || digits.is_empty() || digits.len() > 6 {
            return Err(invalid());
        }
        self.bump();
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(invalid)
    }

    /* ===================== Cursor ===================== */

    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.offset..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.offset;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        self.source[start..self.offset].to_string()
    }

    fn cursor(&self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    /// Yields every token including the final `Eof`, then stops
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished && self.pending.is_empty() {
            return None;
        }
        Some(self.next_token())
    }
}

/// Lex a whole source text (testing and tooling helper)
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).collect()
}
