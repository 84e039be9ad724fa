//! Lexer tests - token streams, layout tokens, and malformed input

use super::{tokenize, Lexer, TokenKind};
use crate::interpreter::errors::LexErrorKind;

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .expect("tokenize should succeed")
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

#[test]
fn test_simple_program() {
    let source = "def f(a):\n    return a + 1\nf(2)\n";
    assert_eq!(
        kinds(source),
        vec![
            TokenKind::Def,
            TokenKind::Identifier,
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Return,
            TokenKind::Identifier,
            TokenKind::Plus,
            TokenKind::Number,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Identifier,
            TokenKind::LParen,
            TokenKind::Number,
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_missing_trailing_newline_closes_blocks() {
    let source = "while x:\n    x -= 1";
    assert_eq!(
        kinds(source),
        vec![
            TokenKind::While,
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Identifier,
            TokenKind::MinusAssign,
            TokenKind::Number,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_blank_lines_and_comments_emit_nothing() {
    let source = "# header\n\nx = 1  # trailing\n    # indented comment\n\ny = 2\n";
    assert_eq!(
        kinds(source),
        vec![
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Number,
            TokenKind::Newline,
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Number,
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_brackets_suppress_layout() {
    let source = "x = [1,\n        2,\n  3]\n";
    assert_eq!(
        kinds(source),
        vec![
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::LBracket,
            TokenKind::Number,
            TokenKind::Comma,
            TokenKind::Number,
            TokenKind::Comma,
            TokenKind::Number,
            TokenKind::RBracket,
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_multiple_dedents() {
    let source = "if a:\n  if b:\n    pass\nx\n";
    let tokens = kinds(source);
    let dedents = tokens.iter().filter(|k| **k == TokenKind::Dedent).count();
    assert_eq!(dedents, 2);
}

#[test]
fn test_operators() {
    assert_eq!(
        kinds("** * *= == != <= >= < > = += -= /= & %"),
        vec![
            TokenKind::StarStar,
            TokenKind::Star,
            TokenKind::StarAssign,
            TokenKind::EqualEqual,
            TokenKind::NotEqual,
            TokenKind::LessEqual,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::Greater,
            TokenKind::Assign,
            TokenKind::PlusAssign,
            TokenKind::MinusAssign,
            TokenKind::SlashAssign,
            TokenKind::Ampersand,
            TokenKind::Percent,
            TokenKind::Newline,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_keywords_and_identifiers() {
    let tokens = tokenize("while whilex not_ none").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::While);
    assert_eq!(tokens[1].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].text, "whilex");
    assert_eq!(tokens[2].kind, TokenKind::Identifier);
    assert_eq!(tokens[3].kind, TokenKind::None);
}

#[test]
fn test_number_literals() {
    let tokens = tokenize("12 3.25 2e3 1.5E-2 7.foo").unwrap();
    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(&texts[..5], &["12", "3.25", "2e3", "1.5E-2", "7"]);
    assert_eq!(tokens[5].kind, TokenKind::Dot);
}

#[test]
fn test_text_escapes() {
    let tokens = tokenize(r#"'a\n\t\\' "q\"\u{48}""#).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Text);
    assert_eq!(tokens[0].text, "a\n\t\\");
    assert_eq!(tokens[1].text, "q\"H");
}

#[test]
fn test_positions_are_one_based() {
    let tokens = tokenize("x = 1\n  \ny = 'b'\n").unwrap();
    let y = tokens.iter().find(|t| t.text == "y").unwrap();
    assert_eq!((y.pos.line, y.pos.column), (3, 1));
    let b = tokens.iter().find(|t| t.kind == TokenKind::Text).unwrap();
    assert_eq!((b.pos.line, b.pos.column), (3, 5));
}

#[test]
fn test_iterator_reports_positions() {
    let tokens: Vec<_> = Lexer::new("a\n  b\n").map(|token| token.unwrap()).collect();
    let b = tokens.iter().find(|t| t.text == "b").unwrap();
    assert_eq!((b.pos.line, b.pos.column), (2, 3));
    assert_eq!(b.pos.offset, 4);
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
}

#[test]
fn test_eof_repeats() {
    let mut lexer = Lexer::new("");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
}

/* ===================== Errors ===================== */

#[test]
fn test_unterminated_text() {
    let err = tokenize("x = 'abc\ny = 1").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedText);
    assert_eq!(err.pos.column, 5);
}

#[test]
fn test_invalid_escape() {
    let err = tokenize(r#""\q""#).unwrap_err();
    assert_eq!(err.kind, LexErrorKind::InvalidEscape('q'));
}

#[test]
fn test_malformed_numbers() {
    let err = tokenize("x = 12abc").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::MalformedNumber("12abc".to_string()));

    let err = tokenize("x = 1e").unwrap_err();
    assert!(matches!(err.kind, LexErrorKind::MalformedNumber(_)));
}

#[test]
fn test_unexpected_character() {
    let err = tokenize("x = 1 @ 2\n").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnexpectedCharacter('@'));
    assert!(err.to_string().contains("line 1, column 7"));
}

#[test]
fn test_inconsistent_dedent() {
    let err = tokenize("if a:\n    b\n  c\n").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::InconsistentDedent);
    assert_eq!(err.pos.line, 3);
}

#[test]
fn test_tab_indentation_rejected() {
    let err = tokenize("if a:\n\tb\n").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::TabIndentation);
}
