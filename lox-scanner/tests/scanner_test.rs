// lox-scanner - Scanner integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use lox_scanner::{Scanner, TokenKind};

fn scan_all(source: &str) -> Vec<(TokenKind, String)> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.scan_token();
        tokens.push((token.kind, token.lexeme.to_string()));
        if token.kind == TokenKind::Eof {
            return tokens;
        }
    }
}

#[test]
fn punctuation() {
    let tokens = scan_all("(){};,.-+/*");
    let kinds: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::LeftParen,
            TokenKind::RightParen,
            TokenKind::LeftBrace,
            TokenKind::RightBrace,
            TokenKind::Semicolon,
            TokenKind::Comma,
            TokenKind::Dot,
            TokenKind::Minus,
            TokenKind::Plus,
            TokenKind::Slash,
            TokenKind::Star,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn all_keywords() {
    let source = "and class else false for fun if nil or print return super this true var while";
    let tokens = scan_all(source);
    let kinds: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::And,
            TokenKind::Class,
            TokenKind::Else,
            TokenKind::False,
            TokenKind::For,
            TokenKind::Fun,
            TokenKind::If,
            TokenKind::Nil,
            TokenKind::Or,
            TokenKind::Print,
            TokenKind::Return,
            TokenKind::Super,
            TokenKind::This,
            TokenKind::True,
            TokenKind::Var,
            TokenKind::While,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn string_literal_keeps_quotes_in_lexeme() {
    let tokens = scan_all("\"hello world\"");
    assert_eq!(tokens[0].0, TokenKind::String);
    assert_eq!(tokens[0].1, "\"hello world\"");
}

#[test]
fn unterminated_string_is_error_token() {
    let tokens = scan_all("\"oops");
    assert_eq!(tokens[0].0, TokenKind::Error);
    assert_eq!(tokens[0].1, "Unterminated string literal.");
}

#[test]
fn unexpected_character_is_error_token() {
    let tokens = scan_all("@");
    assert_eq!(tokens[0].0, TokenKind::Error);
    assert_eq!(tokens[0].1, "Unexpected character.");
}

#[test]
fn comments_and_whitespace_are_skipped() {
    let tokens = scan_all("// nothing here\n  1 // trailing\n2");
    assert_eq!(tokens[0].1, "1");
    assert_eq!(tokens[1].1, "2");
    assert_eq!(tokens[2].0, TokenKind::Eof);
}

#[test]
fn line_numbers_track_newlines() {
    let mut scanner = Scanner::new("1\n2\n\n3");
    assert_eq!(scanner.scan_token().line, 1);
    assert_eq!(scanner.scan_token().line, 2);
    assert_eq!(scanner.scan_token().line, 4);
}

#[test]
fn eof_is_idempotent() {
    let mut scanner = Scanner::new("x");
    assert_eq!(scanner.scan_token().kind, TokenKind::Identifier);
    assert_eq!(scanner.scan_token().kind, TokenKind::Eof);
    assert_eq!(scanner.scan_token().kind, TokenKind::Eof);
    assert_eq!(scanner.scan_token().kind, TokenKind::Eof);
}

#[test]
fn multiline_string_counts_lines() {
    let mut scanner = Scanner::new("\"a\nb\" x");
    let s = scanner.scan_token();
    assert_eq!(s.kind, TokenKind::String);
    let x = scanner.scan_token();
    assert_eq!(x.line, 2);
}
