//! Source-to-tokens scanning.
//!
//! The raw lexical categories are derived with `logos` (the corpus's
//! token-enum technique); [`Lexer`] wraps the derived scanner to track
//! line/column, fold identifiers through the keyword table, and apply the
//! handful of rules `logos` can't express declaratively: the `//`
//! diagnostic, keyword case-insensitivity, and numeric-lexeme preservation.

use crate::error::Position;
use crate::frontend::token::{lookup_keyword, Token, TokenKind};
use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Raw {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,
    #[regex(r#""[^"\n]*""#)]
    StringLit,
    #[regex(r#""[^"\n]*"#)]
    UnterminatedString,
    #[regex(r"#[^\n]*")]
    Comment,
    #[token("//")]
    DoubleSlash,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Eq,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
}

/// Scans `source` into a flat token list terminated by `Eof`. Never fails:
/// lexical problems are carried as `Error`/`Unknown` tokens, per spec.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut line_start = 0usize;

    let mut raw = Raw::lexer(source);
    while let Some(result) = raw.next() {
        let span = raw.span();
        let slice = &source[span.clone()];

        // Advance line/column bookkeeping over any skipped whitespace between
        // the previous token and this one.
        let before = &source[line_start..span.start];
        line += before.matches('\n').count();
        if let Some(last_nl) = before.rfind('\n') {
            line_start += last_nl + 1;
        }
        let column = span.start - line_start + 1;
        let position = Position { line, column };

        let token = match result {
            Ok(Raw::Ident) => {
                let lowered = slice.to_ascii_lowercase();
                let kind = lookup_keyword(&lowered).unwrap_or(TokenKind::Ident);
                Token::new(kind, slice, position)
            }
            Ok(Raw::Number) => Token::new(TokenKind::Number, slice, position),
            Ok(Raw::StringLit) => Token::new(TokenKind::Text, slice, position),
            Ok(Raw::UnterminatedString) => Token::new(TokenKind::Unknown, slice, position),
            Ok(Raw::Comment) => Token::new(TokenKind::Comment, slice, position),
            Ok(Raw::DoubleSlash) => {
                Token::new(TokenKind::Error, "'//' not supported, use '#'", position)
            }
            Ok(Raw::EqEq) => Token::new(TokenKind::EqEq, slice, position),
            Ok(Raw::NotEq) => Token::new(TokenKind::NotEq, slice, position),
            Ok(Raw::LtEq) => Token::new(TokenKind::LtEq, slice, position),
            Ok(Raw::GtEq) => Token::new(TokenKind::GtEq, slice, position),
            Ok(Raw::AndAnd) => Token::new(TokenKind::AndAnd, slice, position),
            Ok(Raw::OrOr) => Token::new(TokenKind::OrOr, slice, position),
            Ok(Raw::Plus) => Token::new(TokenKind::Plus, slice, position),
            Ok(Raw::Minus) => Token::new(TokenKind::Minus, slice, position),
            Ok(Raw::Star) => Token::new(TokenKind::Star, slice, position),
            Ok(Raw::Slash) => Token::new(TokenKind::Slash, slice, position),
            Ok(Raw::Percent) => Token::new(TokenKind::Percent, slice, position),
            Ok(Raw::Lt) => Token::new(TokenKind::Lt, slice, position),
            Ok(Raw::Gt) => Token::new(TokenKind::Gt, slice, position),
            Ok(Raw::Eq) => Token::new(TokenKind::Eq, slice, position),
            Ok(Raw::Bang) => Token::new(TokenKind::Bang, slice, position),
            Ok(Raw::LParen) => Token::new(TokenKind::LParen, slice, position),
            Ok(Raw::RParen) => Token::new(TokenKind::RParen, slice, position),
            Ok(Raw::LBrace) => Token::new(TokenKind::LBrace, slice, position),
            Ok(Raw::RBrace) => Token::new(TokenKind::RBrace, slice, position),
            Ok(Raw::LBracket) => Token::new(TokenKind::LBracket, slice, position),
            Ok(Raw::RBracket) => Token::new(TokenKind::RBracket, slice, position),
            Ok(Raw::Semi) => Token::new(TokenKind::Semi, slice, position),
            Ok(Raw::Comma) => Token::new(TokenKind::Comma, slice, position),
            Ok(Raw::Dot) => Token::new(TokenKind::Dot, slice, position),
            Err(()) => Token::new(TokenKind::Unknown, slice, position),
        };
        tokens.push(token);
    }

    let trailing = &source[line_start..];
    line += trailing.matches('\n').count();
    if let Some(last_nl) = trailing.rfind('\n') {
        line_start += last_nl + 1;
    }
    let eof_position = Position {
        line,
        column: source.len() - line_start + 1,
    };
    tokens.push(Token::new(TokenKind::Eof, "", eof_position));
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_hello_world() {
        let tokens = tokenize(r#"SEQ { print("Hello, World!\n"); }"#);
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Seq,
                TokenKind::LBrace,
                TokenKind::Print,
                TokenKind::LParen,
                TokenKind::Text,
                TokenKind::RParen,
                TokenKind::Semi,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comment_is_preserved_as_token() {
        let tokens = tokenize("# a comment\nint x;");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[1].kind, TokenKind::Int);
        assert_eq!(tokens[1].position.line, 2);
    }

    #[test]
    fn double_slash_is_rejected() {
        let tokens = tokenize("// nope");
        assert_eq!(tokens[0].kind, TokenKind::Error);
    }

    #[test]
    fn unterminated_string_is_unknown() {
        let tokens = tokenize("\"unterminated");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
    }

    #[test]
    fn always_ends_with_eof() {
        for source in ["", "   ", "int x;", "@@@"] {
            let tokens = tokenize(source);
            assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        }
    }

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        let tokens = tokenize("SEQ seq SeQ");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Seq));
    }

    #[test]
    fn token_stream_snapshot_for_a_small_program() {
        let tokens = tokenize("SEQ { print(1); }");
        let rendered = tokens
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        insta::assert_snapshot!(rendered, @r#"
        Seq("SEQ")
        LBrace("{")
        Print("print")
        LParen("(")
        Number("1")
        RParen(")")
        Semi(";")
        RBrace("}")
        Eof("")
        "#);
    }
}
