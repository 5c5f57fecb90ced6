//! Token kinds and the positioned [`Token`] the lexer hands to the parser.

use crate::error::Position;
use std::fmt;

/// The category a scanned lexeme belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Type keywords
    /// `int`
    Int,
    /// `float`
    Float,
    /// `string`
    StringType,
    /// `bool`
    Bool,
    /// `void`
    Void,
    /// `c_channel`
    CChannel,
    // Control keywords
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `seq`
    Seq,
    /// `par`
    Par,
    /// `class`
    Class,
    /// `extends`
    Extends,
    /// `new`
    New,
    /// `print`
    Print,
    /// `input`
    Input,
    /// `send`
    Send,
    /// `receive`
    Receive,
    /// `return`
    Return,
    /// `this`
    This,
    // Operators and delimiters
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `=`
    Eq,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `;`
    Semi,
    /// `,`
    Comma,
    /// `.`
    Dot,
    // Literals and names
    /// A numeric literal lexeme, integer or decimal (disambiguated later by
    /// whether it contains a `.`).
    Number,
    /// A double-quoted string literal, quotes included in the lexeme.
    Text,
    /// An identifier that didn't match any keyword.
    Ident,
    /// A `#`-to-end-of-line comment. The parser discards these.
    Comment,
    /// A disallowed `//` sequence; lexeme carries a human-readable diagnostic.
    Error,
    /// An unterminated string literal, or a single character that matched no
    /// lexical rule.
    Unknown,
    /// Synthetic end-of-input marker, always the last token produced.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single scanned token: its kind, the exact source text it covers, and
/// its 1-indexed line/column.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// The exact source slice this token covers.
    pub lexeme: String,
    /// Where the token starts in the source.
    pub position: Position,
}

impl Token {
    /// Construct a token at the given position.
    #[must_use]
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.lexeme)
    }
}

/// Maps a lowercased identifier lexeme to its keyword `TokenKind`, or `None`
/// if it's an ordinary identifier. Keyword recognition is case-insensitive
/// (spec: `SEQ`, `Seq`, and `seq` are the same token).
#[must_use]
pub fn lookup_keyword(lowercased: &str) -> Option<TokenKind> {
    Some(match lowercased {
        "int" => TokenKind::Int,
        "float" => TokenKind::Float,
        "string" => TokenKind::StringType,
        "bool" => TokenKind::Bool,
        "void" => TokenKind::Void,
        "c_channel" => TokenKind::CChannel,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "seq" => TokenKind::Seq,
        "par" => TokenKind::Par,
        "class" => TokenKind::Class,
        "extends" => TokenKind::Extends,
        "new" => TokenKind::New,
        "print" => TokenKind::Print,
        "input" => TokenKind::Input,
        "send" => TokenKind::Send,
        "receive" => TokenKind::Receive,
        "return" => TokenKind::Return,
        "this" => TokenKind::This,
        _ => return None,
    })
}
