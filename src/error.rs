//! Error types shared across the pipeline stages.
//!
//! Each stage gets its own error enum (`thiserror`-derived) rather than one
//! monolithic error type, mirroring the separate diagnostic channels the
//! pipeline exposes (lexical tokens carry their own errors; the parser fails
//! fast; the analyzer accumulates; the evaluator raises at the point of
//! failure).

use thiserror::Error;

/// A `(line, column)` source position, 1-indexed as produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// 1-indexed source line.
    pub line: usize,
    /// 1-indexed source column.
    pub column: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Fatal parse error. The parser stops at the first one (spec: fail-fast, no
/// recovery).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Current token didn't match what the grammar required at this point.
    #[error("expected {expected}, got {found} at {at}")]
    UnexpectedToken {
        /// Human-readable description of what was expected.
        expected: String,
        /// Human-readable description of what was actually found.
        found: String,
        /// Position of the offending token.
        at: Position,
    },
    /// Ran out of tokens before the construct was closed.
    #[error("unexpected end of input while parsing {context} at {at}")]
    UnexpectedEof {
        /// What the parser was in the middle of parsing.
        context: String,
        /// Position of the EOF token.
        at: Position,
    },
    /// A dotted-member chain inside a statement wasn't a method or
    /// attribute reference at all.
    #[error("expected method or attribute name after '.' at {at}")]
    ExpectedMemberName {
        /// Position of the dot.
        at: Position,
    },
}

/// A single semantic diagnostic, tagged error or warning per spec §4.3/§7.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticDiagnostic {
    /// Human-readable message.
    pub message: String,
    /// Best-effort source position (identifiers/expressions don't all carry
    /// spans in this AST, so this is `None` for most diagnostics).
    pub at: Option<Position>,
}

impl SemanticDiagnostic {
    /// Construct a diagnostic with no position information.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: None,
        }
    }
}

impl std::fmt::Display for SemanticDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.at {
            Some(pos) => write!(f, "{} ({pos})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// An error raised while evaluating a well-formed AST.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// Division by a non-literal zero.
    #[error("division by zero")]
    DivisionByZero,
    /// `input()` result couldn't be coerced to the target variable's type.
    #[error("cannot coerce input {value:?} to type {target_type}")]
    InputCoercion {
        /// The raw string the input provider returned.
        value: String,
        /// The declared type of the variable being assigned.
        target_type: String,
    },
    /// Array index was out of bounds at runtime (variable index; constant
    /// indices are caught earlier by the analyzer).
    #[error("array index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// The index that was attempted.
        index: i64,
        /// The array's length.
        len: usize,
    },
    /// Reference to a class that was never declared.
    #[error("unknown class '{0}'")]
    UnknownClass(String),
    /// A `par` sibling task panicked or raised; captured and surfaced at
    /// join.
    #[error("task failed: {0}")]
    TaskFailed(String),
    /// Top-level return, or some other control-flow signal escaped where it
    /// shouldn't have.
    #[error("return outside of a function or method body")]
    ReturnOutsideFunction,
    /// The interactive input provider reported an error (e.g. the run was
    /// retired before it could be resumed).
    #[error("input provider error: {0}")]
    InputProvider(String),
    /// The network channel's peer connection failed unrecoverably.
    #[error("network channel error: {0}")]
    Network(String),
    /// Catch-all for runtime operations that are well-typed syntactically
    /// but invalid against the live value encountered (e.g. an attribute
    /// access on a non-object, a method on an unknown channel operation).
    /// The semantic analyzer rejects most of these ahead of time; this
    /// variant covers what only the evaluator can discover.
    #[error("{0}")]
    InvalidOperation(String),
    /// Reference to a name that resolves to nothing, at runtime.
    #[error("undeclared identifier '{0}'")]
    UndeclaredIdentifier(String),
}
