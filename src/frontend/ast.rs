//! Abstract syntax tree produced by the parser.
//!
//! The shapes here mirror spec §3's node variants directly; lvalues
//! (assignment/array-element/attribute targets, which the source spec lists
//! as several separate node kinds) are unified into one [`LValue`] path so
//! the evaluator has a single place to walk "base, then a chain of index/
//! attribute accessors" instead of duplicating that walk per node kind.

/// A declared type name: a primitive, `void`, `c_channel`, or a user class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    /// `int`
    Int,
    /// `float`
    Float,
    /// `string`
    String,
    /// `bool`
    Bool,
    /// `void`, only legal as a function/method return type.
    Void,
    /// `c_channel`
    CChannel,
    /// A user-defined class name.
    Class(String),
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::Int => write!(f, "int"),
            TypeName::Float => write!(f, "float"),
            TypeName::String => write!(f, "string"),
            TypeName::Bool => write!(f, "bool"),
            TypeName::Void => write!(f, "void"),
            TypeName::CChannel => write!(f, "c_channel"),
            TypeName::Class(name) => write!(f, "{name}"),
        }
    }
}

/// A `(type, name)` parameter in a function or method signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Declared parameter type.
    pub ty: TypeName,
    /// Parameter name.
    pub name: String,
}

/// A class attribute declaration. `shape` is empty for a scalar attribute,
/// one size expression for a 1D array, two for a 2D array.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Declared element type.
    pub ty: TypeName,
    /// Attribute name.
    pub name: String,
    /// Array dimensions, if any. Empty means scalar.
    pub shape: Vec<Expr>,
}

/// A method (or, at top level, a free function) declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Declared return type.
    pub return_type: TypeName,
    /// Function or method name.
    pub name: String,
    /// Formal parameters, in declaration order.
    pub params: Vec<Param>,
    /// Body executed on call.
    pub body: Block,
}

/// A class declaration: optional parent, ordered attributes, ordered
/// methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Class name.
    pub name: String,
    /// Name of the immediate parent class, if `extends` was used.
    pub parent: Option<String>,
    /// Attribute declarations in source order.
    pub attributes: Vec<Attribute>,
    /// Method declarations in source order.
    pub methods: Vec<FunctionDecl>,
}

/// A top-level variable (or channel) declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Declared element type.
    pub ty: TypeName,
    /// Variable name.
    pub name: String,
    /// Array dimensions, if any. Empty means scalar.
    pub shape: Vec<Expr>,
    /// Initializer expression, if given inline.
    pub init: Option<Expr>,
    /// For `c_channel` declarations written as `c_channel name [id1 id2]`,
    /// the two endpoint identifiers used to resolve network configuration.
    pub channel_ids: Option<(String, String)>,
}

/// Whether a compound statement's children run on the current task in
/// order (`seq`) or fan out onto fresh tasks (`par`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Statements execute in source order on the current task.
    Seq,
    /// Each statement is scheduled as its own task; the block joins all of
    /// them before continuing.
    Par,
}

/// A `seq { ... }` or `par { ... }` compound statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Sequential or parallel.
    pub kind: BlockKind,
    /// Child statements in source order.
    pub statements: Vec<Stmt>,
}

/// The base of an assignment/access chain: a plain identifier or `this`.
#[derive(Debug, Clone, PartialEq)]
pub enum LValueBase {
    /// A named variable, parameter, attribute-via-implicit-this, or global.
    Ident(String),
    /// The implicit receiver inside a method body.
    This,
}

/// One step in an lvalue or access chain after the base.
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    /// `.name`
    Attribute(String),
    /// `[i]` or `[i][j]`, one or two index expressions.
    Index(Vec<Expr>),
}

/// An assignment target: a base plus a chain of attribute/index accessors,
/// e.g. `this.grid[i][j]` or plain `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct LValue {
    /// The root of the chain.
    pub base: LValueBase,
    /// Accessors applied left to right after the base.
    pub path: Vec<Accessor>,
}

impl LValue {
    /// An lvalue that is just a bare identifier, no chain.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            base: LValueBase::Ident(name.into()),
            path: Vec::new(),
        }
    }
}

/// The right-hand side of an assignment: either a normal expression, or the
/// special `input(prompt?)` form, which the evaluator must thread through
/// the configured input provider rather than evaluate as a pure expression.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignSource {
    /// A normal expression.
    Expr(Expr),
    /// `input(prompt?)` on the right-hand side of an assignment.
    Input(Option<Expr>),
}

/// A single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A local variable (or channel) declaration.
    Declaration(Declaration),
    /// `target = value`, covering scalar, array-element, and attribute
    /// assignment uniformly via [`LValue`].
    Assign {
        /// Assignment target.
        target: LValue,
        /// Assignment source.
        value: AssignSource,
    },
    /// `if cond then [else ...]`
    If {
        /// Branch condition.
        cond: Expr,
        /// Executed when `cond` is true.
        then_branch: Block,
        /// Executed when `cond` is false, if present.
        else_branch: Option<Block>,
    },
    /// `while cond do body`
    While {
        /// Loop condition, re-checked before each iteration.
        cond: Expr,
        /// Loop body.
        body: Block,
    },
    /// `for var = init; cond; step do body`. No new scope is introduced for
    /// `var`; it must already be declared.
    For {
        /// The loop control variable's name.
        var: String,
        /// Initializer expression assigned to `var` before the first check.
        init: Expr,
        /// Condition checked before each iteration.
        cond: Expr,
        /// Expression assigned to `var` after each iteration.
        step: Expr,
        /// Loop body.
        body: Block,
    },
    /// `print(expr)`
    Print(Expr),
    /// `return [expr]`
    Return(Option<Expr>),
    /// `channel.send(args...)`
    Send {
        /// Expression naming the channel (usually a bare identifier).
        channel: Expr,
        /// Values to enqueue, in order.
        args: Vec<Expr>,
    },
    /// `channel.receive(x1, x2, ...)`
    Receive {
        /// Expression naming the channel.
        channel: Expr,
        /// Target variable names bound to the dequeued tuple, in order.
        targets: Vec<String>,
    },
    /// A bare call expression used as a statement (function call, method
    /// call, or array-element method call).
    Expr(Expr),
    /// A nested `seq`/`par` block used directly as a statement.
    Nested(Block),
}

/// A binary operator, spanning arithmetic, relational, and logical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
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
    And,
    /// `||`
    Or,
}

/// A unary prefix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Arithmetic negation.
    Neg,
    /// Logical negation.
    Not,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal, lexeme preserved verbatim; int-vs-float is decided
    /// by whether it contains a `.`.
    Number(String),
    /// A string literal, quotes stripped.
    Str(String),
    /// A bare identifier reference.
    Ident(String),
    /// The implicit method receiver.
    This,
    /// A binary operator application.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// A unary operator application.
    Unary(UnOp, Box<Expr>),
    /// `base[i]` or `base[i][j]`.
    Index(Box<Expr>, Vec<Expr>),
    /// `base.name`, chainable.
    Attribute(Box<Expr>, String),
    /// A free function call by name.
    Call(String, Vec<Expr>),
    /// `receiver.method(args)`, where `receiver` may itself be a chain.
    MethodCall(Box<Expr>, String, Vec<Expr>),
    /// `new ClassName()`
    New(String),
    /// `[e1, e2, ...]` array literal.
    ArrayInit(Vec<Expr>),
    /// `{e1, e2, ...}` brace literal (array or object field list, per use
    /// site).
    BraceInit(Vec<Expr>),
}

/// The root AST node: an ordered sequence of top-level items, preserving
/// source order so the preamble pass can run initializers top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level items in source order.
    pub items: Vec<TopLevel>,
}

/// One top-level item.
#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    /// A class declaration.
    Class(ClassDecl),
    /// A free function declaration.
    Function(FunctionDecl),
    /// A top-level variable or channel declaration.
    Global(Declaration),
    /// A top-level `seq`/`par` block.
    Block(Block),
    /// A statement parsed at top level outside any block or function body.
    /// Syntactically accepted (the grammar is permissive here); the semantic
    /// analyzer flags these as a structural error, since only declarations
    /// and blocks are allowed to appear loose at the top level.
    Stmt(Stmt),
}
