//! Hand-written recursive-descent parser.
//!
//! One-to-two token lookahead, fail-fast (first syntax error aborts parsing
//! with a positioned diagnostic — no error recovery, per spec). Built
//! directly over a token slice cursor rather than a parser-generator crate.

use crate::error::{ParseError, Position};
use crate::frontend::ast::{
    Accessor, AssignSource, Attribute, BinOp, Block, BlockKind, ClassDecl, Declaration, Expr,
    FunctionDecl, LValue, LValueBase, Param, Program, Stmt, TopLevel, TypeName, UnOp,
};
use crate::frontend::token::{Token, TokenKind};

/// Parses a full token stream (as produced by [`crate::frontend::lexer::tokenize`])
/// into a [`Program`].
pub fn parse(tokens: &[Token]) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    tmp_counter: usize,
}

enum ChainBase {
    Ident(String),
    This,
}

enum ChainStep {
    Attr(String),
    Index(Vec<Expr>),
    Call(String, Vec<Expr>),
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        // Comments carry no grammatical meaning; peek/advance skip over
        // them transparently rather than requiring a pre-filtered copy.
        Self {
            tokens,
            pos: 0,
            tmp_counter: 0,
        }
    }

    fn peek(&self) -> &'t Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &'t Token {
        let mut idx = self.pos;
        let mut remaining = offset;
        loop {
            while matches!(self.tokens.get(idx), Some(t) if t.kind == TokenKind::Comment) {
                idx += 1;
            }
            if remaining == 0 {
                return self
                    .tokens
                    .get(idx)
                    .unwrap_or_else(|| self.tokens.last().expect("token stream has EOF"));
            }
            remaining -= 1;
            idx += 1;
        }
    }

    fn advance(&mut self) -> Token {
        while matches!(self.tokens.get(self.pos), Some(t) if t.kind == TokenKind::Comment) {
            self.pos += 1;
        }
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or_else(|| self.tokens.last().expect("token stream has EOF").clone());
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn at_eof(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            if found.kind == TokenKind::Eof {
                Err(ParseError::UnexpectedEof {
                    context: context.to_string(),
                    at: found.position,
                })
            } else {
                Err(ParseError::UnexpectedToken {
                    expected: format!("{kind} ({context})"),
                    found: format!("{:?} {:?}", found.kind, found.lexeme),
                    at: found.position,
                })
            }
        }
    }

    fn unexpected(&self, context: &str) -> ParseError {
        let found = self.peek().clone();
        if found.kind == TokenKind::Eof {
            ParseError::UnexpectedEof {
                context: context.to_string(),
                at: found.position,
            }
        } else {
            ParseError::UnexpectedToken {
                expected: context.to_string(),
                found: format!("{:?} {:?}", found.kind, found.lexeme),
                at: found.position,
            }
        }
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("__input_tmp{}", self.tmp_counter);
        self.tmp_counter += 1;
        name
    }

    // ----- program / top level -----------------------------------------

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while !self.at_eof() {
            items.push(self.parse_top_level_item()?);
        }
        Ok(Program { items })
    }

    fn parse_top_level_item(&mut self) -> Result<TopLevel, ParseError> {
        match self.peek().kind {
            TokenKind::Class => Ok(TopLevel::Class(self.parse_class()?)),
            TokenKind::Seq | TokenKind::Par => Ok(TopLevel::Block(self.parse_block()?)),
            TokenKind::CChannel => Ok(TopLevel::Global(self.parse_channel_declaration()?)),
            _ if self.looks_like_declaration() => self.parse_typed_top_level(),
            _ => Ok(TopLevel::Stmt(self.parse_statement()?)),
        }
    }

    /// True when the current position begins `TYPE IDENT`, i.e. a
    /// declaration or function signature rather than a bare statement.
    fn looks_like_declaration(&self) -> bool {
        let starts_primitive = matches!(
            self.peek().kind,
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::StringType
                | TokenKind::Bool
                | TokenKind::Void
                | TokenKind::CChannel
        );
        if starts_primitive {
            return self.peek_at(1).kind == TokenKind::Ident;
        }
        self.peek().kind == TokenKind::Ident && self.peek_at(1).kind == TokenKind::Ident
    }

    fn parse_typed_top_level(&mut self) -> Result<TopLevel, ParseError> {
        let ty = self.parse_type()?;
        let name = self.expect(TokenKind::Ident, "declared name")?.lexeme;
        if self.check(TokenKind::LParen) {
            Ok(TopLevel::Function(self.parse_function_tail(ty, name)?))
        } else {
            Ok(TopLevel::Global(self.parse_declaration_tail(ty, name)?))
        }
    }

    fn parse_type(&mut self) -> Result<TypeName, ParseError> {
        let tok = self.advance();
        Ok(match tok.kind {
            TokenKind::Int => TypeName::Int,
            TokenKind::Float => TypeName::Float,
            TokenKind::StringType => TypeName::String,
            TokenKind::Bool => TypeName::Bool,
            TokenKind::Void => TypeName::Void,
            TokenKind::CChannel => TypeName::CChannel,
            TokenKind::Ident => TypeName::Class(tok.lexeme),
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a type name".to_string(),
                    found: format!("{:?} {:?}", tok.kind, tok.lexeme),
                    at: tok.position,
                })
            }
        })
    }

    fn parse_channel_declaration(&mut self) -> Result<Declaration, ParseError> {
        self.expect(TokenKind::CChannel, "channel declaration")?;
        let name = self.expect(TokenKind::Ident, "channel name")?.lexeme;
        let channel_ids = if self.check(TokenKind::LBracket) {
            self.advance();
            let id1 = self.expect(TokenKind::Ident, "first endpoint id")?.lexeme;
            let id2 = self.expect(TokenKind::Ident, "second endpoint id")?.lexeme;
            self.expect(TokenKind::RBracket, "closing ']' of channel ids")?;
            Some((id1, id2))
        } else {
            None
        };
        self.expect(TokenKind::Semi, "end of channel declaration")?;
        Ok(Declaration {
            ty: TypeName::CChannel,
            name,
            shape: Vec::new(),
            init: None,
            channel_ids,
        })
    }

    /// Parses the tail of a declaration after `TYPE name` has been consumed:
    /// optional array shape, optional initializer, terminating `;`.
    fn parse_declaration_tail(
        &mut self,
        ty: TypeName,
        name: String,
    ) -> Result<Declaration, ParseError> {
        let shape = self.parse_optional_shape()?;
        let init = if self.check(TokenKind::Eq) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi, "end of declaration")?;
        Ok(Declaration {
            ty,
            name,
            shape,
            init,
            channel_ids: None,
        })
    }

    fn parse_optional_shape(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut shape = Vec::new();
        while self.check(TokenKind::LBracket) && shape.len() < 2 {
            self.advance();
            shape.push(self.parse_expr()?);
            self.expect(TokenKind::RBracket, "closing ']' of array shape")?;
        }
        Ok(shape)
    }

    fn parse_function_tail(
        &mut self,
        return_type: TypeName,
        name: String,
    ) -> Result<FunctionDecl, ParseError> {
        self.expect(TokenKind::LParen, "parameter list")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let ty = self.parse_type()?;
                let pname = self.expect(TokenKind::Ident, "parameter name")?.lexeme;
                params.push(Param { ty, name: pname });
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "closing ')' of parameter list")?;
        let body = self.parse_brace_body()?;
        Ok(FunctionDecl {
            return_type,
            name,
            params,
            body,
        })
    }

    fn parse_class(&mut self) -> Result<ClassDecl, ParseError> {
        self.expect(TokenKind::Class, "class declaration")?;
        let name = self.expect(TokenKind::Ident, "class name")?.lexeme;
        let parent = if self.check(TokenKind::Extends) {
            self.advance();
            Some(self.expect(TokenKind::Ident, "parent class name")?.lexeme)
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "class body")?;
        let mut attributes = Vec::new();
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let ty = self.parse_type()?;
            let name = self.expect(TokenKind::Ident, "member name")?.lexeme;
            if self.check(TokenKind::LParen) {
                methods.push(self.parse_function_tail(ty, name)?);
            } else {
                let shape = self.parse_optional_shape()?;
                self.expect(TokenKind::Semi, "end of attribute declaration")?;
                attributes.push(Attribute { ty, name, shape });
            }
        }
        self.expect(TokenKind::RBrace, "closing '}' of class body")?;
        Ok(ClassDecl {
            name,
            parent,
            attributes,
            methods,
        })
    }

    // ----- blocks and statements -----------------------------------------

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let kind = match self.advance().kind {
            TokenKind::Seq => BlockKind::Seq,
            TokenKind::Par => BlockKind::Par,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "'seq' or 'par'".to_string(),
                    found: format!("{other:?}"),
                    at: self.peek().position,
                })
            }
        };
        let statements = self.parse_brace_statements()?;
        Ok(Block { kind, statements })
    }

    /// Parses a plain `{ stmt* }` body (function/method bodies are not
    /// tagged `seq`/`par` in source; they execute sequentially).
    fn parse_brace_body(&mut self) -> Result<Block, ParseError> {
        let statements = self.parse_brace_statements()?;
        Ok(Block {
            kind: BlockKind::Seq,
            statements,
        })
    }

    fn parse_brace_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace, "opening '{'")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "closing '}'")?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::Seq | TokenKind::Par => Ok(Stmt::Nested(self.parse_block()?)),
            TokenKind::CChannel => Ok(Stmt::Declaration(self.parse_channel_declaration()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Print => self.parse_print(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Ident | TokenKind::This if self.looks_like_declaration() => {
                let ty = self.parse_type()?;
                let name = self.expect(TokenKind::Ident, "declared name")?.lexeme;
                Ok(Stmt::Declaration(self.parse_declaration_tail(ty, name)?))
            }
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::StringType
            | TokenKind::Bool
            | TokenKind::Void => {
                let ty = self.parse_type()?;
                let name = self.expect(TokenKind::Ident, "declared name")?.lexeme;
                Ok(Stmt::Declaration(self.parse_declaration_tail(ty, name)?))
            }
            TokenKind::Ident | TokenKind::This => self.parse_ident_led_statement(),
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::If, "if statement")?;
        let cond = self.parse_expr()?;
        let then_branch = self.parse_brace_body()?;
        let else_branch = if self.check(TokenKind::Else) {
            self.advance();
            if self.check(TokenKind::If) {
                let nested = self.parse_if()?;
                Some(Block {
                    kind: BlockKind::Seq,
                    statements: vec![nested],
                })
            } else {
                Some(self.parse_brace_body()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::While, "while statement")?;
        let cond = self.parse_expr()?;
        let body = self.parse_brace_body()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::For, "for statement")?;
        let var = self.expect(TokenKind::Ident, "loop variable")?.lexeme;
        self.expect(TokenKind::Eq, "'=' in for-init")?;
        let init = self.parse_expr()?;
        self.expect(TokenKind::Semi, "';' after for-init")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Semi, "';' after for-condition")?;
        self.expect(TokenKind::Ident, "loop variable in for-step")?;
        self.expect(TokenKind::Eq, "'=' in for-step")?;
        let step = self.parse_expr()?;
        let body = self.parse_brace_body()?;
        Ok(Stmt::For {
            var,
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_print(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Print, "print statement")?;
        self.expect(TokenKind::LParen, "'(' after print")?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after print argument")?;
        self.expect(TokenKind::Semi, "';' after print")?;
        Ok(Stmt::Print(expr))
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Return, "return statement")?;
        let expr = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semi, "';' after return")?;
        Ok(Stmt::Return(expr))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen, "'(' of argument list")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "closing ')' of argument list")?;
        Ok(args)
    }

    /// Parses one `[expr]`, or `[expr][expr]` for a 2D access, into a single
    /// index accessor.
    fn parse_index_group(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LBracket, "'['")?;
        let first = self.parse_expr()?;
        self.expect(TokenKind::RBracket, "']'")?;
        let mut indices = vec![first];
        if self.check(TokenKind::LBracket) {
            self.advance();
            let second = self.parse_expr()?;
            self.expect(TokenKind::RBracket, "']'")?;
            indices.push(second);
        }
        Ok(indices)
    }

    /// Parses an identifier- or `this`-led statement: declaration already
    /// ruled out by the caller, so this is assignment, array/attribute
    /// assignment, a bare call, a method call, or a channel send/receive.
    fn parse_ident_led_statement(&mut self) -> Result<Stmt, ParseError> {
        let base_tok = self.advance();
        let base = match base_tok.kind {
            TokenKind::This => ChainBase::This,
            TokenKind::Ident => ChainBase::Ident(base_tok.lexeme.clone()),
            _ => unreachable!("caller only dispatches Ident/This here"),
        };

        if let ChainBase::Ident(name) = &base {
            if self.check(TokenKind::LParen) {
                let args = self.parse_call_args()?;
                self.expect(TokenKind::Semi, "';' after call")?;
                return Ok(Stmt::Expr(Expr::Call(name.clone(), args)));
            }
        }

        let mut steps = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let member = self.expect(TokenKind::Ident, "member name")?.lexeme;
                    if self.check(TokenKind::LParen) {
                        let args = self.parse_call_args()?;
                        steps.push(ChainStep::Call(member, args));
                    } else {
                        steps.push(ChainStep::Attr(member));
                    }
                }
                TokenKind::LBracket => {
                    let indices = self.parse_index_group()?;
                    steps.push(ChainStep::Index(indices));
                }
                _ => break,
            }
        }

        if self.check(TokenKind::Eq) {
            self.advance();
            let target = Self::chain_to_lvalue(base, steps, base_tok.position)?;
            return self.finish_assignment(target);
        }

        // No '='; the chain must terminate in a call to mean anything.
        self.expect(TokenKind::Semi, "';' after statement")?;
        match steps.last() {
            Some(ChainStep::Call(name, _)) if name == "send" => {
                let call_args = match steps.pop() {
                    Some(ChainStep::Call(_, args)) => args,
                    _ => unreachable!(),
                };
                let channel = Self::chain_to_expr(base, steps);
                Ok(Stmt::Send {
                    channel,
                    args: call_args,
                })
            }
            Some(ChainStep::Call(name, _)) if name == "receive" => {
                let call_args = match steps.pop() {
                    Some(ChainStep::Call(_, args)) => args,
                    _ => unreachable!(),
                };
                let mut targets = Vec::new();
                for arg in call_args {
                    match arg {
                        Expr::Ident(n) => targets.push(n),
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "a plain identifier as a receive target".to_string(),
                                found: format!("{arg:?}"),
                                at: base_tok.position,
                            })
                        }
                    }
                }
                let channel = Self::chain_to_expr(base, steps);
                Ok(Stmt::Receive { channel, targets })
            }
            Some(ChainStep::Call(..)) => Ok(Stmt::Expr(Self::chain_to_expr(base, steps))),
            _ => Err(ParseError::ExpectedMemberName {
                at: base_tok.position,
            }),
        }
    }

    fn finish_assignment(&mut self, target: LValue) -> Result<Stmt, ParseError> {
        let is_array_target = matches!(target.path.last(), Some(Accessor::Index(_)));
        if self.check(TokenKind::Input) {
            let prompt = self.parse_input_call()?;
            self.expect(TokenKind::Semi, "';' after assignment")?;
            if is_array_target {
                // Desugar `arr[i] = input(prompt)` into a synthetic
                // two-statement seq block per the array-element/input rule.
                let tmp = self.fresh_temp();
                let bind_tmp = Stmt::Assign {
                    target: LValue::name(tmp.clone()),
                    value: AssignSource::Input(prompt),
                };
                let store = Stmt::Assign {
                    target,
                    value: AssignSource::Expr(Expr::Ident(tmp)),
                };
                return Ok(Stmt::Nested(Block {
                    kind: BlockKind::Seq,
                    statements: vec![bind_tmp, store],
                }));
            }
            return Ok(Stmt::Assign {
                target,
                value: AssignSource::Input(prompt),
            });
        }
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semi, "';' after assignment")?;
        Ok(Stmt::Assign {
            target,
            value: AssignSource::Expr(expr),
        })
    }

    /// Parses `input` `(` expr? `)`, returning the optional prompt.
    fn parse_input_call(&mut self) -> Result<Option<Expr>, ParseError> {
        self.expect(TokenKind::Input, "input()")?;
        self.expect(TokenKind::LParen, "'(' after input")?;
        let prompt = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::RParen, "closing ')' of input()")?;
        Ok(prompt)
    }

    fn chain_to_lvalue(
        base: ChainBase,
        steps: Vec<ChainStep>,
        at: Position,
    ) -> Result<LValue, ParseError> {
        let base = match base {
            ChainBase::Ident(name) => LValueBase::Ident(name),
            ChainBase::This => LValueBase::This,
        };
        let mut path = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                ChainStep::Attr(name) => path.push(Accessor::Attribute(name)),
                ChainStep::Index(idx) => path.push(Accessor::Index(idx)),
                ChainStep::Call(name, _) => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "an assignable target".to_string(),
                        found: format!("method call '{name}'"),
                        at,
                    })
                }
            }
        }
        Ok(LValue { base, path })
    }

    fn chain_to_expr(base: ChainBase, steps: Vec<ChainStep>) -> Expr {
        let mut expr = match base {
            ChainBase::Ident(name) => Expr::Ident(name),
            ChainBase::This => Expr::This,
        };
        for step in steps {
            expr = match step {
                ChainStep::Attr(name) => Expr::Attribute(Box::new(expr), name),
                ChainStep::Index(idx) => Expr::Index(Box::new(expr), idx),
                ChainStep::Call(name, args) => Expr::MethodCall(Box::new(expr), name, args),
            };
        }
        expr
    }

    // ----- expressions, low to high precedence ---------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.check(TokenKind::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        while self.check(TokenKind::AndAnd) {
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::GtEq => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            TokenKind::Bang => {
                self.advance();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let member = self.expect(TokenKind::Ident, "member name")?.lexeme;
                    if self.check(TokenKind::LParen) {
                        let args = self.parse_call_args()?;
                        expr = Expr::MethodCall(Box::new(expr), member, args);
                    } else {
                        expr = Expr::Attribute(Box::new(expr), member);
                    }
                }
                TokenKind::LBracket => {
                    let indices = self.parse_index_group()?;
                    expr = Expr::Index(Box::new(expr), indices);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Expr::Number(tok.lexeme))
            }
            TokenKind::Text => {
                self.advance();
                let inner = tok.lexeme.trim_matches('"').to_string();
                Ok(Expr::Str(inner))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::This)
            }
            TokenKind::New => {
                self.advance();
                let class_name = self.expect(TokenKind::Ident, "class name after 'new'")?.lexeme;
                self.expect(TokenKind::LParen, "'(' after class name")?;
                self.expect(TokenKind::RParen, "')' closing 'new' arguments")?;
                Ok(Expr::New(class_name))
            }
            TokenKind::Input => {
                // `input(...)` as a general expression operand (e.g. nested
                // inside another call) falls back to a plain call node; the
                // assignment-statement form is handled separately so it can
                // reach the input provider.
                self.advance();
                self.expect(TokenKind::LParen, "'(' after input")?;
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    args.push(self.parse_expr()?);
                }
                self.expect(TokenKind::RParen, "')' after input()")?;
                Ok(Expr::Call("input".to_string(), args))
            }
            TokenKind::Ident => {
                self.advance();
                if self.check(TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    Ok(Expr::Call(tok.lexeme, args))
                } else {
                    Ok(Expr::Ident(tok.lexeme))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "closing ')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_expr_list(TokenKind::RBracket)?;
                self.expect(TokenKind::RBracket, "closing ']' of array literal")?;
                Ok(Expr::ArrayInit(items))
            }
            TokenKind::LBrace => {
                self.advance();
                let items = self.parse_expr_list(TokenKind::RBrace)?;
                self.expect(TokenKind::RBrace, "closing '}' of brace literal")?;
                Ok(Expr::BraceInit(items))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_expr_list(&mut self, terminator: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if !self.check(terminator) {
            loop {
                items.push(self.parse_expr()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;

    fn parse_src(src: &str) -> Program {
        parse(&tokenize(src)).expect("parse should succeed")
    }

    #[test]
    fn parses_hello_world() {
        let program = parse_src(r#"SEQ { print("Hello, World!\n"); }"#);
        assert_eq!(program.items.len(), 1);
        match &program.items[0] {
            TopLevel::Block(b) => {
                assert_eq!(b.kind, BlockKind::Seq);
                assert_eq!(b.statements.len(), 1);
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn parses_for_loop_with_accumulator() {
        let program = parse_src(
            "SEQ { INT s; INT i; s=0;\n  for i=1; i<=5; i=i+1 { s=s+i; }\n  print(s);\n}",
        );
        let TopLevel::Block(block) = &program.items[0] else {
            panic!("expected block");
        };
        assert!(matches!(block.statements[3], Stmt::For { .. }));
    }

    #[test]
    fn parses_class_with_inheritance() {
        let program = parse_src(
            "class A { INT x; VOID setX(INT v) { this.x = v; } }\n\
             class B extends A { INT twice() { return this.x + this.x; } }",
        );
        assert_eq!(program.items.len(), 2);
        let TopLevel::Class(b) = &program.items[1] else {
            panic!("expected class");
        };
        assert_eq!(b.parent.as_deref(), Some("A"));
    }

    #[test]
    fn parses_channel_send_and_receive() {
        let program = parse_src(
            "c_channel ch;\n\
             VOID prod() { ch.send(7); ch.send(8); }\n\
             VOID cons() { INT x; INT y; ch.receive(x); ch.receive(y); print(x+y); }",
        );
        assert_eq!(program.items.len(), 3);
        let TopLevel::Function(prod) = &program.items[1] else {
            panic!("expected function");
        };
        assert!(matches!(prod.body.statements[0], Stmt::Send { .. }));
        let TopLevel::Function(cons) = &program.items[2] else {
            panic!("expected function");
        };
        assert!(matches!(cons.body.statements[2], Stmt::Receive { .. }));
    }

    #[test]
    fn desugars_array_element_input_assignment() {
        let program = parse_src("SEQ { INT arr[3]; arr[0] = input(\"v? \"); }");
        let TopLevel::Block(block) = &program.items[0] else {
            panic!("expected block");
        };
        assert!(matches!(block.statements[1], Stmt::Nested(_)));
    }

    #[test]
    fn loose_top_level_statement_is_still_parsed() {
        let program = parse_src("x = 5;");
        assert!(matches!(program.items[0], TopLevel::Stmt(_)));
    }

    #[test]
    fn unexpected_token_reports_position() {
        let err = parse(&tokenize("SEQ { print(; }")).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }
}
