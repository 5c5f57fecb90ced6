//! Three-address code: flat linear instructions plus a string pool.
//!
//! Grounded in `TACGenerator.py`'s `TACInstruction`/`TACGenerator` pair,
//! generalized to the `Opcode` sum type spec §4.4 calls for instead of the
//! source's bare opcode strings, and restructured as a `TacEmitter` that
//! walks the typed AST directly rather than dispatching on a node's runtime
//! class name.

use crate::frontend::ast::{
    Accessor, AssignSource, BinOp, Block, ClassDecl, Declaration, Expr, FunctionDecl, LValue,
    LValueBase, Program, Stmt, TopLevel, UnOp,
};
use std::fmt;

/// A TAC opcode, spanning every instruction kind spec §4.4 lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `result = arg1`
    Copy,
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
    /// `result = -arg1`
    Neg,
    /// `result = !arg1`
    Not,
    /// A jump target definition.
    Label,
    /// Unconditional jump.
    Goto,
    /// Jump if `arg1` is false.
    IfFalse,
    /// Jump if `arg1` is true.
    If,
    /// Push one call argument.
    Param,
    /// `result = call arg1, argc` (argc carried in `arg2`).
    Call,
    /// `return [arg1]`
    Return,
    /// `result = arg1[arg2]`
    ArrayLoad,
    /// `result[arg1] = arg2`
    ArrayStore,
    /// `result = new arg1()`
    New,
    /// `result = arg1.arg2`
    AttrLoad,
    /// `arg1.arg2 = result`
    AttrStore,
    /// `result = arg1.arg2(...)` (a prior run of `param` instructions
    /// supplies the call arguments; `argc` travels as a trailing comment).
    MethodCall,
    /// A no-op marker, used as a visual separator between declarations.
    Nop,
}

/// One three-address instruction: an opcode plus up to three operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The operation.
    pub op: Opcode,
    /// First operand, if any.
    pub arg1: Option<String>,
    /// Second operand, if any.
    pub arg2: Option<String>,
    /// Destination / jump target / label name, if any.
    pub result: Option<String>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a1 = self.arg1.as_deref().unwrap_or("");
        let a2 = self.arg2.as_deref().unwrap_or("");
        let res = self.result.as_deref().unwrap_or("");
        match self.op {
            Opcode::Label => write!(f, "{res}:"),
            Opcode::Goto => write!(f, "    goto {res}"),
            Opcode::IfFalse => write!(f, "    ifFalse {a1} goto {res}"),
            Opcode::If => write!(f, "    if {a1} goto {res}"),
            Opcode::Param => write!(f, "    param {a1}"),
            Opcode::Call => match &self.result {
                Some(r) => write!(f, "    {r} = call {a1}, {a2}"),
                None => write!(f, "    call {a1}, {a2}"),
            },
            Opcode::Return => match &self.arg1 {
                Some(v) => write!(f, "    return {v}"),
                None => write!(f, "    return"),
            },
            Opcode::Copy => write!(f, "    {res} = {a1}"),
            Opcode::ArrayLoad => write!(f, "    {res} = {a1}[{a2}]"),
            Opcode::ArrayStore => write!(f, "    {res}[{a1}] = {a2}"),
            Opcode::New => write!(f, "    {res} = new {a1}()"),
            Opcode::AttrLoad => write!(f, "    {res} = {a1}.{a2}"),
            Opcode::AttrStore => write!(f, "    {a1}.{a2} = {res}"),
            Opcode::MethodCall => match &self.result {
                Some(r) => write!(f, "    {r} = {a1}.{a2}"),
                None => write!(f, "    {a1}.{a2}"),
            },
            Opcode::Nop => write!(f, "    nop"),
            Opcode::Neg => write!(f, "    {res} = -{a1}"),
            Opcode::Not => write!(f, "    {res} = !{a1}"),
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Eq
            | Opcode::NotEq
            | Opcode::Lt
            | Opcode::Gt
            | Opcode::LtEq
            | Opcode::GtEq
            | Opcode::And
            | Opcode::Or => write!(f, "    {res} = {a1} {} {a2}", op_symbol(self.op)),
        }
    }
}

fn op_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Mod => "%",
        Opcode::Eq => "==",
        Opcode::NotEq => "!=",
        Opcode::Lt => "<",
        Opcode::Gt => ">",
        Opcode::LtEq => "<=",
        Opcode::GtEq => ">=",
        Opcode::And => "&&",
        Opcode::Or => "||",
        _ => "?",
    }
}

/// The full emitted program: instructions in emission order, plus the
/// interned string-literal pool keyed by `str_N` identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TacProgram {
    /// Instructions in emission order.
    pub instructions: Vec<Instruction>,
    /// String literal pool, in first-seen order: `(str_id, literal value)`.
    pub string_pool: Vec<(String, String)>,
}

impl fmt::Display for TacProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, value) in &self.string_pool {
            writeln!(f, "{id} = {value:?}")?;
        }
        for instr in &self.instructions {
            writeln!(f, "{instr}")?;
        }
        Ok(())
    }
}

/// Walks a [`Program`] and emits its diagnostic three-address form.
#[must_use]
pub fn emit(program: &Program) -> TacProgram {
    let mut emitter = TacEmitter::new();
    emitter.generate(program);
    emitter.finish()
}

/// Stateful TAC emitter: fresh temporaries/labels, an interned string pool,
/// and the growing instruction list.
pub struct TacEmitter {
    instructions: Vec<Instruction>,
    temp_count: u32,
    label_count: u32,
    string_literals: Vec<(String, String)>,
}

impl Default for TacEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl TacEmitter {
    /// Creates an emitter with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            temp_count: 0,
            label_count: 0,
            string_literals: Vec::new(),
        }
    }

    /// Consumes the emitter, returning the finished program.
    #[must_use]
    pub fn finish(self) -> TacProgram {
        TacProgram {
            instructions: self.instructions,
            string_pool: self.string_literals,
        }
    }

    fn new_temp(&mut self) -> String {
        let temp = format!("t{}", self.temp_count);
        self.temp_count += 1;
        temp
    }

    fn new_label(&mut self) -> String {
        let label = format!("L{}", self.label_count);
        self.label_count += 1;
        label
    }

    fn emit(&mut self, op: Opcode, arg1: Option<String>, arg2: Option<String>, result: Option<String>) {
        self.instructions.push(Instruction { op, arg1, arg2, result });
    }

    fn intern_string(&mut self, value: &str) -> String {
        if let Some((id, _)) = self.string_literals.iter().find(|(_, v)| v == value) {
            return id.clone();
        }
        let id = format!("str_{}", self.string_literals.len());
        self.string_literals.push((id.clone(), value.to_string()));
        id
    }

    /// Walks every top-level item in source order.
    pub fn generate(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                TopLevel::Class(class) => self.generate_class(class),
                TopLevel::Function(func) => self.generate_function(func),
                TopLevel::Global(decl) => self.generate_declaration(decl),
                TopLevel::Block(block) => self.generate_block(block),
                TopLevel::Stmt(stmt) => self.generate_stmt(stmt),
            }
        }
    }

    fn generate_class(&mut self, class: &ClassDecl) {
        self.emit(Opcode::Label, None, None, Some(format!("# class {}", class.name)));
        for method in &class.methods {
            self.generate_function(method);
        }
        self.emit(Opcode::Nop, None, None, None);
    }

    fn generate_function(&mut self, func: &FunctionDecl) {
        self.emit(Opcode::Label, None, None, Some(func.name.clone()));
        for param in &func.params {
            self.emit(Opcode::Param, Some(param.name.clone()), None, None);
        }
        for stmt in &func.body.statements {
            self.generate_stmt(stmt);
        }
        if !func.body.statements.iter().any(|s| matches!(s, Stmt::Return(_))) {
            self.emit(Opcode::Return, None, None, None);
        }
        self.emit(Opcode::Nop, None, None, None);
    }

    fn generate_declaration(&mut self, decl: &Declaration) {
        if let Some(init) = &decl.init {
            let value = self.generate_expr(init);
            self.emit(Opcode::Copy, Some(value), None, Some(decl.name.clone()));
        }
    }

    fn generate_block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.generate_stmt(stmt);
        }
    }

    fn generate_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(decl) => self.generate_declaration(decl),
            Stmt::Assign { target, value } => self.generate_assign(target, value),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.generate_if(cond, then_branch, else_branch.as_ref()),
            Stmt::While { cond, body } => self.generate_while(cond, body),
            Stmt::For {
                var,
                init,
                cond,
                step,
                body,
            } => self.generate_for(var, init, cond, step, body),
            Stmt::Print(expr) => {
                let value = self.generate_expr(expr);
                self.emit(Opcode::Param, Some(value), None, None);
                self.emit(Opcode::Call, Some("print".to_string()), Some("1".to_string()), None);
            }
            Stmt::Return(expr) => {
                let value = expr.as_ref().map(|e| self.generate_expr(e));
                self.emit(Opcode::Return, value, None, None);
            }
            Stmt::Send { channel, args } => {
                let chan = self.generate_expr(channel);
                for arg in args {
                    let v = self.generate_expr(arg);
                    self.emit(Opcode::Param, Some(v), None, None);
                }
                self.emit(
                    Opcode::MethodCall,
                    Some(chan),
                    Some("send".to_string()),
                    None,
                );
            }
            Stmt::Receive { channel, targets } => {
                let chan = self.generate_expr(channel);
                let result = self.new_temp();
                self.emit(
                    Opcode::MethodCall,
                    Some(chan),
                    Some("receive".to_string()),
                    Some(result.clone()),
                );
                for (i, target) in targets.iter().enumerate() {
                    self.emit(
                        Opcode::ArrayLoad,
                        Some(result.clone()),
                        Some(i.to_string()),
                        Some(target.clone()),
                    );
                }
            }
            Stmt::Expr(expr) => {
                self.generate_expr(expr);
            }
            Stmt::Nested(block) => self.generate_block(block),
        }
    }

    fn generate_if(&mut self, cond: &Expr, then_branch: &Block, else_branch: Option<&Block>) {
        let cond_temp = self.generate_expr(cond);
        let label_else = self.new_label();
        let label_end = self.new_label();
        self.emit(Opcode::IfFalse, Some(cond_temp), None, Some(label_else.clone()));
        self.generate_block(then_branch);
        self.emit(Opcode::Goto, None, None, Some(label_end.clone()));
        self.emit(Opcode::Label, None, None, Some(label_else));
        if let Some(else_b) = else_branch {
            self.generate_block(else_b);
        }
        self.emit(Opcode::Label, None, None, Some(label_end));
    }

    fn generate_while(&mut self, cond: &Expr, body: &Block) {
        let label_start = self.new_label();
        let label_end = self.new_label();
        self.emit(Opcode::Label, None, None, Some(label_start.clone()));
        let cond_temp = self.generate_expr(cond);
        self.emit(Opcode::IfFalse, Some(cond_temp), None, Some(label_end.clone()));
        self.generate_block(body);
        self.emit(Opcode::Goto, None, None, Some(label_start));
        self.emit(Opcode::Label, None, None, Some(label_end));
    }

    fn generate_for(&mut self, var: &str, init: &Expr, cond: &Expr, step: &Expr, body: &Block) {
        let init_value = self.generate_expr(init);
        self.emit(Opcode::Copy, Some(init_value), None, Some(var.to_string()));
        let label_start = self.new_label();
        let label_end = self.new_label();
        self.emit(Opcode::Label, None, None, Some(label_start.clone()));
        let cond_temp = self.generate_expr(cond);
        self.emit(Opcode::IfFalse, Some(cond_temp), None, Some(label_end.clone()));
        self.generate_block(body);
        let step_value = self.generate_expr(step);
        self.emit(Opcode::Copy, Some(step_value), None, Some(var.to_string()));
        self.emit(Opcode::Goto, None, None, Some(label_start));
        self.emit(Opcode::Label, None, None, Some(label_end));
    }

    fn generate_assign(&mut self, target: &LValue, value: &AssignSource) {
        let value_temp = match value {
            AssignSource::Expr(e) => self.generate_expr(e),
            AssignSource::Input(prompt) => {
                if let Some(p) = prompt {
                    let v = self.generate_expr(p);
                    self.emit(Opcode::Param, Some(v), None, None);
                }
                let result = self.new_temp();
                self.emit(
                    Opcode::Call,
                    Some("input".to_string()),
                    Some(if prompt.is_some() { "1" } else { "0" }.to_string()),
                    Some(result.clone()),
                );
                result
            }
        };
        self.store_lvalue(target, value_temp);
    }

    /// Resolves `target` to a flat name, emitting the load chain for every
    /// accessor but the last, then emits the single store for the last step.
    fn store_lvalue(&mut self, target: &LValue, value_temp: String) {
        let base_name = match &target.base {
            LValueBase::Ident(name) => name.clone(),
            LValueBase::This => "this".to_string(),
        };
        if target.path.is_empty() {
            self.emit(Opcode::Copy, Some(value_temp), None, Some(base_name));
            return;
        }
        let mut current = base_name;
        for accessor in &target.path[..target.path.len() - 1] {
            current = self.load_accessor(current, accessor);
        }
        match target.path.last().expect("non-empty path") {
            Accessor::Attribute(name) => {
                self.emit(
                    Opcode::AttrStore,
                    Some(current),
                    Some(name.clone()),
                    Some(value_temp),
                );
            }
            Accessor::Index(indices) => {
                let index_temp = self.generate_index(indices);
                self.emit(
                    Opcode::ArrayStore,
                    Some(index_temp),
                    Some(value_temp),
                    Some(current),
                );
            }
        }
    }

    fn load_accessor(&mut self, base: String, accessor: &Accessor) -> String {
        match accessor {
            Accessor::Attribute(name) => {
                let result = self.new_temp();
                self.emit(
                    Opcode::AttrLoad,
                    Some(base),
                    Some(name.clone()),
                    Some(result.clone()),
                );
                result
            }
            Accessor::Index(indices) => {
                let index_temp = self.generate_index(indices);
                let result = self.new_temp();
                self.emit(
                    Opcode::ArrayLoad,
                    Some(base),
                    Some(index_temp),
                    Some(result.clone()),
                );
                result
            }
        }
    }

    /// Two-dimensional indices collapse to a single flattened index
    /// temporary via nested `[]` loads, matching how the evaluator walks
    /// multi-dimensional arrays one dimension at a time.
    fn generate_index(&mut self, indices: &[Expr]) -> String {
        let mut iter = indices.iter();
        let mut current = self.generate_expr(iter.next().expect("at least one index"));
        for idx in iter {
            let next_temp = self.generate_expr(idx);
            let combined = self.new_temp();
            self.emit(
                Opcode::Add,
                Some(current),
                Some(next_temp),
                Some(combined.clone()),
            );
            current = combined;
        }
        current
    }

    fn generate_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Number(lexeme) => lexeme.clone(),
            Expr::Str(value) => self.intern_string(value),
            Expr::Ident(name) => name.clone(),
            Expr::This => "this".to_string(),
            Expr::Binary(op, lhs, rhs) => {
                let l = self.generate_expr(lhs);
                let r = self.generate_expr(rhs);
                let result = self.new_temp();
                self.emit(binop_to_opcode(*op), Some(l), Some(r), Some(result.clone()));
                result
            }
            Expr::Unary(UnOp::Neg, inner) => {
                let v = self.generate_expr(inner);
                let result = self.new_temp();
                self.emit(Opcode::Neg, Some(v), None, Some(result.clone()));
                result
            }
            Expr::Unary(UnOp::Not, inner) => {
                let v = self.generate_expr(inner);
                let result = self.new_temp();
                self.emit(Opcode::Not, Some(v), None, Some(result.clone()));
                result
            }
            Expr::Index(base, indices) => {
                let base_name = self.generate_expr(base);
                let index_temp = self.generate_index(indices);
                let result = self.new_temp();
                self.emit(
                    Opcode::ArrayLoad,
                    Some(base_name),
                    Some(index_temp),
                    Some(result.clone()),
                );
                result
            }
            Expr::Attribute(base, name) => {
                let base_name = self.generate_expr(base);
                let result = self.new_temp();
                self.emit(
                    Opcode::AttrLoad,
                    Some(base_name),
                    Some(name.clone()),
                    Some(result.clone()),
                );
                result
            }
            Expr::Call(name, args) => {
                for arg in args {
                    let v = self.generate_expr(arg);
                    self.emit(Opcode::Param, Some(v), None, None);
                }
                let result = self.new_temp();
                self.emit(
                    Opcode::Call,
                    Some(name.clone()),
                    Some(args.len().to_string()),
                    Some(result.clone()),
                );
                result
            }
            Expr::MethodCall(recv, name, args) => {
                let recv_name = self.generate_expr(recv);
                for arg in args {
                    let v = self.generate_expr(arg);
                    self.emit(Opcode::Param, Some(v), None, None);
                }
                let result = self.new_temp();
                self.emit(
                    Opcode::MethodCall,
                    Some(recv_name),
                    Some(name.clone()),
                    Some(result.clone()),
                );
                result
            }
            Expr::New(class_name) => {
                let result = self.new_temp();
                self.emit(Opcode::New, Some(class_name.clone()), None, Some(result.clone()));
                result
            }
            Expr::ArrayInit(items) | Expr::BraceInit(items) => {
                let result = self.new_temp();
                for (i, item) in items.iter().enumerate() {
                    let v = self.generate_expr(item);
                    self.emit(
                        Opcode::ArrayStore,
                        Some(i.to_string()),
                        Some(v),
                        Some(result.clone()),
                    );
                }
                result
            }
        }
    }
}

fn binop_to_opcode(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
        BinOp::Div => Opcode::Div,
        BinOp::Mod => Opcode::Mod,
        BinOp::Eq => Opcode::Eq,
        BinOp::NotEq => Opcode::NotEq,
        BinOp::Lt => Opcode::Lt,
        BinOp::Gt => Opcode::Gt,
        BinOp::LtEq => Opcode::LtEq,
        BinOp::GtEq => Opcode::GtEq,
        BinOp::And => Opcode::And,
        BinOp::Or => Opcode::Or,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{lexer::tokenize, parser::parse};

    fn emit_src(src: &str) -> TacProgram {
        let program = parse(&tokenize(src)).expect("parse should succeed");
        emit(&program)
    }

    #[test]
    fn hello_world_emits_a_single_print_call() {
        let tac = emit_src(r#"SEQ { print("hi"); }"#);
        assert_eq!(tac.string_pool.len(), 1);
        assert!(tac
            .instructions
            .iter()
            .any(|i| i.op == Opcode::Call && i.arg1.as_deref() == Some("print")));
    }

    #[test]
    fn while_loop_emits_start_and_end_labels() {
        let tac = emit_src("SEQ { INT i; i=0; while (i<3) { i=i+1; } }");
        let labels = tac.instructions.iter().filter(|i| i.op == Opcode::Label).count();
        assert!(labels >= 2);
    }

    #[test]
    fn for_loop_emits_init_before_the_loop_label() {
        let tac = emit_src("SEQ { INT i; INT s; s=0; for i=1; i<=5; i=i+1 { s=s+i; } }");
        let first_copy = tac
            .instructions
            .iter()
            .position(|i| i.op == Opcode::Copy && i.result.as_deref() == Some("i"));
        let first_label = tac.instructions.iter().position(|i| i.op == Opcode::Label);
        assert!(first_copy.unwrap() < first_label.unwrap());
    }

    #[test]
    fn string_literals_are_interned_once() {
        let tac = emit_src(r#"SEQ { print("x"); print("x"); }"#);
        assert_eq!(tac.string_pool.len(), 1);
    }

    #[test]
    fn tac_listing_snapshot_for_a_small_program() {
        let tac = emit_src(r#"SEQ { print(1); }"#);
        insta::assert_snapshot!(tac.to_string(), @r"
            param 1
            call print, 1
        ");
    }
}
