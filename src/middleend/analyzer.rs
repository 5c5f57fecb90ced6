//! Semantic analysis: name resolution, type checking, and structural rules.
//!
//! Grounded in `SemanticAnalyzer.py`, generalized to the richer
//! `{success, errors, warnings, statistics}` report the analyzer's contract
//! requires (the Python original only accumulates one flat error list).

use crate::error::SemanticDiagnostic;
use crate::frontend::ast::{
    Accessor, AssignSource, BinOp, Block, ClassDecl, Declaration, Expr, FunctionDecl, LValue,
    LValueBase, Program, Stmt, TopLevel, TypeName, UnOp,
};
use crate::middleend::symbol_table::{Symbol, SymbolTable};
use crate::middleend::types::{arithmetic_result_type, check_assignable, Assignability, ClassHierarchy, SemType};
use serde::Serialize;
use std::collections::HashMap;

/// One class's statically-known shape: parent name, attribute types, and
/// method signatures, keyed for inheritance-chain lookups.
#[derive(Debug, Clone)]
struct ClassInfo {
    parent: Option<String>,
    attributes: HashMap<String, SemType>,
    methods: HashMap<String, (Vec<SemType>, SemType)>,
}

struct ClassTable<'a>(&'a HashMap<String, ClassInfo>);

impl ClassHierarchy for ClassTable<'_> {
    fn parent_of(&self, class_name: &str) -> Option<&str> {
        self.0.get(class_name)?.parent.as_deref()
    }
}

/// A variable exported in the symbol-table projection (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct VariableExport {
    /// Variable name.
    pub name: String,
    /// Display form of its type.
    pub ty: String,
    /// Whether it's an array.
    pub is_array: bool,
}

/// A function exported in the symbol-table projection.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionExport {
    /// Function name.
    pub name: String,
    /// Display form of the return type.
    pub return_type: String,
    /// Display form of each parameter type, in order.
    pub parameters: Vec<String>,
}

/// A class exported in the symbol-table projection.
#[derive(Debug, Clone, Serialize)]
pub struct ClassExport {
    /// Class name.
    pub name: String,
    /// Parent class name, if any.
    pub parent: Option<String>,
    /// Attribute names.
    pub attributes: Vec<String>,
    /// Method names.
    pub methods: Vec<String>,
}

/// The full JSON-shaped symbol-table projection handed back to embedders.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SymbolExport {
    /// Global variables and channels.
    pub variables: Vec<VariableExport>,
    /// Free functions.
    pub functions: Vec<FunctionExport>,
    /// Declared classes.
    pub classes: Vec<ClassExport>,
    /// Declared user type (class) names, flattened for quick membership
    /// checks by embedders.
    pub user_types: Vec<String>,
}

/// Counts of what was declared, for a quick-glance summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Statistics {
    /// Number of classes declared.
    pub classes: usize,
    /// Number of free functions declared.
    pub functions: usize,
    /// Number of top-level variable/channel declarations.
    pub globals: usize,
    /// Number of top-level `seq`/`par` blocks.
    pub top_level_blocks: usize,
}

/// The full output of semantic analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SemanticReport {
    /// `true` iff no hard errors were recorded; the evaluator only runs when
    /// this is `true`.
    pub success: bool,
    /// Hard errors (spec §7's "Semantic (error)" taxonomy).
    pub errors: Vec<String>,
    /// Non-fatal warnings (spec §7's "Semantic (warning)" taxonomy).
    pub warnings: Vec<String>,
    /// Summary counts.
    pub statistics: Statistics,
    /// Exported symbol projection.
    pub symbols: SymbolExport,
}

/// Runs semantic analysis over a parsed program.
#[must_use]
pub fn analyze(program: &Program) -> SemanticReport {
    let mut analyzer = Analyzer::new();
    analyzer.register_builtins();
    analyzer.register_declarations(program);
    analyzer.check_program(program);
    analyzer.finish(program)
}

struct Analyzer {
    table: SymbolTable,
    classes: HashMap<String, ClassInfo>,
    errors: Vec<SemanticDiagnostic>,
    warnings: Vec<SemanticDiagnostic>,
    current_class: Option<String>,
    current_return_type: Option<SemType>,
}

impl Analyzer {
    fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            classes: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            current_class: None,
            current_return_type: None,
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(SemanticDiagnostic::new(message));
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(SemanticDiagnostic::new(message));
    }

    fn register_builtins(&mut self) {
        let builtins: &[(&str, &[SemType], SemType)] = &[
            ("strlen", &[SemType::String], SemType::Int),
            (
                "substr",
                &[SemType::String, SemType::Int, SemType::Int],
                SemType::String,
            ),
            ("charat", &[SemType::String, SemType::Int], SemType::String),
            (
                "indexof",
                &[SemType::String, SemType::String],
                SemType::Int,
            ),
            ("parseint", &[SemType::String], SemType::Int),
            ("print", &[SemType::String], SemType::Void),
            ("input", &[], SemType::String),
        ];
        for (name, params, ret) in builtins {
            self.table.define(Symbol::function(
                *name,
                params.to_vec(),
                ret.clone(),
                0,
            ));
        }
    }

    // ----- declaration registration (preamble pass) ----------------------

    fn register_declarations(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                TopLevel::Class(class) => self.register_class(class),
                TopLevel::Function(func) => self.register_function(func),
                TopLevel::Global(decl) => self.register_global(decl),
                TopLevel::Block(_) | TopLevel::Stmt(_) => {}
            }
        }
        self.check_parent_chains();
    }

    fn register_class(&mut self, class: &ClassDecl) {
        if self.classes.contains_key(&class.name) {
            self.error(format!("duplicate class declaration '{}'", class.name));
            return;
        }
        let attributes = class
            .attributes
            .iter()
            .map(|a| {
                (
                    a.name.clone(),
                    SemType::from_type_name(&a.ty, a.shape.len()),
                )
            })
            .collect();
        let methods = class
            .methods
            .iter()
            .map(|m| {
                let params = m.params.iter().map(|p| SemType::from_type_name(&p.ty, 0)).collect();
                let ret = SemType::from_type_name(&m.return_type, 0);
                (m.name.clone(), (params, ret))
            })
            .collect();
        self.classes.insert(
            class.name.clone(),
            ClassInfo {
                parent: class.parent.clone(),
                attributes,
                methods,
            },
        );
        if !self.table.define(Symbol::class(&class.name, 0)) {
            self.error(format!("duplicate declaration '{}'", class.name));
        }
    }

    fn check_parent_chains(&mut self) {
        let unknown: Vec<String> = self
            .classes
            .iter()
            .filter_map(|(name, info)| {
                info.parent.as_ref().filter(|p| !self.classes.contains_key(*p)).map(|p| {
                    format!("class '{name}' extends unknown class '{p}'")
                })
            })
            .collect();
        for message in unknown {
            self.error(message);
        }
    }

    fn register_function(&mut self, func: &FunctionDecl) {
        let params = func
            .params
            .iter()
            .map(|p| SemType::from_type_name(&p.ty, 0))
            .collect();
        let ret = SemType::from_type_name(&func.return_type, 0);
        if !self.table.define(Symbol::function(&func.name, params, ret, 0)) {
            self.error(format!("duplicate declaration '{}'", func.name));
        }
    }

    fn register_global(&mut self, decl: &Declaration) {
        let ty = SemType::from_type_name(&decl.ty, decl.shape.len());
        let sizes = decl.shape.iter().map(|e| const_int(e)).collect();
        let symbol = Symbol::variable(&decl.name, ty, 0).with_array_sizes(sizes);
        if !self.table.define(symbol) {
            self.error(format!("duplicate declaration '{}'", decl.name));
        }
    }

    // ----- body / statement checking --------------------------------------

    fn check_program(&mut self, program: &Program) {
        for item in &program.items {
            match item {
                TopLevel::Class(class) => self.check_class(class),
                TopLevel::Function(func) => self.check_function(func),
                TopLevel::Global(decl) => self.check_global_init(decl),
                TopLevel::Block(block) => self.check_block_scoped(block),
                TopLevel::Stmt(stmt) => {
                    self.error(
                        "statement outside of a seq/par block or function body is not allowed at the top level",
                    );
                    self.table.enter_scope();
                    self.check_stmt(stmt);
                    self.check_unused_in_current_scope();
                    self.table.exit_scope();
                }
            }
        }
    }

    fn check_global_init(&mut self, decl: &Declaration) {
        if let Some(init) = &decl.init {
            let source = self.check_expr(init);
            let target = SemType::from_type_name(&decl.ty, decl.shape.len());
            self.check_assign_compat(&target, &source, &decl.name);
        }
        for dim in &decl.shape {
            let t = self.check_expr(dim);
            if t != SemType::Int {
                self.error(format!("array size for '{}' must be int", decl.name));
            }
        }
    }

    fn check_class(&mut self, class: &ClassDecl) {
        self.current_class = Some(class.name.clone());
        for method in &class.methods {
            self.check_function_like(method, true);
        }
        self.current_class = None;
    }

    fn check_function(&mut self, func: &FunctionDecl) {
        self.check_function_like(func, false);
    }

    fn check_function_like(&mut self, func: &FunctionDecl, is_method: bool) {
        self.table.enter_scope();
        if is_method {
            let class_name = self.current_class.clone().unwrap_or_default();
            self.table
                .define(Symbol::variable("this", SemType::Class(class_name), self.table.scope_level()));
        }
        for param in &func.params {
            let ty = SemType::from_type_name(&param.ty, 0);
            self.table
                .define(Symbol::variable(&param.name, ty, self.table.scope_level()));
        }
        let ret = SemType::from_type_name(&func.return_type, 0);
        self.current_return_type = Some(ret.clone());
        self.check_stmts(&func.body.statements);
        if ret != SemType::Void && !contains_return(&func.body.statements) {
            self.warn(format!(
                "function '{}' has a non-void return type but no return statement on some path",
                func.name
            ));
        }
        self.current_return_type = None;
        self.check_unused_in_current_scope();
        self.table.exit_scope();
    }

    fn check_block_scoped(&mut self, block: &Block) {
        self.table.enter_scope();
        self.check_stmts(&block.statements);
        self.check_unused_in_current_scope();
        self.table.exit_scope();
    }

    fn check_unused_in_current_scope(&mut self) {
        let unused: Vec<String> = self
            .table
            .current_scope_symbols()
            .filter(|s| !s.is_function && !s.is_class && !s.used && s.name != "this")
            .map(|s| format!("declared but unused variable '{}'", s.name))
            .collect();
        for message in unused {
            self.warn(message);
        }
    }

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(decl) => self.check_local_declaration(decl),
            Stmt::Assign { target, value } => self.check_assign(target, value),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_condition(cond);
                self.check_block_scoped(then_branch);
                if let Some(else_b) = else_branch {
                    self.check_block_scoped(else_b);
                }
            }
            Stmt::While { cond, body } => {
                self.check_condition(cond);
                self.check_block_scoped(body);
            }
            Stmt::For {
                var,
                init,
                cond,
                step,
                body,
            } => {
                let var_ty = match self.table.lookup(var) {
                    Some(sym) => Some(sym.ty.clone()),
                    None => {
                        self.error(format!("loop variable '{var}' must already be declared"));
                        None
                    }
                };
                self.table.mark_used(var);
                let init_ty = self.check_expr(init);
                if let Some(vt) = &var_ty {
                    self.check_assign_compat(vt, &init_ty, var);
                }
                self.check_condition(cond);
                let step_ty = self.check_expr(step);
                if let Some(vt) = &var_ty {
                    self.check_assign_compat(vt, &step_ty, var);
                }
                self.check_block_scoped(body);
            }
            Stmt::Print(expr) => {
                self.check_expr(expr);
            }
            Stmt::Return(expr) => self.check_return(expr.as_ref()),
            Stmt::Send { channel, args } => {
                self.check_expr(channel);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            Stmt::Receive { channel, targets } => {
                self.check_expr(channel);
                for target in targets {
                    if self.table.lookup(target).is_none() {
                        self.table.define(Symbol::variable(
                            target,
                            SemType::Object,
                            0,
                        ));
                    }
                    self.table.mark_used(target);
                }
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
            Stmt::Nested(block) => self.check_block_scoped(block),
        }
    }

    fn check_condition(&mut self, cond: &Expr) {
        let ty = self.check_expr(cond);
        match ty {
            SemType::Bool => {}
            SemType::Int | SemType::Float => {
                self.warn("numeric condition used where a boolean is expected; prefer an explicit comparison".to_string());
            }
            other => {
                self.error(format!("condition must be bool, got {other}"));
            }
        }
    }

    fn check_return(&mut self, expr: Option<&Expr>) {
        let Some(expected) = self.current_return_type.clone() else {
            self.error("return outside of a function or method body".to_string());
            if let Some(e) = expr {
                self.check_expr(e);
            }
            return;
        };
        match (expr, &expected) {
            (None, SemType::Void) => {}
            (None, other) => {
                self.error(format!("return must produce a value of type {other}"));
            }
            (Some(e), SemType::Void) => {
                self.error("function is void but return has a value".to_string());
                self.check_expr(e);
            }
            (Some(e), other) => {
                let actual = self.check_expr(e);
                self.check_assign_compat(other, &actual, "return value");
            }
        }
    }

    fn check_local_declaration(&mut self, decl: &Declaration) {
        let ty = SemType::from_type_name(&decl.ty, decl.shape.len());
        let sizes: Vec<Option<i64>> = decl.shape.iter().map(|e| const_int(e)).collect();
        for dim in &decl.shape {
            let t = self.check_expr(dim);
            if t != SemType::Int {
                self.error(format!("array size for '{}' must be int", decl.name));
            }
        }
        if let Some(init) = &decl.init {
            let source = self.check_expr(init);
            self.check_assign_compat(&ty, &source, &decl.name);
        }
        let symbol = Symbol::variable(&decl.name, ty, self.table.scope_level()).with_array_sizes(sizes);
        if !self.table.define(symbol) {
            self.error(format!("duplicate declaration '{}'", decl.name));
        }
    }

    fn check_assign(&mut self, target: &LValue, value: &AssignSource) {
        let target_ty = self.resolve_lvalue(target);
        let source_ty = match value {
            AssignSource::Expr(e) => self.check_expr(e),
            AssignSource::Input(prompt) => {
                if let Some(p) = prompt {
                    self.check_expr(p);
                }
                SemType::String
            }
        };
        if let Some(t) = target_ty {
            self.check_assign_compat(&t, &source_ty, &lvalue_name(target));
        }
    }

    fn check_assign_compat(&mut self, target: &SemType, source: &SemType, what: &str) {
        let hierarchy = ClassTable(&self.classes);
        match check_assignable(target, source, &hierarchy) {
            Assignability::Allowed => {}
            Assignability::AllowedWithWarning => {
                self.warn(format!(
                    "implicit widening assigning {source} to {what} of type {target}"
                ));
            }
            Assignability::Disallowed => {
                self.error(format!(
                    "cannot assign {source} to {what} of type {target}"
                ));
            }
        }
    }

    /// Resolves an lvalue's static type, auto-declaring a fresh global
    /// `object`-typed binding for a bare, previously-unseen identifier
    /// target (mirrors the evaluator's permissive implicit-globalization
    /// contract; see spec §9 "Global-vs-local scope mutation").
    fn resolve_lvalue(&mut self, lvalue: &LValue) -> Option<SemType> {
        let base_ty = match &lvalue.base {
            LValueBase::This => {
                if let Some(class_name) = &self.current_class {
                    Some(SemType::Class(class_name.clone()))
                } else {
                    self.error("'this' used outside a method".to_string());
                    None
                }
            }
            LValueBase::Ident(name) => {
                if let Some(sym) = self.table.lookup(name) {
                    let ty = sym.ty.clone();
                    let sizes = sym.array_sizes.clone();
                    self.table.mark_used(name);
                    if let Some(Accessor::Index(indices)) = lvalue.path.first() {
                        self.check_array_bounds(&sizes, indices);
                    }
                    Some(ty)
                } else if lvalue.path.is_empty() {
                    self.table
                        .define(Symbol::variable(name, SemType::Object, 0));
                    Some(SemType::Object)
                } else {
                    self.error(format!("undeclared identifier '{name}'"));
                    None
                }
            }
        };
        let mut current = base_ty?;
        for accessor in &lvalue.path {
            current = self.resolve_accessor(current, accessor)?;
        }
        Some(current)
    }

    /// Flags a constant index equal to or beyond a known declared dimension
    /// size as a semantic error (spec §4.3/§8: constant indices equal to the
    /// declared size are caught here, not left to a runtime bounds check).
    fn check_array_bounds(&mut self, declared_sizes: &[Option<i64>], indices: &[Expr]) {
        for (dim, idx) in indices.iter().enumerate() {
            let Some(Some(size)) = declared_sizes.get(dim) else {
                continue;
            };
            if let Some(value) = const_int(idx) {
                if value < 0 || value >= *size {
                    self.error(format!(
                        "constant array index {value} is out of bounds for declared size {size}"
                    ));
                }
            }
        }
    }

    fn resolve_accessor(&mut self, base: SemType, accessor: &Accessor) -> Option<SemType> {
        match accessor {
            Accessor::Attribute(name) => self.resolve_attribute(&base, name),
            Accessor::Index(indices) => {
                for idx in indices {
                    let t = self.check_expr(idx);
                    if t != SemType::Int {
                        self.error("array index must be int".to_string());
                    }
                }
                match base {
                    SemType::Array(elem) => Some(*elem),
                    SemType::Object => Some(SemType::Object),
                    other => {
                        self.error(format!("cannot index a value of type {other}"));
                        None
                    }
                }
            }
        }
    }

    fn resolve_attribute(&mut self, base: &SemType, name: &str) -> Option<SemType> {
        match base {
            SemType::Class(class_name) => {
                if let Some(ty) = self.lookup_attribute(class_name, name) {
                    Some(ty)
                } else if self.lookup_method(class_name, name).is_some() {
                    self.warn(format!(
                        "'{name}' is a method on '{class_name}', treated as an attribute access here"
                    ));
                    Some(SemType::Object)
                } else {
                    self.error(format!("class '{class_name}' has no attribute '{name}'"));
                    None
                }
            }
            SemType::Object => Some(SemType::Object),
            other => {
                self.error(format!("cannot access attribute '{name}' on {other}"));
                None
            }
        }
    }

    fn lookup_attribute(&self, class_name: &str, attr: &str) -> Option<SemType> {
        let mut current = class_name;
        loop {
            let info = self.classes.get(current)?;
            if let Some(ty) = info.attributes.get(attr) {
                return Some(ty.clone());
            }
            current = info.parent.as_deref()?;
        }
    }

    fn lookup_method(&self, class_name: &str, method: &str) -> Option<(Vec<SemType>, SemType)> {
        let mut current = class_name;
        loop {
            let info = self.classes.get(current)?;
            if let Some(sig) = info.methods.get(method) {
                return Some(sig.clone());
            }
            current = info.parent.as_deref()?;
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> SemType {
        match expr {
            Expr::Number(lexeme) => {
                if lexeme.contains('.') {
                    SemType::Float
                } else {
                    SemType::Int
                }
            }
            Expr::Str(_) => SemType::String,
            Expr::Ident(name) => {
                if let Some(sym) = self.table.lookup(name) {
                    let ty = sym.ty.clone();
                    self.table.mark_used(name);
                    ty
                } else {
                    self.error(format!("undeclared identifier '{name}'"));
                    SemType::Object
                }
            }
            Expr::This => {
                if let Some(class_name) = &self.current_class {
                    SemType::Class(class_name.clone())
                } else {
                    self.error("'this' used outside a method".to_string());
                    SemType::Object
                }
            }
            Expr::Binary(op, lhs, rhs) => self.check_binary(*op, lhs, rhs),
            Expr::Unary(UnOp::Neg, inner) => {
                let t = self.check_expr(inner);
                if !t.is_numeric() {
                    self.error(format!("unary '-' requires a numeric operand, got {t}"));
                }
                t
            }
            Expr::Unary(UnOp::Not, inner) => {
                let t = self.check_expr(inner);
                if t != SemType::Bool {
                    self.error(format!("unary '!' requires a bool operand, got {t}"));
                }
                SemType::Bool
            }
            Expr::Index(base, indices) => {
                let base_ty = self.check_expr(base);
                for idx in indices {
                    let t = self.check_expr(idx);
                    if t != SemType::Int {
                        self.error("array index must be int".to_string());
                    }
                }
                if let Expr::Ident(name) = base.as_ref() {
                    if let Some(sizes) = self.table.lookup(name).map(|s| s.array_sizes.clone()) {
                        self.check_array_bounds(&sizes, indices);
                    }
                }
                match base_ty {
                    SemType::Array(elem) => *elem,
                    SemType::Object => SemType::Object,
                    other => {
                        self.error(format!("cannot index a value of type {other}"));
                        SemType::Object
                    }
                }
            }
            Expr::Attribute(base, name) => {
                let base_ty = self.check_expr(base);
                self.resolve_attribute(&base_ty, name).unwrap_or(SemType::Object)
            }
            Expr::Call(name, args) => self.check_call(name, args),
            Expr::MethodCall(recv, name, args) => self.check_method_call(recv, name, args),
            Expr::New(class_name) => {
                if self.classes.contains_key(class_name) {
                    SemType::Class(class_name.clone())
                } else {
                    self.error(format!("unknown class '{class_name}'"));
                    SemType::Object
                }
            }
            Expr::ArrayInit(items) | Expr::BraceInit(items) => {
                let mut elem_ty: Option<SemType> = None;
                for item in items {
                    let t = self.check_expr(item);
                    elem_ty = match elem_ty {
                        None => Some(t),
                        Some(prev) if prev == t => Some(prev),
                        Some(_) => Some(SemType::Object),
                    };
                }
                SemType::Array(Box::new(elem_ty.unwrap_or(SemType::Object)))
            }
        }
    }

    fn check_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> SemType {
        let lt = self.check_expr(lhs);
        let rt = self.check_expr(rhs);
        match op {
            BinOp::Add => {
                if lt == SemType::String || rt == SemType::String {
                    SemType::String
                } else if lt.is_numeric() && rt.is_numeric() {
                    arithmetic_result_type(&lt, &rt)
                } else {
                    self.error(format!("'+' requires numeric or string operands, got {lt} and {rt}"));
                    SemType::Object
                }
            }
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                if matches!(op, BinOp::Div | BinOp::Mod) && is_literal_zero(rhs) {
                    self.error("division by a literal zero".to_string());
                }
                if lt.is_numeric() && rt.is_numeric() {
                    arithmetic_result_type(&lt, &rt)
                } else {
                    self.error(format!("arithmetic operator requires numeric operands, got {lt} and {rt}"));
                    SemType::Object
                }
            }
            BinOp::Eq | BinOp::NotEq => {
                let ok = (lt.is_numeric() && rt.is_numeric()) || (lt == SemType::String && rt == SemType::String);
                if !ok {
                    self.error(format!("comparison requires two numerics or two strings, got {lt} and {rt}"));
                }
                SemType::Bool
            }
            BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => {
                if !(lt.is_numeric() && rt.is_numeric()) {
                    self.error(format!("relational operator requires numeric operands, got {lt} and {rt}"));
                }
                SemType::Bool
            }
            BinOp::And | BinOp::Or => {
                if lt != SemType::Bool || rt != SemType::Bool {
                    self.error(format!("logical operator requires bool operands, got {lt} and {rt}"));
                }
                SemType::Bool
            }
        }
    }

    fn check_call(&mut self, name: &str, args: &[Expr]) -> SemType {
        let arg_types: Vec<SemType> = args.iter().map(|a| self.check_expr(a)).collect();
        let Some(sym) = self.table.lookup(name).cloned() else {
            self.error(format!("undeclared function '{name}'"));
            return SemType::Object;
        };
        if !sym.is_function {
            self.error(format!("'{name}' is not callable"));
            return SemType::Object;
        }
        let arity_ok = if name == "indexof" {
            arg_types.len() == 2 || arg_types.len() == 3
        } else {
            arg_types.len() == sym.parameters.len()
        };
        if !arity_ok {
            self.error(format!(
                "'{name}' expects {} argument(s), got {}",
                sym.parameters.len(),
                arg_types.len()
            ));
        } else {
            for (param_ty, arg_ty) in sym.parameters.iter().zip(arg_types.iter()) {
                self.check_assign_compat(param_ty, arg_ty, &format!("argument to '{name}'"));
            }
        }
        sym.return_type.clone().unwrap_or(SemType::Void)
    }

    fn check_method_call(&mut self, recv: &Expr, name: &str, args: &[Expr]) -> SemType {
        let recv_ty = self.check_expr(recv);
        let arg_types: Vec<SemType> = args.iter().map(|a| self.check_expr(a)).collect();
        match &recv_ty {
            SemType::Class(class_name) => {
                if let Some((params, ret)) = self.lookup_method(class_name, name) {
                    if params.len() != arg_types.len() {
                        self.error(format!(
                            "method '{name}' expects {} argument(s), got {}",
                            params.len(),
                            arg_types.len()
                        ));
                    } else {
                        for (param_ty, arg_ty) in params.iter().zip(arg_types.iter()) {
                            self.check_assign_compat(param_ty, arg_ty, &format!("argument to '{name}'"));
                        }
                    }
                    ret
                } else if self.lookup_attribute(class_name, name).is_some() {
                    self.warn(format!(
                        "'{name}' is an attribute on '{class_name}'; call-syntax access treated as attribute"
                    ));
                    SemType::Object
                } else {
                    self.error(format!("class '{class_name}' has no method '{name}'"));
                    SemType::Object
                }
            }
            SemType::Channel => {
                if name == "send" {
                    SemType::Void
                } else if name == "receive" {
                    SemType::Void
                } else {
                    self.error(format!("unknown channel operation '{name}'"));
                    SemType::Object
                }
            }
            SemType::Object => SemType::Object,
            other => {
                self.error(format!("cannot call method '{name}' on {other}"));
                SemType::Object
            }
        }
    }

    fn finish(mut self, program: &Program) -> SemanticReport {
        self.check_unused_globals();
        let success = self.errors.is_empty();
        let statistics = Statistics {
            classes: program.items.iter().filter(|i| matches!(i, TopLevel::Class(_))).count(),
            functions: program.items.iter().filter(|i| matches!(i, TopLevel::Function(_))).count(),
            globals: program.items.iter().filter(|i| matches!(i, TopLevel::Global(_))).count(),
            top_level_blocks: program.items.iter().filter(|i| matches!(i, TopLevel::Block(_))).count(),
        };
        let symbols = self.export_symbols(program);
        SemanticReport {
            success,
            errors: self.errors.into_iter().map(|d| d.to_string()).collect(),
            warnings: self.warnings.into_iter().map(|d| d.to_string()).collect(),
            statistics,
            symbols,
        }
    }

    fn check_unused_globals(&mut self) {
        let unused: Vec<String> = self
            .table
            .globals()
            .filter(|s| !s.is_function && !s.is_class && !s.used)
            .map(|s| format!("declared but unused global '{}'", s.name))
            .collect();
        for message in unused {
            self.warn(message);
        }
    }

    fn export_symbols(&self, program: &Program) -> SymbolExport {
        let mut export = SymbolExport::default();
        for item in &program.items {
            match item {
                TopLevel::Global(decl) => export.variables.push(VariableExport {
                    name: decl.name.clone(),
                    ty: decl.ty.to_string(),
                    is_array: !decl.shape.is_empty(),
                }),
                TopLevel::Function(func) => export.functions.push(FunctionExport {
                    name: func.name.clone(),
                    return_type: func.return_type.to_string(),
                    parameters: func.params.iter().map(|p| p.ty.to_string()).collect(),
                }),
                TopLevel::Class(class) => {
                    export.user_types.push(class.name.clone());
                    export.classes.push(ClassExport {
                        name: class.name.clone(),
                        parent: class.parent.clone(),
                        attributes: class.attributes.iter().map(|a| a.name.clone()).collect(),
                        methods: class.methods.iter().map(|m| m.name.clone()).collect(),
                    });
                }
                TopLevel::Block(_) | TopLevel::Stmt(_) => {}
            }
        }
        export
    }
}

fn lvalue_name(lvalue: &LValue) -> String {
    let base = match &lvalue.base {
        LValueBase::Ident(name) => name.clone(),
        LValueBase::This => "this".to_string(),
    };
    lvalue.path.iter().fold(base, |acc, accessor| match accessor {
        Accessor::Attribute(name) => format!("{acc}.{name}", acc = acc),
        Accessor::Index(_) => format!("{acc}[..]", acc = acc),
    })
}

/// Best-effort constant folding for array-size and bounds-check purposes:
/// only plain numeric literals (optionally negated) count as constants.
fn const_int(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Number(lexeme) if !lexeme.contains('.') => lexeme.parse().ok(),
        Expr::Unary(UnOp::Neg, inner) => const_int(inner).map(|n| -n),
        _ => None,
    }
}

fn is_literal_zero(expr: &Expr) -> bool {
    matches!(const_int(expr), Some(0))
}

/// Conservative presence check for a `return` statement anywhere in a
/// function/method body, per spec §4.3's "not a control-flow analysis"
/// caveat: it doesn't prove every path returns, only that at least one
/// `return` exists somewhere in the body (including nested blocks).
fn contains_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_contains_return)
}

fn stmt_contains_return(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return(_) => true,
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            contains_return(&then_branch.statements)
                || else_branch.as_ref().is_some_and(|b| contains_return(&b.statements))
        }
        Stmt::While { body, .. } | Stmt::For { body, .. } => contains_return(&body.statements),
        Stmt::Nested(block) => contains_return(&block.statements),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{lexer::tokenize, parser::parse};

    fn analyze_src(src: &str) -> SemanticReport {
        let program = parse(&tokenize(src)).expect("parse should succeed");
        analyze(&program)
    }

    #[test]
    fn hello_world_has_no_diagnostics() {
        let report = analyze_src(r#"SEQ { print("Hello, World!\n"); }"#);
        assert!(report.success);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn widening_assignment_warns_not_errors() {
        let report =
            analyze_src("SEQ { INT a; FLOAT b; a=3; b=2.5; print(a+b); }");
        assert!(report.success);
        assert!(report.warnings.iter().any(|w| w.contains("widening")));
    }

    #[test]
    fn inheritance_resolves_attribute_through_parent() {
        let report = analyze_src(
            "class A { INT x; VOID setX(INT v) { this.x = v; } }\n\
             class B extends A { INT twice() { return this.x + this.x; } }\n\
             SEQ { B b; b = new B(); b.setX(21); print(b.twice()); }",
        );
        assert!(report.success, "errors: {:?}", report.errors);
    }

    #[test]
    fn undeclared_identifier_is_an_error() {
        let report = analyze_src("SEQ { print(unknown_var); }");
        assert!(!report.success);
        assert!(report.errors.iter().any(|e| e.contains("undeclared")));
    }

    #[test]
    fn constant_index_equal_to_declared_size_is_an_error() {
        let report = analyze_src("SEQ { INT arr[3]; print(arr[3]); }");
        assert!(!report.success);
        assert!(report.errors.iter().any(|e| e.contains("out of bounds")));
    }

    #[test]
    fn constant_index_within_declared_size_is_accepted() {
        let report = analyze_src("SEQ { INT arr[3]; print(arr[2]); }");
        assert!(report.success, "errors: {:?}", report.errors);
    }

    #[test]
    fn loose_top_level_statement_is_a_structural_error() {
        let report = analyze_src("INT x; x = 5;\nINT y = x;\n");
        // `x = 5;` sits outside any seq/par block or function body.
        assert!(report.errors.iter().any(|e| e.contains("top level")));
    }
}
