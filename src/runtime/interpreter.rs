//! The tree-walking evaluator (spec §4.5 — "the hard core").
//!
//! Grounded in `Brahmastra-Labs-logicaffeine`'s `Interpreter` for the
//! overall shape (a scope-stack-carrying struct with `execute_stmt`/
//! `evaluate_expr` methods and a `ControlFlow` signal for `return`), scaled
//! up with the concurrency, class-dispatch, channel, and interactive-input
//! machinery spec §4.5/§5 require but the teacher's single-threaded
//! original doesn't need.

use crate::error::RuntimeError;
use crate::frontend::ast::{
    Accessor, AssignSource, BinOp, Block, BlockKind, ClassDecl, Declaration, Expr, FunctionDecl,
    LValue, LValueBase, Program, Stmt, TopLevel, TypeName, UnOp,
};
use crate::runtime::builtins;
use crate::runtime::channel::ChannelHandle;
use crate::runtime::input::{InputProvider, OutputSink};
use crate::runtime::network::{NetworkChannel, Role};
use crate::runtime::scope::{CallFrames, Globals};
use crate::runtime::value::{ObjectInstance, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// One class's runtime shape: parent name, attributes (in declaration
/// order, so array shapes evaluate in the order the program wrote them),
/// and methods by name. Flattened from [`ClassDecl`] so the evaluator
/// doesn't hold a borrow into the source AST (needed for `par` tasks to be
/// `'static`).
#[derive(Debug, Clone)]
struct ClassInfo {
    parent: Option<String>,
    attributes: Vec<crate::frontend::ast::Attribute>,
    methods: HashMap<String, Arc<FunctionDecl>>,
}

/// How to resolve a `c_channel` declared with two endpoint ids into a
/// network role, per spec §6.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// Channel name to `(host:port, role)`, the explicit form.
    pub explicit: HashMap<String, (String, ChannelRole)>,
    /// Endpoint id to `host:port`, the implicit form (paired with `node_id`).
    pub endpoint_map: HashMap<String, String>,
    /// This process's node id, used with `endpoint_map` to decide bind vs
    /// connect for a channel declared with two endpoint ids.
    pub node_id: Option<String>,
}

/// Listener or connector role for a networked channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// This process listens for the peer.
    Bind,
    /// This process connects out to the peer.
    Connect,
}

impl ChannelConfig {
    fn resolve(&self, channel_name: &str, channel_ids: Option<&(String, String)>) -> Option<(String, Role)> {
        if let Some((addr, role)) = self.explicit.get(channel_name) {
            let role = match role {
                ChannelRole::Bind => Role::Bind,
                ChannelRole::Connect => Role::Connect,
            };
            return Some((addr.clone(), role));
        }
        let (id1, id2) = channel_ids?;
        let node_id = self.node_id.as_ref()?;
        if node_id == id1 {
            let addr = self.endpoint_map.get(id1)?;
            return Some((addr.clone(), Role::Bind));
        }
        if node_id == id2 {
            let addr = self.endpoint_map.get(id2)?;
            return Some((addr.clone(), Role::Connect));
        }
        None
    }
}

/// Everything the CLI/embedder configures for one `execute` call (spec
/// §8's ambient `RunConfig`).
pub struct RunConfig {
    /// Where `input()` results come from.
    pub input_provider: Arc<dyn InputProvider>,
    /// Where `print` writes.
    pub output_sink: Arc<dyn OutputSink>,
    /// Network channel resolution.
    pub channel_config: ChannelConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_provider: Arc::new(crate::runtime::input::DirectInputProvider::new(Vec::new())),
            output_sink: Arc::new(crate::runtime::input::BufferSink::new()),
            channel_config: ChannelConfig::default(),
        }
    }
}

/// Control-flow signal threaded back up through statement execution. Not
/// an error: `return` is ordinary, expected control flow.
enum Flow {
    Normal,
    Return(Value),
}

/// The shared, `'static`, `Clone`-able evaluation context: class/function
/// tables (read-only after the preamble pass), the global scope, and the
/// configured input/output/channel collaborators. Cloning an `Interp`
/// shares all of this (every field is reference-counted), which is what
/// lets a `par` block hand each task its own `Interp` clone plus a fresh,
/// private [`CallFrames`].
#[derive(Clone)]
pub struct Interp {
    classes: Arc<HashMap<String, ClassInfo>>,
    functions: Arc<HashMap<String, Arc<FunctionDecl>>>,
    globals: Arc<Globals>,
    input: Arc<dyn InputProvider>,
    output: Arc<dyn OutputSink>,
    print_lock: Arc<Mutex<()>>,
    channel_config: Arc<ChannelConfig>,
}

/// Top-level outcome of running a whole program: the evaluator terminates
/// either cleanly or with a captured runtime error (spec §7: "an unhandled
/// runtime error at top level terminates the pipeline and is reported").
pub type ExecResult = Result<(), RuntimeError>;

impl Interp {
    /// Builds the evaluation context from a parsed program: indexes
    /// classes/functions, and returns the ordered list of top-level blocks
    /// to execute (spec §4.5's preamble pass runs separately via
    /// [`Interp::run_preamble`]).
    #[must_use]
    pub fn build(program: &Program, config: RunConfig) -> (Self, Vec<Block>) {
        let mut classes = HashMap::new();
        let mut functions = HashMap::new();
        let mut blocks = Vec::new();
        for item in &program.items {
            match item {
                TopLevel::Class(class) => {
                    classes.insert(class.name.clone(), class_info(class));
                }
                TopLevel::Function(func) => {
                    functions.insert(func.name.clone(), Arc::new(func.clone()));
                }
                TopLevel::Block(block) => blocks.push(block.clone()),
                TopLevel::Global(_) | TopLevel::Stmt(_) => {}
            }
        }
        let interp = Interp {
            classes: Arc::new(classes),
            functions: Arc::new(functions),
            globals: Arc::new(Globals::new()),
            input: config.input_provider,
            output: config.output_sink,
            print_lock: Arc::new(Mutex::new(())),
            channel_config: Arc::new(config.channel_config),
        };
        (interp, blocks)
    }

    /// Runs the preamble pass: materializes top-level variable/channel
    /// declarations against the global scope, in source order, before any
    /// block executes (spec §3's global-declaration lifecycle).
    pub fn run_preamble(&self, program: &Program) -> ExecResult {
        let mut frames = CallFrames::new();
        for item in &program.items {
            if let TopLevel::Global(decl) = item {
                self.exec_declaration(&mut frames, decl, true)?;
            }
        }
        Ok(())
    }

    /// Runs the program's top-level blocks in source order on the calling
    /// thread.
    pub fn run(&self, blocks: &[Block]) -> ExecResult {
        let mut frames = CallFrames::new();
        for block in blocks {
            self.exec_block(&mut frames, block)?;
        }
        Ok(())
    }

    // ----- declarations ---------------------------------------------------

    fn exec_declaration(&self, frames: &mut CallFrames, decl: &Declaration, is_global: bool) -> ExecResult {
        if decl.ty == TypeName::CChannel {
            let handle = self.make_channel(decl)?;
            self.bind(frames, &decl.name, Value::Channel(handle), is_global);
            return Ok(());
        }
        if !decl.shape.is_empty() {
            let dims = decl
                .shape
                .iter()
                .map(|e| self.eval_expr(frames, e).and_then(as_index))
                .collect::<Result<Vec<_>, _>>()?;
            let value = build_array(&decl.ty, &dims);
            self.bind(frames, &decl.name, value, is_global);
            return Ok(());
        }
        let value = match &decl.init {
            Some(expr) => self.eval_expr(frames, expr)?,
            None => Value::zero_for(&decl.ty),
        };
        self.bind(frames, &decl.name, value, is_global);
        Ok(())
    }

    fn make_channel(&self, decl: &Declaration) -> Result<ChannelHandle, RuntimeError> {
        if let Some(resolved) = self
            .channel_config
            .resolve(&decl.name, decl.channel_ids.as_ref())
        {
            let (addr, role) = resolved;
            debug!(channel = %decl.name, %addr, ?role, "establishing network channel");
            let channel = NetworkChannel::establish(&addr, role)?;
            return Ok(ChannelHandle::Network(channel));
        }
        Ok(ChannelHandle::local())
    }

    fn bind(&self, frames: &mut CallFrames, name: &str, value: Value, is_global: bool) {
        if is_global || frames.is_empty() {
            self.globals.set(name, value);
        } else {
            frames.declare_local(name, value);
        }
    }

    // ----- statements -------------------------------------------------------

    fn exec_block(&self, frames: &mut CallFrames, block: &Block) -> Result<Flow, RuntimeError> {
        match block.kind {
            BlockKind::Seq => self.exec_seq(frames, &block.statements),
            BlockKind::Par => self.exec_par(&block.statements),
        }
    }

    fn exec_seq(&self, frames: &mut CallFrames, statements: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            match self.exec_stmt(frames, stmt)? {
                Flow::Normal => {}
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal)
    }

    /// Fans each top-level statement of a `par` block out onto its own
    /// thread with a fresh, empty call-frame chain (spec §5: tasks may not
    /// observe sibling locals), then joins all of them. A sibling's
    /// uncaught error is captured and surfaced once every task has
    /// terminated (spec §4.5/§5), rather than aborting the others.
    fn exec_par(&self, statements: &[Stmt]) -> Result<Flow, RuntimeError> {
        let handles: Vec<_> = statements
            .iter()
            .cloned()
            .map(|stmt| {
                let interp = self.clone();
                std::thread::spawn(move || {
                    let mut frames = CallFrames::new();
                    interp.exec_stmt(&mut frames, &stmt).map(|_| ())
                })
            })
            .collect();

        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => first_error.get_or_insert(e.to_string()),
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "par task panicked".to_string());
                    first_error.get_or_insert(msg)
                }
            };
        }
        if let Some(msg) = first_error {
            return Err(RuntimeError::TaskFailed(msg));
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, frames: &mut CallFrames, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Declaration(decl) => {
                self.exec_declaration(frames, decl, frames.is_empty())?;
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value } => {
                let value = match value {
                    AssignSource::Expr(expr) => self.eval_expr(frames, expr)?,
                    AssignSource::Input(prompt) => self.exec_input(frames, target, prompt)?,
                };
                self.assign(frames, target, value)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(frames, cond)?.is_truthy() {
                    self.exec_block(frames, then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(frames, else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_expr(frames, cond)?.is_truthy() {
                    match self.exec_block(frames, body)? {
                        Flow::Normal => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                var,
                init,
                cond,
                step,
                body,
            } => {
                let init_val = self.eval_expr(frames, init)?;
                self.assign(frames, &LValue::name(var.clone()), init_val)?;
                while self.eval_expr(frames, cond)?.is_truthy() {
                    match self.exec_block(frames, body)? {
                        Flow::Normal => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    let step_val = self.eval_expr(frames, step)?;
                    self.assign(frames, &LValue::name(var.clone()), step_val)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.eval_expr(frames, expr)?;
                let text = match &value {
                    Value::String(s) => expand_escapes(s),
                    other => other.display_string(),
                };
                let _guard = self.print_lock.lock().expect("print lock poisoned");
                self.output.write(&text);
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(frames, expr)?,
                    None => Value::Unset,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Send { channel, args } => {
                let handle = self.resolve_channel(frames, channel)?;
                let values = args
                    .iter()
                    .map(|a| self.eval_expr(frames, a))
                    .collect::<Result<Vec<_>, _>>()?;
                trace!(arity = values.len(), "channel send");
                handle.send(values);
                Ok(Flow::Normal)
            }
            Stmt::Receive { channel, targets } => {
                let handle = self.resolve_channel(frames, channel)?;
                trace!(targets = targets.len(), "channel receive waiting");
                let values = handle.receive();
                for (target, value) in targets.iter().zip(values.into_iter()) {
                    // Spec §4.5: receive targets bind in the global scope if
                    // not already bound in the current frame.
                    if frames.assign_if_bound(target, value.clone()) {
                        continue;
                    }
                    self.globals.set(target, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval_expr(frames, expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Nested(block) => self.exec_block(frames, block),
        }
    }

    fn exec_input(
        &self,
        frames: &mut CallFrames,
        target: &LValue,
        prompt: &Option<Expr>,
    ) -> Result<Value, RuntimeError> {
        let prompt_text = match prompt {
            Some(expr) => Some(self.eval_expr(frames, expr)?.display_string()),
            None => None,
        };
        let raw = self.input.read_line(prompt_text.as_deref())?;
        let target_type = self.target_type(frames, target);
        coerce_input(&raw, target_type.as_ref())
    }

    /// Best-effort lookup of the declared type of an assignment target, for
    /// input coercion. Falls back to `string` (no coercion) when the
    /// target's current value doesn't exist yet or isn't directly typed
    /// (e.g. a fresh array element), matching the source's permissive
    /// posture.
    fn target_type(&self, frames: &mut CallFrames, target: &LValue) -> Option<TypeName> {
        if !target.path.is_empty() {
            return None;
        }
        let name = match &target.base {
            LValueBase::Ident(n) => n.clone(),
            LValueBase::This => return None,
        };
        let current = frames.lookup(&name).or_else(|| self.globals.get(&name))?;
        Some(match current {
            Value::Integer(_) => TypeName::Int,
            Value::Float(_) => TypeName::Float,
            Value::Boolean(_) => TypeName::Bool,
            _ => TypeName::String,
        })
    }

    fn resolve_channel(&self, frames: &mut CallFrames, channel: &Expr) -> Result<ChannelHandle, RuntimeError> {
        if let Expr::Ident(name) = channel {
            if let Some(value) = frames.lookup(name).or_else(|| self.globals.get(name)) {
                return match value {
                    Value::Channel(handle) => Ok(handle),
                    other => Err(RuntimeError::InvalidOperation(format!(
                        "'{name}' is not a channel (got {})",
                        other.display_string()
                    ))),
                };
            }
            // Spec §4.5: an undeclared channel name auto-creates an
            // in-process channel, registered globally.
            debug!(channel = %name, "auto-creating undeclared channel");
            let handle = ChannelHandle::local();
            self.globals.set(name, Value::Channel(handle.clone()));
            return Ok(handle);
        }
        match self.eval_expr(frames, channel)? {
            Value::Channel(handle) => Ok(handle),
            other => Err(RuntimeError::InvalidOperation(format!(
                "expression does not name a channel (got {})",
                other.display_string()
            ))),
        }
    }

    // ----- lvalue assignment -------------------------------------------------

    fn assign(&self, frames: &mut CallFrames, target: &LValue, value: Value) -> Result<(), RuntimeError> {
        if target.path.is_empty() {
            return match &target.base {
                LValueBase::Ident(name) => {
                    if frames.assign_if_bound(name, value.clone()) {
                        return Ok(());
                    }
                    self.globals.set(name, value);
                    Ok(())
                }
                LValueBase::This => Err(RuntimeError::InvalidOperation(
                    "cannot assign directly to 'this'".to_string(),
                )),
            };
        }

        let resolved_path = self.resolve_path(frames, &target.path)?;
        match &target.base {
            LValueBase::Ident(name) => {
                let mut current = frames
                    .lookup(name)
                    .or_else(|| self.globals.get(name))
                    .ok_or_else(|| RuntimeError::UndeclaredIdentifier(name.clone()))?;
                apply_path_mut(&mut current, &resolved_path, value)?;
                if !frames.assign_if_bound(name, current.clone()) {
                    self.globals.set(name, current);
                }
                Ok(())
            }
            LValueBase::This => {
                let this_value = frames
                    .lookup("this")
                    .ok_or_else(|| RuntimeError::InvalidOperation("'this' used outside a method".to_string()))?;
                // `this` is an `Arc<Mutex<_>>`-backed Object: mutating
                // through the path mutates the shared instance directly,
                // no write-back needed.
                let mut this_clone = this_value;
                apply_path_mut(&mut this_clone, &resolved_path, value)
            }
        }
    }

    fn resolve_path(&self, frames: &mut CallFrames, path: &[Accessor]) -> Result<Vec<ResolvedAccessor>, RuntimeError> {
        path.iter()
            .map(|accessor| match accessor {
                Accessor::Attribute(name) => Ok(ResolvedAccessor::Attribute(name.clone())),
                Accessor::Index(exprs) => {
                    let idxs = exprs
                        .iter()
                        .map(|e| self.eval_expr(frames, e).and_then(as_index))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(ResolvedAccessor::Index(idxs))
                }
            })
            .collect()
    }

    // ----- expressions --------------------------------------------------

    fn eval_expr(&self, frames: &mut CallFrames, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Number(lexeme) => Ok(parse_number(lexeme)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Ident(name) => self.lookup(frames, name),
            Expr::This => frames
                .lookup("this")
                .ok_or_else(|| RuntimeError::InvalidOperation("'this' used outside a method".to_string())),
            Expr::Binary(op, lhs, rhs) => {
                let lv = self.eval_expr(frames, lhs)?;
                let rv = self.eval_expr(frames, rhs)?;
                eval_binary(*op, lv, rv)
            }
            Expr::Unary(op, expr) => {
                let v = self.eval_expr(frames, expr)?;
                eval_unary(*op, v)
            }
            Expr::Index(base, indices) => {
                let base_val = self.eval_expr(frames, base)?;
                let idxs = indices
                    .iter()
                    .map(|e| self.eval_expr(frames, e).and_then(as_index))
                    .collect::<Result<Vec<_>, _>>()?;
                index_into(&base_val, &idxs)
            }
            Expr::Attribute(base, name) => {
                let base_val = self.eval_expr(frames, base)?;
                attribute_of(&base_val, name)
            }
            Expr::Call(name, args) => self.eval_call(frames, name, args),
            Expr::MethodCall(recv, name, args) => {
                let recv_val = self.eval_expr(frames, recv)?;
                let arg_vals = args
                    .iter()
                    .map(|a| self.eval_expr(frames, a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_method(recv_val, name, arg_vals)
            }
            Expr::New(class_name) => self.instantiate(frames, class_name),
            Expr::ArrayInit(items) | Expr::BraceInit(items) => {
                let values = items
                    .iter()
                    .map(|e| self.eval_expr(frames, e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(values))
            }
        }
    }

    fn lookup(&self, frames: &CallFrames, name: &str) -> Result<Value, RuntimeError> {
        frames
            .lookup(name)
            .or_else(|| self.globals.get(name))
            .ok_or_else(|| RuntimeError::UndeclaredIdentifier(name.to_string()))
    }

    fn eval_call(&self, frames: &mut CallFrames, name: &str, args: &[Expr]) -> Result<Value, RuntimeError> {
        // `input(...)` used as a general expression (not the right-hand side
        // of an assignment) has no declared target type to coerce against;
        // it yields the raw string, matching the permissive fallback
        // `target_type` already uses for an unbound target.
        if name == "input" {
            let prompt = match args.first() {
                Some(expr) => Some(self.eval_expr(frames, expr)?.display_string()),
                None => None,
            };
            let raw = self.input.read_line(prompt.as_deref())?;
            return Ok(Value::String(raw));
        }
        let arg_vals = args
            .iter()
            .map(|a| self.eval_expr(frames, a))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(builtin) = eval_builtin(name, &arg_vals)? {
            return Ok(builtin);
        }
        self.call_function(name, arg_vals)
    }

    /// Invokes a free function: evaluates have already happened
    /// left-to-right at the call site; this pushes a fresh frame, binds
    /// parameters, runs the body, and unwinds `return` into the result.
    fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let func = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndeclaredIdentifier(name.to_string()))?;
        self.invoke(&func, None, args)
    }

    fn call_method(&self, receiver: Value, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match receiver {
            Value::Channel(handle) => match name {
                "send" => {
                    handle.send(args);
                    Ok(Value::Unset)
                }
                "receive" => {
                    let values = handle.receive();
                    Ok(Value::Array(values))
                }
                other => Err(RuntimeError::InvalidOperation(format!(
                    "unknown channel operation '{other}'"
                ))),
            },
            Value::Object(obj) => {
                let class_name = obj.lock().expect("object lock poisoned").class_name.clone();
                let method = self
                    .lookup_method(&class_name, name)
                    .ok_or_else(|| RuntimeError::InvalidOperation(format!("class '{class_name}' has no method '{name}'")))?;
                self.invoke(&method, Some(Value::Object(obj)), args)
            }
            other => Err(RuntimeError::InvalidOperation(format!(
                "cannot call method '{name}' on {}",
                other.display_string()
            ))),
        }
    }

    fn lookup_method(&self, class_name: &str, method_name: &str) -> Option<Arc<FunctionDecl>> {
        let mut current = Some(class_name.to_string());
        let mut guard = 0;
        while let Some(name) = current {
            guard += 1;
            if guard > 256 {
                return None;
            }
            let info = self.classes.get(&name)?;
            if let Some(method) = info.methods.get(method_name) {
                return Some(Arc::clone(method));
            }
            current = info.parent.clone();
        }
        None
    }

    fn invoke(&self, func: &FunctionDecl, this: Option<Value>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut frames = CallFrames::new();
        frames.push();
        if let Some(this) = this {
            frames.declare_local("this", this);
        }
        for (param, value) in func.params.iter().zip(args.into_iter()) {
            frames.declare_local(param.name.clone(), value);
        }
        let flow = self.exec_block(&mut frames, &func.body)?;
        frames.pop();
        Ok(match flow {
            Flow::Return(v) => v,
            Flow::Normal => Value::Unset,
        })
    }

    fn instantiate(&self, frames: &mut CallFrames, class_name: &str) -> Result<Value, RuntimeError> {
        let mut chain = Vec::new();
        let mut current = Some(class_name.to_string());
        let mut guard = 0;
        while let Some(name) = current {
            guard += 1;
            if guard > 256 {
                return Err(RuntimeError::UnknownClass(class_name.to_string()));
            }
            let info = self
                .classes
                .get(&name)
                .ok_or_else(|| RuntimeError::UnknownClass(name.clone()))?;
            chain.push(info.clone());
            current = info.parent.clone();
        }
        // Root ancestor first so a derived class's own attribute of the
        // same name as a parent's wins, matching declaration order.
        chain.reverse();

        let mut attributes = HashMap::new();
        for info in &chain {
            for attr in &info.attributes {
                let value = if attr.shape.is_empty() {
                    Value::zero_for(&attr.ty)
                } else {
                    let dims = attr
                        .shape
                        .iter()
                        .map(|e| self.eval_expr(frames, e).and_then(as_index))
                        .collect::<Result<Vec<_>, _>>()?;
                    build_array(&attr.ty, &dims)
                };
                attributes.insert(attr.name.clone(), value);
            }
        }
        Ok(Value::Object(Arc::new(Mutex::new(ObjectInstance {
            class_name: class_name.to_string(),
            attributes,
        }))))
    }
}

fn class_info(class: &ClassDecl) -> ClassInfo {
    ClassInfo {
        parent: class.parent.clone(),
        attributes: class.attributes.clone(),
        methods: class
            .methods
            .iter()
            .map(|m| (m.name.clone(), Arc::new(m.clone())))
            .collect(),
    }
}

/// An accessor step with its index/attribute operands already evaluated,
/// so the mutable-path walk in [`apply_path_mut`] never needs to re-enter
/// expression evaluation while holding a `&mut Value`.
enum ResolvedAccessor {
    Attribute(String),
    Index(Vec<i64>),
}

fn apply_path_mut(current: &mut Value, path: &[ResolvedAccessor], new_value: Value) -> Result<(), RuntimeError> {
    let Some((step, rest)) = path.split_first() else {
        *current = new_value;
        return Ok(());
    };
    match step {
        ResolvedAccessor::Attribute(name) => match current {
            Value::Object(obj) => {
                let mut guard = obj.lock().expect("object lock poisoned");
                let slot = guard.attributes.entry(name.clone()).or_insert(Value::Unset);
                apply_path_mut(slot, rest, new_value)
            }
            other => Err(RuntimeError::InvalidOperation(format!(
                "cannot access attribute '{name}' on {}",
                other.display_string()
            ))),
        },
        ResolvedAccessor::Index(idxs) => match current {
            Value::Array(items) => {
                let mut idx_iter = idxs.iter();
                let i0 = *idx_iter.next().expect("Index accessor always has >=1 index");
                let slot = index_mut(items, i0)?;
                if let Some(&i1) = idx_iter.next() {
                    match slot {
                        Value::Array(inner) => {
                            let slot2 = index_mut(inner, i1)?;
                            apply_path_mut(slot2, rest, new_value)
                        }
                        other => Err(RuntimeError::InvalidOperation(format!(
                            "expected a nested array, got {}",
                            other.display_string()
                        ))),
                    }
                } else {
                    apply_path_mut(slot, rest, new_value)
                }
            }
            other => Err(RuntimeError::InvalidOperation(format!(
                "cannot index into {}",
                other.display_string()
            ))),
        },
    }
}

fn index_mut(items: &mut [Value], index: i64) -> Result<&mut Value, RuntimeError> {
    if index < 0 || index as usize >= items.len() {
        return Err(RuntimeError::IndexOutOfBounds {
            index,
            len: items.len(),
        });
    }
    Ok(&mut items[index as usize])
}

fn index_into(base: &Value, idxs: &[i64]) -> Result<Value, RuntimeError> {
    let mut current = base.clone();
    for &idx in idxs {
        current = match current {
            Value::Array(items) => {
                if idx < 0 || idx as usize >= items.len() {
                    return Err(RuntimeError::IndexOutOfBounds {
                        index: idx,
                        len: items.len(),
                    });
                }
                items[idx as usize].clone()
            }
            other => {
                return Err(RuntimeError::InvalidOperation(format!(
                    "cannot index into {}",
                    other.display_string()
                )))
            }
        };
    }
    Ok(current)
}

fn attribute_of(base: &Value, name: &str) -> Result<Value, RuntimeError> {
    match base {
        Value::Object(obj) => {
            let guard = obj.lock().expect("object lock poisoned");
            guard
                .attributes
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::InvalidOperation(format!("no attribute '{name}' on object")))
        }
        other => Err(RuntimeError::InvalidOperation(format!(
            "cannot access attribute '{name}' on {}",
            other.display_string()
        ))),
    }
}

fn as_index(value: Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Integer(n) => Ok(n),
        Value::Float(f) => Ok(f as i64),
        other => Err(RuntimeError::InvalidOperation(format!(
            "expected an integer index, got {}",
            other.display_string()
        ))),
    }
}

/// Parses a lexeme preserved verbatim by the lexer: integer unless it
/// contains a `.`, per spec §4.1's int-vs-float disambiguation rule.
fn parse_number(lexeme: &str) -> Value {
    if lexeme.contains('.') {
        Value::Float(lexeme.parse().unwrap_or(0.0))
    } else {
        Value::Integer(lexeme.parse().unwrap_or(0))
    }
}

fn eval_binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Add => {
            if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
                return Ok(Value::String(format!("{}{}", lhs.display_string(), rhs.display_string())));
            }
            numeric_op(lhs, rhs, |a, b| a + b, |a, b| a.wrapping_add(b))
        }
        BinOp::Sub => numeric_op(lhs, rhs, |a, b| a - b, |a, b| a.wrapping_sub(b)),
        BinOp::Mul => numeric_op(lhs, rhs, |a, b| a * b, |a, b| a.wrapping_mul(b)),
        BinOp::Div => {
            if is_zero(&rhs) {
                return Err(RuntimeError::DivisionByZero);
            }
            if lhs.is_float() || rhs.is_float() {
                let a = lhs.as_f64().ok_or_else(|| non_numeric(&lhs))?;
                let b = rhs.as_f64().ok_or_else(|| non_numeric(&rhs))?;
                Ok(Value::Float(a / b))
            } else {
                let (a, b) = (as_int(&lhs)?, as_int(&rhs)?);
                Ok(Value::Integer(floor_div(a, b)))
            }
        }
        BinOp::Mod => {
            if is_zero(&rhs) {
                return Err(RuntimeError::DivisionByZero);
            }
            if lhs.is_float() || rhs.is_float() {
                let a = lhs.as_f64().ok_or_else(|| non_numeric(&lhs))?;
                let b = rhs.as_f64().ok_or_else(|| non_numeric(&rhs))?;
                Ok(Value::Float(a.rem_euclid(b)))
            } else {
                let (a, b) = (as_int(&lhs)?, as_int(&rhs)?);
                Ok(Value::Integer(floor_mod(a, b)))
            }
        }
        BinOp::Eq => Ok(Value::Boolean(lhs == rhs)),
        BinOp::NotEq => Ok(Value::Boolean(lhs != rhs)),
        BinOp::Lt => compare(lhs, rhs, |o| o == std::cmp::Ordering::Less),
        BinOp::Gt => compare(lhs, rhs, |o| o == std::cmp::Ordering::Greater),
        BinOp::LtEq => compare(lhs, rhs, |o| o != std::cmp::Ordering::Greater),
        BinOp::GtEq => compare(lhs, rhs, |o| o != std::cmp::Ordering::Less),
        BinOp::And => Ok(Value::Boolean(lhs.is_truthy() && rhs.is_truthy())),
        BinOp::Or => Ok(Value::Boolean(lhs.is_truthy() || rhs.is_truthy())),
    }
}

fn non_numeric(v: &Value) -> RuntimeError {
    RuntimeError::InvalidOperation(format!("expected a number, got {}", v.display_string()))
}

fn is_zero(v: &Value) -> bool {
    matches!(v, Value::Integer(0)) || matches!(v, Value::Float(f) if *f == 0.0)
}

/// Python-style floor division (`left // right`): the truncated quotient,
/// adjusted down by one whenever there's a nonzero remainder whose sign
/// differs from the divisor's. Rust's `/` truncates toward zero, which
/// disagrees with this for mixed-sign operands (`7 / -2` is `-3` truncated
/// but `-4` floored).
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Python-style floor modulo (`left % right`), the remainder consistent
/// with [`floor_div`]: always carries the divisor's sign.
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

fn as_int(v: &Value) -> Result<i64, RuntimeError> {
    match v {
        Value::Integer(n) => Ok(*n),
        Value::Float(f) => Ok(*f as i64),
        other => Err(non_numeric(other)),
    }
}

fn numeric_op(
    lhs: Value,
    rhs: Value,
    float_op: impl Fn(f64, f64) -> f64,
    int_op: impl Fn(i64, i64) -> i64,
) -> Result<Value, RuntimeError> {
    if lhs.is_float() || rhs.is_float() {
        let a = lhs.as_f64().ok_or_else(|| non_numeric(&lhs))?;
        let b = rhs.as_f64().ok_or_else(|| non_numeric(&rhs))?;
        Ok(Value::Float(float_op(a, b)))
    } else {
        let a = as_int(&lhs)?;
        let b = as_int(&rhs)?;
        Ok(Value::Integer(int_op(a, b)))
    }
}

fn compare(lhs: Value, rhs: Value, matches_ordering: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, RuntimeError> {
    if let (Value::String(a), Value::String(b)) = (&lhs, &rhs) {
        return Ok(Value::Boolean(matches_ordering(a.cmp(b))));
    }
    let a = lhs.as_f64().ok_or_else(|| non_numeric(&lhs))?;
    let b = rhs.as_f64().ok_or_else(|| non_numeric(&rhs))?;
    Ok(Value::Boolean(matches_ordering(a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal))))
}

fn eval_unary(op: UnOp, value: Value) -> Result<Value, RuntimeError> {
    match op {
        UnOp::Neg => match value {
            Value::Integer(n) => Ok(Value::Integer(-n)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(non_numeric(&other)),
        },
        UnOp::Not => Ok(Value::Boolean(!value.is_truthy())),
    }
}

/// Dispatches spec §4.6's string built-ins, executed directly rather than
/// looked up in the function table. Returns `None` for names that aren't
/// built-ins, so the caller falls through to user function lookup.
fn eval_builtin(name: &str, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
    let as_str = |v: &Value| -> String { v.display_string() };
    Ok(match name {
        "strlen" if args.len() == 1 => Some(Value::Integer(builtins::strlen(&as_str(&args[0])))),
        "substr" if args.len() == 3 => Some(Value::String(builtins::substr(
            &as_str(&args[0]),
            as_int(&args[1])?,
            as_int(&args[2])?,
        ))),
        "charat" if args.len() == 2 => Some(Value::String(builtins::charat(&as_str(&args[0]), as_int(&args[1])?))),
        "indexof" if args.len() == 2 || args.len() == 3 => {
            let from = if args.len() == 3 { as_int(&args[2])? } else { 0 };
            Some(Value::Integer(builtins::indexof(&as_str(&args[0]), &as_str(&args[1]), from)))
        }
        "parseint" if args.len() == 1 => Some(Value::Integer(builtins::parseint(&as_str(&args[0])))),
        _ => None,
    })
}

/// Expands the two-character sequences `\n` and `\t`, and only those,
/// inside `print`'s string argument (spec §4.5/§9: "only `\n` and `\t` are
/// expanded, and only inside `print`").
fn expand_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                }
                Some('t') => {
                    out.push('\t');
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn build_array(ty: &TypeName, dims: &[i64]) -> Value {
    match dims.split_first() {
        None => Value::zero_for(ty),
        Some((&first, rest)) => {
            let len = first.max(0) as usize;
            Value::Array((0..len).map(|_| build_array(ty, rest)).collect())
        }
    }
}

/// Coerces an `input()` result string to the declared type of the target
/// variable, per spec §4.5's rules. `target_type` of `None` (type unknown,
/// e.g. a fresh binding) passes the string through unchanged.
fn coerce_input(raw: &str, target_type: Option<&TypeName>) -> Result<Value, RuntimeError> {
    match target_type {
        None | Some(TypeName::String) => Ok(Value::String(raw.to_string())),
        Some(TypeName::Int) => {
            let trimmed = raw.trim();
            if is_int_literal(trimmed) {
                Ok(Value::Integer(trimmed.parse().unwrap_or(0)))
            } else {
                Err(RuntimeError::InputCoercion {
                    value: raw.to_string(),
                    target_type: "int".to_string(),
                })
            }
        }
        Some(TypeName::Float) => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| RuntimeError::InputCoercion {
                value: raw.to_string(),
                target_type: "float".to_string(),
            }),
        Some(TypeName::Bool) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "verdadeiro" | "sim" => Ok(Value::Boolean(true)),
            "false" | "0" | "no" | "não" | "nao" | "falso" => Ok(Value::Boolean(false)),
            _ => Err(RuntimeError::InputCoercion {
                value: raw.to_string(),
                target_type: "bool".to_string(),
            }),
        },
        Some(TypeName::Void | TypeName::CChannel | TypeName::Class(_)) => Ok(Value::String(raw.to_string())),
    }
}

fn is_int_literal(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{lexer, parser};

    fn run_source(source: &str) -> (String, ExecResult) {
        let tokens = lexer::tokenize(source);
        let program = parser::parse(&tokens).expect("parse failed");
        let sink = Arc::new(crate::runtime::input::BufferSink::new());
        let config = RunConfig {
            input_provider: Arc::new(crate::runtime::input::DirectInputProvider::new(Vec::new())),
            output_sink: sink.clone(),
            channel_config: ChannelConfig::default(),
        };
        let (interp, blocks) = Interp::build(&program, config);
        let result = interp.run_preamble(&program).and_then(|()| interp.run(&blocks));
        (sink.contents(), result)
    }

    #[test]
    fn hello_world() {
        let (out, result) = run_source(r#"SEQ { print("Hello, World!\n"); }"#);
        assert!(result.is_ok());
        assert_eq!(out, "Hello, World!\n");
    }

    #[test]
    fn arithmetic_widening_to_float() {
        let (out, result) = run_source("SEQ { INT a; FLOAT b; a=3; b=2.5; print(a+b); }");
        assert!(result.is_ok());
        assert_eq!(out, "5.5");
    }

    #[test]
    fn loop_accumulator() {
        let (out, result) = run_source(
            "SEQ { INT s; INT i; s=0;\n  for i=1; i<=5; i=i+1 { s=s+i; }\n  print(s);\n}",
        );
        assert!(result.is_ok());
        assert_eq!(out, "15");
    }

    #[test]
    fn class_inheritance_dispatch() {
        let source = "class A { INT x; VOID setX(INT v) { this.x = v; } }\n\
             class B extends A { INT twice() { return this.x + this.x; } }\n\
             SEQ { B b; b = new B(); b.setX(21); print(b.twice()); }";
        let (out, result) = run_source(source);
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(out, "42");
    }

    #[test]
    fn channel_rendezvous_in_par_block() {
        let source = "c_channel ch;\n\
             VOID prod() { ch.send(7); ch.send(8); }\n\
             VOID cons() { INT x; INT y; ch.receive(x); ch.receive(y); print(x+y); }\n\
             SEQ { PAR { prod(); cons(); } }";
        let (out, result) = run_source(source);
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(out, "15");
    }

    #[test]
    fn division_by_literal_zero_is_caught_by_semantic_layer_but_runtime_div_is_floor() {
        let (out, result) = run_source("SEQ { INT a; a = 7/2; print(a); }");
        assert!(result.is_ok());
        assert_eq!(out, "3");
    }

    #[test]
    fn array_element_assignment_persists() {
        let (out, result) = run_source("SEQ { INT arr[3]; arr[1] = 9; print(arr[1]); }");
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(out, "9");
    }
}
