//! Nested-scope name environment used by the semantic analyzer.
//!
//! Grounded in `SymbolTable.py`'s `Scope`/`SymbolTable` pair: a `Scope`
//! chain with recursive lookup, collapsed here into a `Vec<Scope>` stack
//! instead of parent pointers since the analyzer visits in a strict
//! push/pop discipline and never needs to keep a scope alive after popping.

use crate::middleend::types::SemType;
use std::collections::HashMap;

/// A declaration recorded in the symbol table: everything the analyzer
/// needs to type-check later references to this name.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// The declared name.
    pub name: String,
    /// Its semantic type (element type if an array).
    pub ty: SemType,
    /// Scope nesting depth at declaration.
    pub scope_level: usize,
    /// Whether this declares a free function.
    pub is_function: bool,
    /// Whether this declares a class.
    pub is_class: bool,
    /// Parameter types, for functions/methods.
    pub parameters: Vec<SemType>,
    /// Declared return type, for functions/methods.
    pub return_type: Option<SemType>,
    /// Constant declared sizes per array dimension, when known at parse
    /// time (`None` for a dimension sized by a non-constant expression).
    /// Empty for scalars.
    pub array_sizes: Vec<Option<i64>>,
    /// Set once a later pass confirms the symbol was read.
    pub used: bool,
}

impl Symbol {
    /// A plain variable/channel symbol.
    #[must_use]
    pub fn variable(name: impl Into<String>, ty: SemType, scope_level: usize) -> Self {
        Self {
            name: name.into(),
            ty,
            scope_level,
            is_function: false,
            is_class: false,
            parameters: Vec::new(),
            return_type: None,
            array_sizes: Vec::new(),
            used: false,
        }
    }

    /// Attaches known constant array dimension sizes to a variable symbol.
    #[must_use]
    pub fn with_array_sizes(mut self, sizes: Vec<Option<i64>>) -> Self {
        self.array_sizes = sizes;
        self
    }

    /// A function or method symbol.
    #[must_use]
    pub fn function(
        name: impl Into<String>,
        parameters: Vec<SemType>,
        return_type: SemType,
        scope_level: usize,
    ) -> Self {
        Self {
            name: name.into(),
            ty: SemType::Void,
            scope_level,
            is_function: true,
            is_class: false,
            parameters,
            return_type: Some(return_type),
            array_sizes: Vec::new(),
            used: false,
        }
    }

    /// A class symbol.
    #[must_use]
    pub fn class(name: impl Into<String>, scope_level: usize) -> Self {
        Self {
            name: name.into(),
            ty: SemType::Void,
            scope_level,
            is_function: false,
            is_class: true,
            parameters: Vec::new(),
            return_type: None,
            array_sizes: Vec::new(),
            used: false,
        }
    }
}

/// One lexical scope: a flat name-to-symbol map.
#[derive(Debug, Default)]
struct Scope {
    symbols: HashMap<String, Symbol>,
}

/// The nested-scope environment the analyzer walks the AST against. The
/// outermost scope (index 0) is the global scope.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Creates a table with just the global scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Current nesting depth (0 = global).
    #[must_use]
    pub fn scope_level(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Pushes a fresh, empty scope (function/method body entry, or a
    /// `seq`/`par` block during analysis).
    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pops the innermost scope. No-op at the global scope, matching the
    /// source's defensive `exit_scope`.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declares `symbol` in the current (innermost) scope. Returns `false`
    /// if a symbol by that name already exists in this exact scope (the
    /// analyzer turns that into a duplicate-declaration diagnostic, not a
    /// panic).
    pub fn define(&mut self, symbol: Symbol) -> bool {
        let scope = self.scopes.last_mut().expect("at least one scope");
        if scope.symbols.contains_key(&symbol.name) {
            return false;
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
        true
    }

    /// Looks up `name` in the current scope only.
    #[must_use]
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes.last().and_then(|s| s.symbols.get(name))
    }

    /// Looks up `name` starting at the innermost scope and walking
    /// outward to the global scope.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    /// Marks `name` used if it resolves, searching innermost-out.
    pub fn mark_used(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(sym) = scope.symbols.get_mut(name) {
                sym.used = true;
                return;
            }
        }
    }

    /// All symbols declared directly in the global scope, for the
    /// symbol-table export (spec §6).
    #[must_use]
    pub fn globals(&self) -> impl Iterator<Item = &Symbol> {
        self.scopes[0].symbols.values()
    }

    /// Every symbol declared in the current (innermost) scope, used to find
    /// declared-but-unused locals when a function/method body finishes.
    #[must_use]
    pub fn current_scope_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.scopes
            .last()
            .into_iter()
            .flat_map(|scope| scope.symbols.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_across_scopes_is_permitted() {
        let mut table = SymbolTable::new();
        table.define(Symbol::variable("x", SemType::Int, 0));
        table.enter_scope();
        table.define(Symbol::variable("x", SemType::String, 1));
        assert_eq!(table.lookup("x").unwrap().ty, SemType::String);
        table.exit_scope();
        assert_eq!(table.lookup("x").unwrap().ty, SemType::Int);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        assert!(table.define(Symbol::variable("x", SemType::Int, 0)));
        assert!(!table.define(Symbol::variable("x", SemType::Int, 0)));
    }
}
