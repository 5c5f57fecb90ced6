//! The analyzer's type vocabulary and assignability/operator rules.
//!
//! Grounded in `SemanticAnalyzer.py`'s type-compatibility checks, generalized
//! into an explicit sum type rather than the source's ad hoc string
//! comparisons.

use crate::frontend::ast::TypeName;
use std::fmt;

/// A semantic type. Distinct from [`TypeName`] in that it additionally
/// represents array shapes and the analyzer's `object` escape hatch for
/// expressions whose element type couldn't be statically pinned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemType {
    /// `int`
    Int,
    /// `float`
    Float,
    /// `string`
    String,
    /// `bool`
    Bool,
    /// `void`
    Void,
    /// `c_channel`
    Channel,
    /// A user class, by name.
    Class(String),
    /// An array of the given element type.
    Array(Box<SemType>),
    /// Escape hatch for expressions the analyzer can't pin a concrete type
    /// to (e.g. some chained accesses); assignable anywhere with a warning.
    Object,
}

impl SemType {
    /// Converts a declared [`TypeName`] (plus optional array shape arity)
    /// into a `SemType`.
    #[must_use]
    pub fn from_type_name(ty: &TypeName, array_dims: usize) -> Self {
        let base = match ty {
            TypeName::Int => SemType::Int,
            TypeName::Float => SemType::Float,
            TypeName::String => SemType::String,
            TypeName::Bool => SemType::Bool,
            TypeName::Void => SemType::Void,
            TypeName::CChannel => SemType::Channel,
            TypeName::Class(name) => SemType::Class(name.clone()),
        };
        (0..array_dims).fold(base, |acc, _| SemType::Array(Box::new(acc)))
    }

    /// Case-insensitive name comparison, as the analyzer's vocabulary is
    /// specified to be.
    #[must_use]
    pub fn name_eq(&self, other: &SemType) -> bool {
        self == other
    }

    /// Whether this type is one of `int`/`float`.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, SemType::Int | SemType::Float)
    }
}

impl fmt::Display for SemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemType::Int => write!(f, "int"),
            SemType::Float => write!(f, "float"),
            SemType::String => write!(f, "string"),
            SemType::Bool => write!(f, "bool"),
            SemType::Void => write!(f, "void"),
            SemType::Channel => write!(f, "c_channel"),
            SemType::Class(name) => write!(f, "{name}"),
            SemType::Array(elem) => write!(f, "array-of-{elem}"),
            SemType::Object => write!(f, "object"),
        }
    }
}

/// Outcome of an assignability check: allowed outright, allowed with a
/// warning, or disallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    /// `target ← source` is allowed with no diagnostic.
    Allowed,
    /// Allowed, but the analyzer should emit a warning (widening through
    /// `object`, or numeric widening the caller wants surfaced).
    AllowedWithWarning,
    /// Not allowed; a type-mismatch error should be raised.
    Disallowed,
}

/// A class hierarchy view sufficient to decide class covariance, independent
/// of the rest of the symbol table.
pub trait ClassHierarchy {
    /// The immediate parent of `class_name`, if any.
    fn parent_of(&self, class_name: &str) -> Option<&str>;
}

/// Checks `target ← source` per spec §4.3's assignability rules.
#[must_use]
pub fn check_assignable(
    target: &SemType,
    source: &SemType,
    hierarchy: &dyn ClassHierarchy,
) -> Assignability {
    if target == source {
        return Assignability::Allowed;
    }
    match (target, source) {
        (SemType::Float, SemType::Int) => Assignability::Allowed,
        (SemType::String, _) => Assignability::Allowed,
        (_, SemType::Object) => Assignability::AllowedWithWarning,
        (SemType::Class(target_name), SemType::Class(source_name)) => {
            if is_subclass_of(source_name, target_name, hierarchy) {
                Assignability::Allowed
            } else {
                Assignability::Disallowed
            }
        }
        (SemType::Array(target_elem), SemType::Array(source_elem)) => {
            check_assignable(target_elem, source_elem, hierarchy)
        }
        _ => Assignability::Disallowed,
    }
}

/// Walks the parent chain from `descendant` looking for `ancestor`,
/// following spec §9's single-inheritance, no-cycle assumption.
fn is_subclass_of(descendant: &str, ancestor: &str, hierarchy: &dyn ClassHierarchy) -> bool {
    let mut current = descendant;
    let mut guard = 0;
    loop {
        if current == ancestor {
            return true;
        }
        guard += 1;
        if guard > 256 {
            return false;
        }
        match hierarchy.parent_of(current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// The static result type of a binary arithmetic/concatenation operator,
/// per spec §4.3's operator typing rules.
#[must_use]
pub fn arithmetic_result_type(lhs: &SemType, rhs: &SemType) -> SemType {
    if matches!(lhs, SemType::String) || matches!(rhs, SemType::String) {
        return SemType::String;
    }
    if matches!(lhs, SemType::Float) || matches!(rhs, SemType::Float) {
        return SemType::Float;
    }
    SemType::Int
}
