//! Identifier references, resolved or awaiting resolution.

use std::fmt;

use crate::symbols::symbol::{Symbol, SymbolKind};
use crate::types::Type;

/// How a referenced name was used at its site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Usage {
    /// Read or written as a variable from a body of the given kind.
    Value { caller: SymbolKind },
    /// Called as a subroutine from a body of the given kind.
    Call { caller: SymbolKind },
}

/// The outcome of looking up one identifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRef {
    /// Qualifier as written (`A` in `A.b`); `None` when unqualified.
    pub qualifier: Option<String>,
    /// Class the member is looked up in.
    pub class_name: String,
    pub member: String,
    pub line: usize,
    pub usage: Usage,
    /// Record of the member once known.
    pub member_symbol: Option<Symbol>,
    /// Record of the qualifier when it is a variable holding an object.
    pub qualifier_symbol: Option<Symbol>,
    /// Argument types of a call, checked once the target is known.
    pub arg_types: Option<Vec<Type>>,
}

impl IdentifierRef {
    pub fn new(
        qualifier: Option<String>,
        class_name: impl Into<String>,
        member: impl Into<String>,
        line: usize,
        usage: Usage,
    ) -> Self {
        Self {
            qualifier,
            class_name: class_name.into(),
            member: member.into(),
            line,
            usage,
            member_symbol: None,
            qualifier_symbol: None,
            arg_types: None,
        }
    }
}

impl fmt::Display for IdentifierRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.member),
            None => write!(f, "{}", self.member),
        }
    }
}
