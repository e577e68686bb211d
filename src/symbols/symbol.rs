//! Declaration records.

use std::fmt;

use crate::symbols::table::ScopeId;
use crate::types::Type;

/// What a declared name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Static,
    Field,
    Argument,
    Local,
    Function,
    Method,
    Constructor,
}

impl SymbolKind {
    /// Kinds whose record owns a child scope for their body.
    pub fn owns_scope(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor
        )
    }

    pub fn is_subroutine(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor
        )
    }

    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Static | SymbolKind::Field | SymbolKind::Argument | SymbolKind::Local
        )
    }

    /// Subroutines that run with a bound receiver.
    pub fn has_receiver(&self) -> bool {
        matches!(self, SymbolKind::Method | SymbolKind::Constructor)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Static => "static",
            SymbolKind::Field => "field",
            SymbolKind::Argument => "argument",
            SymbolKind::Local => "local",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declaration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub kind: SymbolKind,
    /// Slot within the VM segment for this kind; sequential per scope and kind.
    pub index: usize,
    /// Latches to true on the first assignment and never reverts.
    pub initialized: bool,
    /// Body scope of classes and subroutines.
    pub scope: Option<ScopeId>,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.ty, self.name)?;
        if self.kind.is_variable() {
            write!(f, " #{}", self.index)?;
            if !self.initialized {
                write!(f, " (uninitialized)")?;
            }
        }
        Ok(())
    }
}
