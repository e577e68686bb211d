//! Symbol tables, declaration records and identifier references.

pub mod identifier;
pub mod symbol;
pub mod table;

pub use identifier::{IdentifierRef, Usage};
pub use symbol::{Symbol, SymbolKind};
pub use table::{Scope, ScopeId, ScopeKind, SymbolTable};
