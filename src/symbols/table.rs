//! Hierarchical symbol table.
//!
//! Scopes live in an arena owned by [`SymbolTable`] and refer to their parent
//! by [`ScopeId`]. Scope 0 is the class scope; subroutine scopes are owned by
//! their declaration record and outlive the subroutine body so call sites can
//! inspect their parameters. Block scopes are dropped again on exit.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use indexmap::IndexMap;

use crate::error::SymbolError;
use crate::symbols::symbol::{Symbol, SymbolKind};
use crate::types::Type;

/// Handle to a scope in the table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// What construct introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Class,
    Subroutine,
    Block,
}

/// One lexical scope: a name-to-record map and a link to the enclosing scope.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    entries: IndexMap<String, Symbol>,
    counters: HashMap<SymbolKind, usize>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            entries: IndexMap::new(),
            counters: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.values()
    }

    /// Number of entries declared with `kind` in this scope.
    pub fn count(&self, kind: SymbolKind) -> usize {
        self.counters.get(&kind).copied().unwrap_or(0)
    }
}

/// The symbol table of one class.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    class: Symbol,
    scopes: Vec<Scope>,
}

impl SymbolTable {
    /// Create the table for `class_name` with its (empty) class scope.
    pub fn new(class_name: &str) -> Self {
        let root = ScopeId(0);
        Self {
            class: Symbol {
                name: class_name.to_string(),
                ty: Type::Class(class_name.to_string()),
                kind: SymbolKind::Class,
                index: 0,
                initialized: true,
                scope: Some(root),
            },
            scopes: vec![Scope::new(ScopeKind::Class, None)],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Declare `name` in `scope`.
    ///
    /// The record receives the next index for its kind in that scope. Records
    /// of subroutine kinds get a fresh child scope whose parent is `scope`.
    pub fn add_symbol(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Type,
        kind: SymbolKind,
        initialized: bool,
    ) -> Result<&Symbol, SymbolError> {
        if self.scopes[scope.0].entries.contains_key(name) {
            return Err(SymbolError::Redeclared(name.to_string()));
        }

        let child = if kind.owns_scope() {
            let scope_kind = match kind {
                SymbolKind::Class => ScopeKind::Class,
                _ => ScopeKind::Subroutine,
            };
            let id = ScopeId(self.scopes.len());
            self.scopes.push(Scope::new(scope_kind, Some(scope)));
            Some(id)
        } else {
            None
        };

        let target = &mut self.scopes[scope.0];
        let counter = target.counters.entry(kind).or_insert(0);
        let index = *counter;
        *counter += 1;

        tracing::trace!(name, %kind, %ty, index, "declare");
        let symbol = Symbol {
            name: name.to_string(),
            ty,
            kind,
            index,
            initialized,
            scope: child,
        };
        Ok(target.entries.entry(name.to_string()).or_insert(symbol))
    }

    /// Open a block scope nested in `parent`.
    pub fn push_block(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(ScopeKind::Block, Some(parent)));
        id
    }

    /// Discard a block scope. Blocks close in reverse order of opening, so
    /// the block is always the most recently allocated scope.
    pub fn pop_block(&mut self, id: ScopeId) {
        debug_assert_eq!(id.0 + 1, self.scopes.len());
        if self.scopes[id.0].kind == ScopeKind::Block && id.0 + 1 == self.scopes.len() {
            self.scopes.pop();
        }
    }

    /// Immediate-scope containment: declared directly in `scope`.
    pub fn contains_immediate(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].entries.contains_key(name)
    }

    /// Lexical containment: visible from `scope` by walking its parent chain.
    pub fn lookup_lexical(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.find_scope_of(scope, name)
            .and_then(|id| self.scopes[id.0].entries.get(name))
    }

    pub fn contains_lexical(&self, scope: ScopeId, name: &str) -> bool {
        self.lookup_lexical(scope, name).is_some()
    }

    /// Global containment: declared at the top level of the class.
    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.scopes[0].entries.get(name)
    }

    pub fn contains_global(&self, name: &str) -> bool {
        self.lookup_global(name).is_some()
    }

    /// Latch the `initialized` flag of the record `name` visible from `scope`.
    pub fn mark_initialized(&mut self, scope: ScopeId, name: &str) {
        if let Some(id) = self.find_scope_of(scope, name) {
            if let Some(symbol) = self.scopes[id.0].entries.get_mut(name) {
                symbol.initialized = true;
            }
        }
    }

    /// Number of locals declared in a subroutine scope.
    pub fn local_count(&self, scope: ScopeId) -> usize {
        self.scopes[scope.0].count(SymbolKind::Local)
    }

    /// Parameter types of a subroutine scope by argument index.
    pub fn argument_types(&self, scope: ScopeId) -> BTreeMap<usize, Type> {
        self.scopes[scope.0]
            .symbols()
            .filter(|s| s.kind == SymbolKind::Argument)
            .map(|s| (s.index, s.ty.clone()))
            .collect()
    }

    fn find_scope_of(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if s.entries.contains_key(name) {
                return Some(id);
            }
            current = s.parent;
        }
        None
    }

    fn fmt_scope(&self, f: &mut fmt::Formatter<'_>, id: ScopeId, depth: usize) -> fmt::Result {
        for symbol in self.scopes[id.0].symbols() {
            writeln!(f, "{:indent$}{}", "", symbol, indent = depth * 2)?;
            if let Some(child) = symbol.scope {
                self.fmt_scope(f, child, depth + 1)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.class)?;
        self.fmt_scope(f, self.root(), 1)
    }
}
