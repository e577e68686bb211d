//! Identifier and call resolution, and the end-of-class drain of the
//! pending queue.
//!
//! An occurrence is classified as one of:
//! - unqualified and visible in the lexical chain: resolved on the spot
//! - unqualified and not visible: queued against the current class
//! - `A.b` with `A` the current class: resolved against the class scope
//! - `a.b` with `a` a variable of class `T`: resolved if `T` is the current
//!   class, queued against `T` otherwise
//! - `A.b` with `A` anything else: queued against class `A`
//!
//! Queued references to the current class are settled in [`finalize`]; the
//! instructions that depend on them are emitted as holes and filled there.
//! Calls into other classes are kept as unresolved for a later link step.
//!
//! [`finalize`]: CompilationEngine::finalize

use std::io::Write;

use crate::lexer::Token;
use crate::symbols::{IdentifierRef, Symbol, SymbolKind, Usage};
use crate::types::Type;
use crate::vm::{Segment, VmCommand};

use super::engine::{CompilationEngine, CompileResult, Fill, Hole};

/// A variable operand as far as it is known where it is used.
#[derive(Debug, Clone)]
pub(crate) enum Variable {
    Resolved(Symbol),
    /// Declared further down the class; indexes the pending queue.
    Deferred(usize),
}

impl Variable {
    pub(crate) fn ty(&self) -> Type {
        match self {
            Variable::Resolved(symbol) => symbol.ty.clone(),
            Variable::Deferred(_) => Type::Unknown,
        }
    }
}

impl<'a, W: Write> CompilationEngine<'a, W> {
    // ===== Variables =====

    /// Resolve an unqualified name used as a variable.
    ///
    /// Names not visible yet are queued and come back as
    /// [`Variable::Deferred`]. `check_init` is false for assignment targets.
    pub(crate) fn resolve_variable(&mut self, name: &Token, check_init: bool) -> Option<Variable> {
        let scope = self.current_scope();
        match self.symbols.lookup_lexical(scope, &name.lexeme).cloned() {
            Some(symbol) if symbol.kind.is_variable() => self
                .check_variable_access(&symbol, name.line, check_init)
                .then_some(Variable::Resolved(symbol)),
            Some(symbol) => {
                self.semantic_error(
                    format!("{} '{}' cannot be used as a value", symbol.kind, symbol.name),
                    name.line,
                );
                None
            }
            None => {
                let caller = self.caller_kind();
                let index = self.defer(IdentifierRef::new(
                    None,
                    self.class_name.clone(),
                    name.lexeme.clone(),
                    name.line,
                    Usage::Value { caller },
                ));
                Some(Variable::Deferred(index))
            }
        }
    }

    /// Push `qualifier.member` used as a value and return its type.
    pub(crate) fn compile_member_read(&mut self, qualifier: &Token, member: &Token) -> Type {
        if qualifier.lexeme == self.class_name {
            return match self.symbols.lookup_global(&member.lexeme).cloned() {
                Some(symbol) if symbol.kind.is_variable() => {
                    if !self.check_variable_access(&symbol, member.line, true) {
                        return Type::Unknown;
                    }
                    self.push_variable(&Variable::Resolved(symbol.clone()));
                    symbol.ty
                }
                Some(symbol) => {
                    self.semantic_error(
                        format!("{} '{}' cannot be used as a value", symbol.kind, symbol.name),
                        member.line,
                    );
                    Type::Unknown
                }
                None => {
                    self.semantic_error(
                        format!(
                            "Identifier '{}.{}' is used without being declared",
                            qualifier.lexeme, member.lexeme
                        ),
                        member.line,
                    );
                    Type::Unknown
                }
            };
        }

        let scope = self.current_scope();
        match self.symbols.lookup_lexical(scope, &qualifier.lexeme).cloned() {
            Some(object) if object.kind.is_variable() => {
                self.compile_object_member(object, qualifier, member)
            }
            Some(other) => {
                self.semantic_error(
                    format!("{} '{}' is not an object", other.kind, other.name),
                    qualifier.line,
                );
                Type::Unknown
            }
            None => {
                let caller = self.caller_kind();
                self.defer(IdentifierRef::new(
                    Some(qualifier.lexeme.clone()),
                    qualifier.lexeme.clone(),
                    member.lexeme.clone(),
                    member.line,
                    Usage::Value { caller },
                ));
                Type::Unknown
            }
        }
    }

    /// `p.b` with `p` a variable: the member is read through the object.
    fn compile_object_member(&mut self, object: Symbol, qualifier: &Token, member: &Token) -> Type {
        if !self.check_variable_access(&object, qualifier.line, true) {
            return Type::Unknown;
        }

        let Some(class) = object.ty.class_name().map(str::to_string) else {
            self.semantic_error(
                format!("'{}' of type '{}' is not an object", object.name, object.ty),
                qualifier.line,
            );
            return Type::Unknown;
        };

        let target = if class == self.class_name {
            self.symbols.lookup_global(&member.lexeme).cloned()
        } else {
            None
        };

        match target {
            Some(symbol) if symbol.kind.is_variable() => {
                for command in Self::member_commands(&object, &symbol) {
                    self.writer.emit(command);
                }
                symbol.ty
            }
            Some(symbol) => {
                self.semantic_error(
                    format!("{} '{}' cannot be used as a value", symbol.kind, symbol.name),
                    member.line,
                );
                Type::Unknown
            }
            None => {
                let own_class = class == self.class_name;
                let mut reference = IdentifierRef::new(
                    Some(qualifier.lexeme.clone()),
                    class,
                    member.lexeme.clone(),
                    member.line,
                    Usage::Value { caller: self.caller_kind() },
                );
                reference.qualifier_symbol = Some(object.clone());
                let index = self.defer(reference);
                if own_class {
                    self.open_hole(index, Fill::Member(object));
                }
                Type::Unknown
            }
        }
    }

    /// Fields need a bound receiver; locals and fields must be assigned
    /// before they are read. Returns false when the variable is unusable.
    fn check_variable_access(&mut self, symbol: &Symbol, line: usize, check_init: bool) -> bool {
        if symbol.kind == SymbolKind::Field && !self.caller_kind().has_receiver() {
            self.semantic_error(
                format!("Field '{}' cannot be referenced inside a function", symbol.name),
                line,
            );
            return false;
        }

        let tracked = matches!(symbol.kind, SymbolKind::Local | SymbolKind::Field);
        if check_init && tracked && !symbol.initialized {
            self.semantic_error(
                format!("Variable '{}' is used before being initialized", symbol.name),
                line,
            );
        }
        true
    }

    pub(crate) fn push_variable(&mut self, variable: &Variable) {
        match variable {
            Variable::Resolved(symbol) => {
                if let Some(command) = Self::access_command(symbol, false) {
                    self.writer.emit(command);
                }
            }
            Variable::Deferred(index) => self.open_hole(*index, Fill::Push),
        }
    }

    pub(crate) fn pop_variable(&mut self, variable: &Variable) {
        match variable {
            Variable::Resolved(symbol) => {
                if let Some(command) = Self::access_command(symbol, true) {
                    self.writer.emit(command);
                }
            }
            Variable::Deferred(index) => self.open_hole(*index, Fill::Pop),
        }
    }

    fn access_command(symbol: &Symbol, pop: bool) -> Option<VmCommand> {
        let segment = Segment::for_kind(symbol.kind)?;
        Some(if pop {
            VmCommand::Pop(segment, symbol.index)
        } else {
            VmCommand::Push(segment, symbol.index)
        })
    }

    /// Instructions reading `member` through `object`. Statics do not need
    /// the object at all.
    fn member_commands(object: &Symbol, member: &Symbol) -> Vec<VmCommand> {
        if member.kind != SymbolKind::Field {
            return Self::access_command(member, false).into_iter().collect();
        }
        let mut commands: Vec<VmCommand> =
            Self::access_command(object, false).into_iter().collect();
        commands.push(VmCommand::Pop(Segment::Pointer, 1));
        commands.push(VmCommand::Push(Segment::That, member.index));
        commands
    }

    // ===== Calls =====

    /// `call → id [ '.' id ] '(' exprList ')'`, with the name tokens already
    /// consumed. Returns the callee's return type when known.
    pub(crate) fn compile_call(
        &mut self,
        qualifier: Option<Token>,
        member: Token,
    ) -> CompileResult<Type> {
        let caller = self.caller_kind();

        let Some(qualifier) = qualifier else {
            return self.compile_own_call(None, member, caller);
        };
        if qualifier.lexeme == self.class_name {
            return self.compile_own_call(Some(qualifier), member, caller);
        }

        let scope = self.current_scope();
        match self.symbols.lookup_lexical(scope, &qualifier.lexeme).cloned() {
            Some(variable) if variable.kind.is_variable() => {
                self.compile_object_call(variable, qualifier, member, caller)
            }
            Some(other) => {
                self.semantic_error(
                    format!("{} '{}' is not an object", other.kind, other.name),
                    qualifier.line,
                );
                self.compile_expression_list()?;
                Ok(Type::Unknown)
            }
            None => {
                let name = self.qualified_name(&qualifier.lexeme, &member.lexeme);
                let index = self.defer(IdentifierRef::new(
                    Some(qualifier.lexeme.clone()),
                    qualifier.lexeme,
                    member.lexeme,
                    member.line,
                    Usage::Call { caller },
                ));
                let args = self.compile_expression_list()?;
                self.writer.write_call(name, args.len());
                self.pending[index].arg_types = Some(args);
                Ok(Type::Unknown)
            }
        }
    }

    /// `f(...)` or `Self.f(...)` for the class being compiled.
    fn compile_own_call(
        &mut self,
        qualifier: Option<Token>,
        member: Token,
        caller: SymbolKind,
    ) -> CompileResult<Type> {
        let name = self.qualified_name(&self.class_name, &member.lexeme);
        let target = match qualifier {
            Some(_) => self.symbols.lookup_global(&member.lexeme),
            None => self
                .symbols
                .lookup_lexical(self.current_scope(), &member.lexeme),
        }
        .cloned();

        match target {
            Some(target) if target.kind.is_subroutine() => {
                let receiver = self.check_receiver(&target, caller, member.line)
                    && target.kind == SymbolKind::Method;
                if receiver {
                    self.writer.write_push(Segment::Pointer, 0);
                }

                let args = self.compile_expression_list()?;
                self.check_arguments(&target, &args, member.line);
                self.writer.write_call(name, args.len() + usize::from(receiver));
                Ok(target.ty)
            }
            Some(target) => {
                self.semantic_error(
                    format!("{} '{}' is not a subroutine", target.kind, target.name),
                    member.line,
                );
                self.compile_expression_list()?;
                Ok(Type::Unknown)
            }
            None => {
                // Declared later in the class: the receiver and the call
                // are filled in once the target's kind is known.
                let index = self.defer(IdentifierRef::new(
                    qualifier.map(|q| q.lexeme),
                    self.class_name.clone(),
                    member.lexeme,
                    member.line,
                    Usage::Call { caller },
                ));
                self.open_hole(index, Fill::Receiver);
                let args = self.compile_expression_list()?;
                self.open_hole(
                    index,
                    Fill::Call {
                        name,
                        args: args.len(),
                    },
                );
                self.pending[index].arg_types = Some(args);
                Ok(Type::Unknown)
            }
        }
    }

    /// Methods and constructors need a bound receiver in the caller.
    fn check_receiver(&mut self, target: &Symbol, caller: SymbolKind, line: usize) -> bool {
        if target.kind.has_receiver() && !caller.has_receiver() {
            self.semantic_error(
                format!("A function cannot call {} '{}'", target.kind, target.name),
                line,
            );
            return false;
        }
        true
    }

    /// `var.m(...)`: the variable's value is passed as the receiver.
    fn compile_object_call(
        &mut self,
        variable: Symbol,
        qualifier: Token,
        member: Token,
        caller: SymbolKind,
    ) -> CompileResult<Type> {
        if !self.check_variable_access(&variable, qualifier.line, true) {
            self.compile_expression_list()?;
            return Ok(Type::Unknown);
        }

        let Some(class) = variable.ty.class_name().map(str::to_string) else {
            self.semantic_error(
                format!("'{}' of type '{}' is not an object", variable.name, variable.ty),
                qualifier.line,
            );
            self.compile_expression_list()?;
            return Ok(Type::Unknown);
        };

        self.push_variable(&Variable::Resolved(variable.clone()));
        let name = self.qualified_name(&class, &member.lexeme);

        let target = if class == self.class_name {
            self.symbols.lookup_global(&member.lexeme).cloned()
        } else {
            None
        };

        match target {
            Some(target) if target.kind == SymbolKind::Method => {
                let args = self.compile_expression_list()?;
                self.writer.write_call(name, args.len() + 1);
                self.check_arguments(&target, &args, member.line);
                Ok(target.ty)
            }
            Some(target) => {
                let args = self.compile_expression_list()?;
                self.writer.write_call(name, args.len() + 1);
                self.semantic_error(
                    format!("{} '{}' cannot be called on an object", target.kind, target.name),
                    member.line,
                );
                Ok(Type::Unknown)
            }
            None => {
                let mut reference = IdentifierRef::new(
                    Some(qualifier.lexeme),
                    class,
                    member.lexeme,
                    member.line,
                    Usage::Call { caller },
                );
                reference.qualifier_symbol = Some(variable);
                let index = self.defer(reference);
                let args = self.compile_expression_list()?;
                self.writer.write_call(name, args.len() + 1);
                self.pending[index].arg_types = Some(args);
                Ok(Type::Unknown)
            }
        }
    }

    /// Check a call's arguments against the callee's parameters. The
    /// receiver slot of a method is not a written argument.
    fn check_arguments(&mut self, target: &Symbol, args: &[Type], line: usize) {
        let Some(scope) = target.scope else {
            return;
        };
        let params: Vec<Type> = self
            .symbols
            .argument_types(scope)
            .into_iter()
            .filter(|(index, _)| target.kind != SymbolKind::Method || *index > 0)
            .map(|(_, ty)| ty)
            .collect();

        if params.len() != args.len() {
            self.semantic_error(
                format!(
                    "'{}' expects {} argument(s), found {}",
                    target.name,
                    params.len(),
                    args.len()
                ),
                line,
            );
            return;
        }

        for (position, (arg, param)) in args.iter().zip(&params).enumerate() {
            if !arg.is_assignable_to(param) {
                self.semantic_error(
                    format!(
                        "Argument {} of '{}' expects '{}', found '{}'",
                        position + 1,
                        target.name,
                        param,
                        arg
                    ),
                    line,
                );
            }
        }
    }

    // ===== Pending queue =====

    /// Queue a reference and return its index.
    fn defer(&mut self, reference: IdentifierRef) -> usize {
        tracing::trace!(
            %reference,
            class = %reference.class_name,
            line = reference.line,
            "deferring"
        );
        self.pending.push(reference);
        self.pending.len() - 1
    }

    /// Leave a hole in the body for the pending reference at `reference`.
    fn open_hole(&mut self, reference: usize, fill: Fill) {
        let id = self.holes.len();
        self.holes.push(Hole { reference, fill });
        self.writer.write_hole(id);
    }

    // ===== End of class =====

    /// Drain the pending queue against the completed class scope and
    /// return the instructions for every hole, indexed by hole id.
    pub(crate) fn finalize(&mut self) -> Vec<Vec<VmCommand>> {
        let mut pending = std::mem::take(&mut self.pending);
        tracing::debug!(
            pending = pending.len(),
            holes = self.holes.len(),
            "resolving deferred identifiers"
        );

        for reference in pending.iter_mut() {
            if reference.class_name == self.class_name {
                self.settle(reference);
            } else if matches!(reference.usage, Usage::Value { .. }) {
                self.semantic_error(
                    format!(
                        "Member '{}' of class '{}' is not accessible from class '{}'",
                        reference, reference.class_name, self.class_name
                    ),
                    reference.line,
                );
            }
        }

        let fills: Vec<Vec<VmCommand>> = std::mem::take(&mut self.holes)
            .iter()
            .map(|hole| Self::fill(hole, &pending[hole.reference]))
            .collect();

        for reference in pending {
            if reference.class_name != self.class_name {
                if matches!(reference.usage, Usage::Call { .. }) {
                    tracing::trace!(%reference, class = %reference.class_name, "left unresolved");
                    self.unresolved.push(reference);
                }
            } else if reference.member_symbol.is_some() {
                self.resolved.push(reference);
            }
        }

        tracing::debug!(
            resolved = self.resolved.len(),
            unresolved = self.unresolved.len(),
            "finalized class"
        );
        fills
    }

    /// Check one queued reference to the current class with the rules that
    /// apply to targets known at their use. The member record is attached
    /// only when the reference is valid.
    fn settle(&mut self, reference: &mut IdentifierRef) {
        let Some(symbol) = self.symbols.lookup_global(&reference.member).cloned() else {
            self.semantic_error(
                format!("Identifier '{}' is used without being declared", reference),
                reference.line,
            );
            return;
        };

        match reference.usage {
            Usage::Value { .. } if !symbol.kind.is_variable() => {
                self.semantic_error(
                    format!("{} '{}' cannot be used as a value", symbol.kind, symbol.name),
                    reference.line,
                );
                return;
            }
            Usage::Value { caller } => {
                let unbound = reference.qualifier_symbol.is_none() && !caller.has_receiver();
                if unbound && symbol.kind == SymbolKind::Field {
                    self.semantic_error(
                        format!("Field '{}' cannot be referenced inside a function", symbol.name),
                        reference.line,
                    );
                    return;
                }
            }
            Usage::Call { .. } if !symbol.kind.is_subroutine() => {
                self.semantic_error(
                    format!("{} '{}' is not a subroutine", symbol.kind, symbol.name),
                    reference.line,
                );
                return;
            }
            Usage::Call { caller } => {
                if reference.qualifier_symbol.is_some() {
                    if symbol.kind != SymbolKind::Method {
                        let message = format!(
                            "{} '{}' cannot be called on an object",
                            symbol.kind, symbol.name
                        );
                        self.semantic_error(message, reference.line);
                        return;
                    }
                } else if !self.check_receiver(&symbol, caller, reference.line) {
                    return;
                }
                if let Some(args) = &reference.arg_types {
                    self.check_arguments(&symbol, args, reference.line);
                }
            }
        }

        reference.member_symbol = Some(symbol);
    }

    /// Instructions for one hole. Holes of rejected references stay empty;
    /// the unit fails anyway.
    fn fill(hole: &Hole, reference: &IdentifierRef) -> Vec<VmCommand> {
        let Some(symbol) = &reference.member_symbol else {
            return Vec::new();
        };
        let receiver = symbol.kind == SymbolKind::Method;

        match &hole.fill {
            Fill::Push => Self::access_command(symbol, false).into_iter().collect(),
            Fill::Pop => Self::access_command(symbol, true).into_iter().collect(),
            Fill::Member(object) => Self::member_commands(object, symbol),
            Fill::Receiver if receiver => vec![VmCommand::Push(Segment::Pointer, 0)],
            Fill::Receiver => Vec::new(),
            Fill::Call { name, args } => {
                vec![VmCommand::Call(name.clone(), args + usize::from(receiver))]
            }
        }
    }
}
