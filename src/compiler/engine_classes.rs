//! Class-level productions: the class itself, class variables, subroutines,
//! parameter lists and local variable declarations.

use std::io::Write;

use crate::error::{ParserError, SymbolError};
use crate::lexer::{Keyword, TokenKind};
use crate::symbols::{ScopeId, SymbolKind, SymbolTable};
use crate::types::Type;
use crate::vm::{BufferedLine, Segment, VmCommand};

use super::engine::{CompilationEngine, CompileResult, Fill, HeldSubroutine, SubroutineContext};

impl<'a, W: Write> CompilationEngine<'a, W> {
    /// `class → 'class' id '{' {member} '}'`
    pub(crate) fn compile_class(&mut self) -> CompileResult<()> {
        self.expect_keyword(Keyword::Class)?;
        let name = self.expect_identifier()?;

        let _span = tracing::debug_span!("class", name = %name.lexeme).entered();
        self.class_name = name.lexeme.clone();
        self.symbols = SymbolTable::new(&name.lexeme);
        self.scopes = vec![self.symbols.root()];

        self.expect_symbol('{')?;
        loop {
            let kind = self.peek()?.kind;
            match kind {
                TokenKind::Keyword(Keyword::Static | Keyword::Field) => self.compile_class_var()?,
                TokenKind::Keyword(Keyword::Constructor | Keyword::Function | Keyword::Method) => {
                    self.compile_subroutine()?
                }
                TokenKind::Symbol('}') => break,
                _ => return Err(self.unexpected("class variable or subroutine declaration")?),
            }
        }
        self.expect_symbol('}')?;

        if self.peek()?.kind != TokenKind::Eof {
            return Err(self.unexpected("end of file after the class body")?);
        }
        Ok(())
    }

    /// `classVar → ('static'|'field') type id {',' id} ';'`
    fn compile_class_var(&mut self) -> CompileResult<()> {
        let kind = match self.advance()?.kind {
            TokenKind::Keyword(Keyword::Static) => SymbolKind::Static,
            _ => SymbolKind::Field,
        };
        let ty = self.expect_type(false)?;

        loop {
            let name = self.expect_identifier()?;
            let assigned = self.assigned_before_declaration(&name.lexeme);
            self.declare(&name.lexeme, ty.clone(), kind, assigned, name.line);
            if !self.match_symbol(',')? {
                break;
            }
        }
        self.expect_symbol(';')?;
        Ok(())
    }

    /// Whether an earlier subroutine already stores into `name` through a
    /// hole waiting for this declaration.
    fn assigned_before_declaration(&self, name: &str) -> bool {
        self.holes.iter().any(|hole| {
            let reference = &self.pending[hole.reference];
            matches!(hole.fill, Fill::Pop)
                && reference.qualifier.is_none()
                && reference.member == name
        })
    }

    /// `subroutine → ('constructor'|'function'|'method') (type|'void') id
    ///  '(' params ')' '{' {statement} '}'`
    fn compile_subroutine(&mut self) -> CompileResult<()> {
        let kind = match self.advance()?.kind {
            TokenKind::Keyword(Keyword::Constructor) => SymbolKind::Constructor,
            TokenKind::Keyword(Keyword::Method) => SymbolKind::Method,
            _ => SymbolKind::Function,
        };
        let return_type = self.expect_type(true)?;
        let name = self.expect_identifier()?;

        let _span = tracing::debug_span!("subroutine", name = %name.lexeme, %kind).entered();
        let body_scope =
            self.declare_subroutine(&name.lexeme, return_type.clone(), kind, name.line)?;
        self.push_scope(body_scope);

        if kind == SymbolKind::Method {
            // Argument 0 is the receiver. `this` is reserved, so no
            // parameter can collide with it.
            let receiver = Type::Class(self.class_name.clone());
            self.declare("this", receiver, SymbolKind::Argument, true, name.line);
        }

        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;

        self.subroutine = Some(SubroutineContext {
            name: name.lexeme.clone(),
            kind,
            return_type: return_type.clone(),
        });

        self.expect_symbol('{')?;
        let returns = self.compile_statements()?;
        let close = self.expect_symbol('}')?;

        if !return_type.is_void() && !returns {
            self.semantic_error(
                format!("Not all code paths in '{}' return a value", name.lexeme),
                close.line,
            );
        }

        self.hold_subroutine(&name.lexeme, kind, body_scope);

        self.subroutine = None;
        self.pop_scope();
        Ok(())
    }

    /// Take the buffered body out of the writer and keep it until the class
    /// is complete.
    fn hold_subroutine(&mut self, name: &str, kind: SymbolKind, body_scope: ScopeId) {
        let held = HeldSubroutine {
            name: self.qualified_name(&self.class_name, name),
            kind,
            locals: self.symbols.local_count(body_scope),
            body: self.writer.take_buffer(),
        };
        tracing::trace!(name = %held.name, lines = held.body.len(), "holding subroutine");
        self.held.push(held);
    }

    /// Write every held subroutine in declaration order: the header, the
    /// prologue, then the body with its holes filled.
    pub(crate) fn write_class(&mut self, fills: &[Vec<VmCommand>]) -> CompileResult<()> {
        let fields = self.symbols.scope(self.symbols.root()).count(SymbolKind::Field);

        for held in std::mem::take(&mut self.held) {
            let prologue = match held.kind {
                SymbolKind::Constructor => vec![
                    VmCommand::Push(Segment::Constant, fields),
                    VmCommand::Call("Memory.alloc".to_string(), 1),
                    VmCommand::Pop(Segment::Pointer, 0),
                ],
                SymbolKind::Method => vec![
                    VmCommand::Push(Segment::Argument, 0),
                    VmCommand::Pop(Segment::Pointer, 0),
                ],
                _ => Vec::new(),
            };

            self.write_io(|w| {
                w.write_function(&held.name, held.locals)?;
                for command in &prologue {
                    w.write_immediate(command)?;
                }
                for line in held.body {
                    match line {
                        BufferedLine::Command(command) => w.emit(command),
                        BufferedLine::Hole(id) => {
                            for command in fills.get(id).into_iter().flatten() {
                                w.emit(command.clone());
                            }
                        }
                    }
                }
                w.write_now()
            })?;
        }
        Ok(())
    }

    /// `params → [ type id {',' type id} ]`
    fn compile_parameter_list(&mut self) -> CompileResult<()> {
        if self.check_symbol(')')? {
            return Ok(());
        }

        loop {
            let ty = self.expect_type(false)?;
            let name = self.expect_identifier()?;
            self.declare(&name.lexeme, ty, SymbolKind::Argument, true, name.line);
            if !self.match_symbol(',')? {
                break;
            }
        }
        Ok(())
    }

    /// `varDecl → 'var' type id {',' id} ';'`
    ///
    /// Locals always belong to the subroutine scope so their slots stay
    /// unique; a declaration nested in an if/while body is reported.
    pub(crate) fn compile_var_dec(&mut self) -> CompileResult<bool> {
        let var = self.expect_keyword(Keyword::Var)?;
        let ty = self.expect_type(false)?;

        let scope = self.subroutine_scope();
        if scope != self.current_scope() {
            self.semantic_error(
                "Variables must be declared at the top level of a subroutine body",
                var.line,
            );
        }

        loop {
            let name = self.expect_identifier()?;
            self.declare_in(scope, &name.lexeme, ty.clone(), SymbolKind::Local, false, name.line);
            if !self.match_symbol(',')? {
                break;
            }
        }
        self.expect_symbol(';')?;
        Ok(false)
    }

    /// Declare in the current scope; redeclaration is a semantic error.
    fn declare(&mut self, name: &str, ty: Type, kind: SymbolKind, initialized: bool, line: usize) {
        let scope = self.current_scope();
        self.declare_in(scope, name, ty, kind, initialized, line);
    }

    fn declare_in(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Type,
        kind: SymbolKind,
        initialized: bool,
        line: usize,
    ) {
        if let Err(err) = self.symbols.add_symbol(scope, name, ty, kind, initialized) {
            self.semantic_error(err.to_string(), line);
        }
    }

    /// Register a subroutine in the class scope and return its body scope.
    /// A second subroutine with the same name is fatal.
    fn declare_subroutine(
        &mut self,
        name: &str,
        ty: Type,
        kind: SymbolKind,
        line: usize,
    ) -> CompileResult<ScopeId> {
        let root = self.symbols.root();
        match self.symbols.add_symbol(root, name, ty, kind, true) {
            Ok(symbol) => symbol
                .scope
                .ok_or_else(|| ParserError::general("Subroutine has no body scope", line).into()),
            Err(SymbolError::Redeclared(name)) => {
                let message = format!("Redeclaration of subroutine '{}'", name);
                Err(ParserError::general(message, line).into())
            }
        }
    }

    /// The innermost scope owned by a subroutine record.
    fn subroutine_scope(&self) -> ScopeId {
        self.scopes
            .iter()
            .copied()
            .find(|&id| self.symbols.scope(id).kind == crate::symbols::ScopeKind::Subroutine)
            .unwrap_or_else(|| self.current_scope())
    }

    fn write_io(
        &mut self,
        f: impl FnOnce(&mut crate::vm::VmWriter<W>) -> std::io::Result<()>,
    ) -> CompileResult<()> {
        let artifact = self.writer.artifact().map(|p| p.to_path_buf()).unwrap_or_default();
        f(&mut self.writer).map_err(|e| crate::error::CompileError::io(artifact, e))
    }
}
