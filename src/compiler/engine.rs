//! The compilation engine: parses, analyzes and emits in a single pass.
//!
//! Grammar functions live in `engine_classes`, `engine_stmts` and
//! `engine_exprs`; identifier and call resolution plus the end-of-class
//! drain of the pending queue live in `engine_calls`.
//!
//! Compiled subroutines are held in memory until the class is complete:
//! instructions that depend on members declared further down are left as
//! holes in the body and filled once the pending queue is drained.

use std::io::Write;
use std::path::Path;

use crate::error::{CompileError, ParserError, SemanticError};
use crate::lexer::{Keyword, Scanner, Token, TokenKind};
use crate::symbols::{IdentifierRef, ScopeId, Symbol, SymbolKind, SymbolTable};
use crate::types::Type;
use crate::vm::{BufferedLine, VmWriter};

/// Result type for grammar functions. Any error is fatal for the unit.
pub type CompileResult<T> = Result<T, CompileError>;

/// The subroutine whose body is being compiled.
#[derive(Debug, Clone)]
pub struct SubroutineContext {
    pub name: String,
    pub kind: SymbolKind,
    pub return_type: Type,
}

/// Everything known about a class after a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledClass {
    pub class_name: String,
    pub symbols: SymbolTable,
    /// References to other classes, left for a later link step.
    pub unresolved: Vec<IdentifierRef>,
    /// Forward references settled at the end of the class, with their
    /// member records filled in.
    pub resolved: Vec<IdentifierRef>,
    /// Instruction lines written to the output.
    pub lines: usize,
}

/// What fills an instruction hole once its pending reference is settled.
#[derive(Debug, Clone)]
pub(crate) enum Fill {
    Push,
    Pop,
    /// Read of a member through the given object variable.
    Member(Symbol),
    /// Receiver of a call; `pointer 0` when the callee is a method.
    Receiver,
    /// The call itself, counting the receiver when one was pushed.
    Call { name: String, args: usize },
}

/// An instruction hole and the pending reference it waits on.
#[derive(Debug, Clone)]
pub(crate) struct Hole {
    /// Index into the pending queue.
    pub reference: usize,
    pub fill: Fill,
}

/// A compiled subroutine waiting for the end of the class.
#[derive(Debug)]
pub(crate) struct HeldSubroutine {
    pub name: String,
    pub kind: SymbolKind,
    pub locals: usize,
    pub body: Vec<BufferedLine>,
}

/// Compiles one class from source text into VM instructions.
pub struct CompilationEngine<'a, W: Write> {
    pub(crate) scanner: Scanner<'a>,
    pub(crate) writer: VmWriter<W>,
    pub(crate) symbols: SymbolTable,
    /// Active scopes, innermost last.
    pub(crate) scopes: Vec<ScopeId>,
    pub(crate) class_name: String,
    pub(crate) subroutine: Option<SubroutineContext>,
    /// Identifiers whose class or member was not known at the point of use.
    pub(crate) pending: Vec<IdentifierRef>,
    pub(crate) unresolved: Vec<IdentifierRef>,
    pub(crate) resolved: Vec<IdentifierRef>,
    /// Holes left in held bodies, by id.
    pub(crate) holes: Vec<Hole>,
    pub(crate) held: Vec<HeldSubroutine>,
    /// Shared by every if/while in the unit; never reset.
    pub(crate) label_counter: usize,
    pub(crate) diagnostics: Vec<SemanticError>,
    /// Latches to false on the first semantic error.
    pub(crate) status: bool,
    /// Line of the most recently consumed token.
    pub(crate) line: usize,
}

impl<'a, W: Write> CompilationEngine<'a, W> {
    pub fn new(source: &'a str, writer: VmWriter<W>) -> Self {
        Self {
            scanner: Scanner::new(source),
            writer,
            symbols: SymbolTable::new(""),
            scopes: Vec::new(),
            class_name: String::new(),
            subroutine: None,
            pending: Vec::new(),
            unresolved: Vec::new(),
            resolved: Vec::new(),
            holes: Vec::new(),
            held: Vec::new(),
            label_counter: 0,
            diagnostics: Vec::new(),
            status: true,
            line: 1,
        }
    }

    /// Compile the unit.
    ///
    /// On a fatal error or when any semantic error was recorded, the output
    /// artifact is discarded and the error is returned. On success the sink
    /// is returned alongside the class summary.
    pub fn compile(mut self) -> Result<(CompiledClass, W), CompileError> {
        let artifact = self.writer.artifact().map(Path::to_path_buf).unwrap_or_default();

        let outcome = self.compile_class().and_then(|()| {
            let fills = self.finalize();
            if self.status {
                self.write_class(&fills)
            } else {
                Ok(())
            }
        });
        if let Err(err) = outcome {
            tracing::debug!(%err, "fatal error, aborting unit");
            self.writer
                .discard_output()
                .map_err(|e| CompileError::io(artifact, e))?;
            return Err(err);
        }

        let Self {
            writer,
            symbols,
            class_name,
            unresolved,
            resolved,
            diagnostics,
            status,
            ..
        } = self;

        if !status {
            writer
                .discard_output()
                .map_err(|e| CompileError::io(artifact, e))?;
            return Err(CompileError::Semantic(diagnostics));
        }

        let lines = writer.lines_written();
        let out = writer.finish().map_err(|e| CompileError::io(artifact, e))?;

        Ok((
            CompiledClass {
                class_name,
                symbols,
                unresolved,
                resolved,
                lines,
            },
            out,
        ))
    }

    // ===== Token manipulation =====

    pub(crate) fn peek(&mut self) -> CompileResult<&Token> {
        Ok(self.scanner.peek_token()?)
    }

    pub(crate) fn peek_line(&mut self) -> CompileResult<usize> {
        Ok(self.peek()?.line)
    }

    pub(crate) fn advance(&mut self) -> CompileResult<Token> {
        let token = self.scanner.next_token()?;
        self.line = token.line;
        Ok(token)
    }

    pub(crate) fn check_symbol(&mut self, c: char) -> CompileResult<bool> {
        Ok(self.peek()?.is_symbol(c))
    }

    pub(crate) fn check_keyword(&mut self, kw: Keyword) -> CompileResult<bool> {
        Ok(self.peek()?.is_keyword(kw))
    }

    pub(crate) fn match_symbol(&mut self, c: char) -> CompileResult<bool> {
        if self.check_symbol(c)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn expect_symbol(&mut self, c: char) -> CompileResult<Token> {
        if self.check_symbol(c)? {
            self.advance()
        } else {
            Err(self.unexpected(format!("'{}'", c))?)
        }
    }

    pub(crate) fn expect_keyword(&mut self, kw: Keyword) -> CompileResult<Token> {
        if self.check_keyword(kw)? {
            self.advance()
        } else {
            Err(self.unexpected(format!("'{}'", kw))?)
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> CompileResult<Token> {
        if self.peek()?.kind == TokenKind::Identifier {
            self.advance()
        } else {
            Err(self.unexpected("identifier")?)
        }
    }

    /// Parse a type: `int`, `char`, `boolean`, a class name, or, when
    /// allowed, `void`.
    pub(crate) fn expect_type(&mut self, allow_void: bool) -> CompileResult<Type> {
        let kind = self.peek()?.kind;
        match kind {
            TokenKind::Keyword(Keyword::Int | Keyword::Char | Keyword::Boolean)
            | TokenKind::Identifier => {
                let token = self.advance()?;
                Ok(Type::from_name(&token.lexeme))
            }
            TokenKind::Keyword(Keyword::Void) if allow_void => {
                self.advance()?;
                Ok(Type::Void)
            }
            _ => Err(self.unexpected("type")?),
        }
    }

    /// Build the fatal error for the token at the front of the stream.
    pub(crate) fn unexpected(
        &mut self,
        expected: impl Into<String>,
    ) -> CompileResult<CompileError> {
        let token = self.peek()?;
        let found = match token.kind {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::StringLiteral => format!("\"{}\"", token.lexeme),
            _ => token.lexeme.clone(),
        };
        Ok(ParserError::unexpected_token(expected, found, token.line).into())
    }

    // ===== Scopes, labels, diagnostics =====

    pub(crate) fn current_scope(&self) -> ScopeId {
        self.scopes.last().copied().unwrap_or_else(|| self.symbols.root())
    }

    pub(crate) fn push_scope(&mut self, scope: ScopeId) {
        tracing::trace!(?scope, depth = self.scopes.len(), "enter scope");
        self.scopes.push(scope);
    }

    pub(crate) fn pop_scope(&mut self) -> Option<ScopeId> {
        let scope = self.scopes.pop();
        tracing::trace!(?scope, depth = self.scopes.len(), "leave scope");
        scope
    }

    pub(crate) fn next_label(&mut self) -> usize {
        let n = self.label_counter;
        self.label_counter += 1;
        n
    }

    /// Kind of the subroutine being compiled; `Function` outside any body.
    pub(crate) fn caller_kind(&self) -> SymbolKind {
        self.subroutine
            .as_ref()
            .map(|s| s.kind)
            .unwrap_or(SymbolKind::Function)
    }

    pub(crate) fn qualified_name(&self, class: &str, member: &str) -> String {
        format!("{}.{}", class, member)
    }

    /// Record a recoverable error and latch the failure flag.
    pub(crate) fn semantic_error(&mut self, message: impl Into<String>, line: usize) {
        let error = SemanticError::new(message, line);
        tracing::debug!(%error, "semantic error");
        self.diagnostics.push(error);
        self.status = false;
    }
}
