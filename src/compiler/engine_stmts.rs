//! Statement productions. Each returns whether every path through it ends
//! in a `return`.

use std::io::Write;

use crate::lexer::{Keyword, TokenKind};
use crate::types::Type;
use crate::vm::{ArithmeticOp, Segment};

use super::engine::{CompilationEngine, CompileResult};
use super::engine_calls::Variable;

impl<'a, W: Write> CompilationEngine<'a, W> {
    /// `{statement}` up to the closing brace, which is left in the stream.
    ///
    /// The first statement after one that returns on all paths is reported
    /// as unreachable; later ones in the same block are not reported again.
    pub(crate) fn compile_statements(&mut self) -> CompileResult<bool> {
        let mut returns = false;
        let mut reported = false;

        while !self.check_symbol('}')? {
            let line = self.peek_line()?;
            if returns && !reported {
                self.semantic_error("Unreachable code", line);
                reported = true;
            }
            if self.compile_statement()? {
                returns = true;
            }
        }
        Ok(returns)
    }

    fn compile_statement(&mut self) -> CompileResult<bool> {
        let kind = self.peek()?.kind;
        match kind {
            TokenKind::Keyword(Keyword::Var) => self.compile_var_dec(),
            TokenKind::Keyword(Keyword::Let) => self.compile_let(),
            TokenKind::Keyword(Keyword::If) => self.compile_if(),
            TokenKind::Keyword(Keyword::While) => self.compile_while(),
            TokenKind::Keyword(Keyword::Do) => self.compile_do(),
            TokenKind::Keyword(Keyword::Return) => self.compile_return(),
            _ => Err(self.unexpected("statement")?),
        }
    }

    /// `'{' {statement} '}'` in a fresh block scope.
    fn compile_block(&mut self) -> CompileResult<bool> {
        self.expect_symbol('{')?;

        let block = self.symbols.push_block(self.current_scope());
        self.push_scope(block);
        let returns = self.compile_statements()?;
        self.pop_scope();
        self.symbols.pop_block(block);

        self.expect_symbol('}')?;
        Ok(returns)
    }

    /// `let → 'let' id [ '[' expr ']' ] '=' expr ';'`
    fn compile_let(&mut self) -> CompileResult<bool> {
        self.expect_keyword(Keyword::Let)?;
        let name = self.expect_identifier()?;
        let target = self.resolve_variable(&name, false);

        if self.match_symbol('[')? {
            if let Some(variable) = &target {
                self.check_indexable(&name.lexeme, &variable.ty(), name.line);
                self.push_variable(variable);
            }
            let index_line = self.peek_line()?;
            let index = self.compile_expression()?;
            self.check_index(&index, index_line);
            self.expect_symbol(']')?;
            self.writer.write_arithmetic(ArithmeticOp::Add);

            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;

            self.writer.write_pop(Segment::Temp, 0);
            self.writer.write_pop(Segment::Pointer, 1);
            self.writer.write_push(Segment::Temp, 0);
            self.writer.write_pop(Segment::That, 0);
            return Ok(false);
        }

        self.expect_symbol('=')?;
        let value_line = self.peek_line()?;
        let value = self.compile_expression()?;
        self.expect_symbol(';')?;

        if let Some(variable) = target {
            if let Variable::Resolved(symbol) = &variable {
                if !value.is_assignable_to(&symbol.ty) {
                    self.semantic_error(
                        format!(
                            "Type mismatch: cannot assign '{}' to '{}' of type '{}'",
                            value, symbol.name, symbol.ty
                        ),
                        value_line,
                    );
                }
                let scope = self.current_scope();
                self.symbols.mark_initialized(scope, &symbol.name);
            }
            self.pop_variable(&variable);
        }
        Ok(false)
    }

    /// `if → 'if' '(' expr ')' '{' {statement} '}' [ 'else' '{' {statement} '}' ]`
    fn compile_if(&mut self) -> CompileResult<bool> {
        self.expect_keyword(Keyword::If)?;
        let n = self.next_label();
        let if_true = format!("IF_TRUE{}", n);
        let if_false = format!("IF_FALSE{}", n);
        let if_end = format!("IF_END{}", n);

        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;

        self.writer.write_if(if_true.as_str());
        self.writer.write_goto(if_false.as_str());
        self.writer.write_label(if_true);
        let then_returns = self.compile_block()?;

        if self.check_keyword(Keyword::Else)? {
            self.advance()?;
            self.writer.write_goto(if_end.as_str());
            self.writer.write_label(if_false);
            let else_returns = self.compile_block()?;
            self.writer.write_label(if_end);
            Ok(then_returns && else_returns)
        } else {
            self.writer.write_label(if_false);
            Ok(false)
        }
    }

    /// `while → 'while' '(' expr ')' '{' {statement} '}'`
    fn compile_while(&mut self) -> CompileResult<bool> {
        self.expect_keyword(Keyword::While)?;
        let n = self.next_label();
        let start = format!("WHILE_EXP{}", n);
        let end = format!("WHILE_END{}", n);

        self.writer.write_label(start.as_str());
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.writer.write_arithmetic(ArithmeticOp::Not);
        self.writer.write_if(end.as_str());

        self.compile_block()?;
        self.writer.write_goto(start);
        self.writer.write_label(end);
        Ok(false)
    }

    /// `do → 'do' call ';'`
    fn compile_do(&mut self) -> CompileResult<bool> {
        self.expect_keyword(Keyword::Do)?;
        let name = self.expect_identifier()?;
        if self.match_symbol('.')? {
            let member = self.expect_identifier()?;
            self.compile_call(Some(name), member)?;
        } else {
            self.compile_call(None, name)?;
        }
        self.expect_symbol(';')?;

        self.writer.write_pop(Segment::Temp, 0);
        Ok(false)
    }

    /// `return → 'return' [ expr ] ';'`
    fn compile_return(&mut self) -> CompileResult<bool> {
        let keyword = self.expect_keyword(Keyword::Return)?;
        let (name, return_type) = match &self.subroutine {
            Some(ctx) => (ctx.name.clone(), ctx.return_type.clone()),
            None => (String::new(), Type::Void),
        };

        if self.match_symbol(';')? {
            if !return_type.is_void() {
                self.semantic_error(
                    format!("'{}' must return a value of type '{}'", name, return_type),
                    keyword.line,
                );
            }
        } else {
            let value_line = self.peek_line()?;
            let value = self.compile_expression()?;
            self.expect_symbol(';')?;

            if return_type.is_void() {
                self.semantic_error(
                    format!("Void subroutine '{}' cannot return a value", name),
                    value_line,
                );
            } else if !value.is_assignable_to(&return_type) {
                self.semantic_error(
                    format!(
                        "Type mismatch: '{}' returns '{}', found '{}'",
                        name, return_type, value
                    ),
                    value_line,
                );
            }
        }

        if return_type.is_void() {
            self.writer.write_push(Segment::Constant, 0);
        }
        self.writer.write_return();
        Ok(true)
    }
}
