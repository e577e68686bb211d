//! Expression productions. Every function emits its operands before its
//! operator and returns the static type of the value left on the stack.

use std::io::Write;

use crate::lexer::{Keyword, Token, TokenKind};
use crate::types::{Type, ARRAY_CLASS};
use crate::vm::{ArithmeticOp, Segment};

use super::engine::{CompilationEngine, CompileResult};

impl<'a, W: Write> CompilationEngine<'a, W> {
    /// `expr → rel { ('&'|'|') rel }`
    pub(crate) fn compile_expression(&mut self) -> CompileResult<Type> {
        let mut ty = self.compile_relation()?;

        loop {
            let op = if self.check_symbol('&')? {
                ArithmeticOp::And
            } else if self.check_symbol('|')? {
                ArithmeticOp::Or
            } else {
                break;
            };
            self.advance()?;

            let rhs = self.compile_relation()?;
            self.writer.write_arithmetic(op);
            ty = if ty == Type::Boolean && rhs == Type::Boolean {
                Type::Boolean
            } else {
                Type::Int
            };
        }
        Ok(ty)
    }

    /// `rel → arith { ('='|'<'|'>') arith }`
    fn compile_relation(&mut self) -> CompileResult<Type> {
        let mut ty = self.compile_arithmetic()?;

        loop {
            let op = if self.check_symbol('=')? {
                ArithmeticOp::Eq
            } else if self.check_symbol('<')? {
                ArithmeticOp::Lt
            } else if self.check_symbol('>')? {
                ArithmeticOp::Gt
            } else {
                break;
            };
            self.advance()?;

            self.compile_arithmetic()?;
            self.writer.write_arithmetic(op);
            ty = Type::Boolean;
        }
        Ok(ty)
    }

    /// `arith → term { ('+'|'-') term }`
    fn compile_arithmetic(&mut self) -> CompileResult<Type> {
        let mut ty = self.compile_term()?;

        loop {
            let op = if self.check_symbol('+')? {
                ArithmeticOp::Add
            } else if self.check_symbol('-')? {
                ArithmeticOp::Sub
            } else {
                break;
            };
            self.advance()?;

            self.compile_term()?;
            self.writer.write_arithmetic(op);
            ty = Type::Int;
        }
        Ok(ty)
    }

    /// `term → factor { ('*'|'/') factor }`
    fn compile_term(&mut self) -> CompileResult<Type> {
        let mut ty = self.compile_factor()?;

        loop {
            let routine = if self.check_symbol('*')? {
                "Math.multiply"
            } else if self.check_symbol('/')? {
                "Math.divide"
            } else {
                break;
            };
            self.advance()?;

            self.compile_factor()?;
            self.writer.write_call(routine, 2);
            ty = Type::Int;
        }
        Ok(ty)
    }

    /// `factor → [ '-' | '~' ] operand`
    fn compile_factor(&mut self) -> CompileResult<Type> {
        if self.match_symbol('-')? {
            self.compile_operand()?;
            self.writer.write_arithmetic(ArithmeticOp::Neg);
            Ok(Type::Int)
        } else if self.match_symbol('~')? {
            let ty = self.compile_operand()?;
            self.writer.write_arithmetic(ArithmeticOp::Not);
            Ok(if ty == Type::Boolean { Type::Boolean } else { Type::Int })
        } else {
            self.compile_operand()
        }
    }

    /// ```text
    /// operand → intLit | stringLit | 'true'|'false'|'null'|'this'
    ///         | id [ '.' id ] [ '[' expr ']' | '(' exprList ')' ]
    ///         | '(' expr ')'
    /// ```
    fn compile_operand(&mut self) -> CompileResult<Type> {
        let kind = self.peek()?.kind;
        match kind {
            TokenKind::IntLiteral => {
                let token = self.advance()?;
                let value = token.lexeme.parse::<usize>().unwrap_or_default();
                self.writer.write_push(Segment::Constant, value);
                Ok(Type::Int)
            }
            TokenKind::StringLiteral => {
                let token = self.advance()?;
                self.compile_string(&token.lexeme);
                Ok(Type::Class("String".to_string()))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance()?;
                self.writer.write_push(Segment::Constant, 0);
                self.writer.write_arithmetic(ArithmeticOp::Not);
                Ok(Type::Boolean)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance()?;
                self.writer.write_push(Segment::Constant, 0);
                Ok(Type::Boolean)
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance()?;
                self.writer.write_push(Segment::Constant, 0);
                Ok(Type::Null)
            }
            TokenKind::Keyword(Keyword::This) => {
                let token = self.advance()?;
                if !self.caller_kind().has_receiver() {
                    self.semantic_error("'this' cannot be used inside a function", token.line);
                }
                self.writer.write_push(Segment::Pointer, 0);
                Ok(Type::Class(self.class_name.clone()))
            }
            TokenKind::Symbol('(') => {
                self.advance()?;
                let ty = self.compile_expression()?;
                self.expect_symbol(')')?;
                Ok(ty)
            }
            TokenKind::Identifier => self.compile_identifier_operand(),
            _ => Err(self.unexpected("expression")?),
        }
    }

    /// `id [ '.' id ] [ '[' expr ']' | '(' exprList ')' ]`
    fn compile_identifier_operand(&mut self) -> CompileResult<Type> {
        let name = self.advance()?;

        if self.match_symbol('.')? {
            let member = self.expect_identifier()?;
            if self.check_symbol('(')? {
                return self.compile_call(Some(name), member);
            }
            let ty = self.compile_member_read(&name, &member);
            return self.compile_subscript(ty, &member);
        }

        if self.check_symbol('(')? {
            return self.compile_call(None, name);
        }

        let check_init = !self.check_symbol('[')?;
        let ty = match self.resolve_variable(&name, check_init) {
            Some(variable) => {
                self.push_variable(&variable);
                variable.ty()
            }
            None => Type::Unknown,
        };
        self.compile_subscript(ty, &name)
    }

    /// With the base already pushed, read `base[expr]` when a subscript
    /// follows.
    fn compile_subscript(&mut self, base: Type, name: &Token) -> CompileResult<Type> {
        if !self.match_symbol('[')? {
            return Ok(base);
        }

        self.check_indexable(&name.lexeme, &base, name.line);
        let index_line = self.peek_line()?;
        let index = self.compile_expression()?;
        self.check_index(&index, index_line);
        self.expect_symbol(']')?;

        self.writer.write_arithmetic(ArithmeticOp::Add);
        self.writer.write_pop(Segment::Pointer, 1);
        self.writer.write_push(Segment::That, 0);
        Ok(Type::Unknown)
    }

    /// `exprList → [ expr {',' expr} ]` including the parentheses.
    pub(crate) fn compile_expression_list(&mut self) -> CompileResult<Vec<Type>> {
        self.expect_symbol('(')?;
        let mut types = Vec::new();

        if !self.check_symbol(')')? {
            loop {
                types.push(self.compile_expression()?);
                if !self.match_symbol(',')? {
                    break;
                }
            }
        }
        self.expect_symbol(')')?;
        Ok(types)
    }

    /// A string constant is built at run time one character at a time.
    fn compile_string(&mut self, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        self.writer.write_push(Segment::Constant, chars.len());
        self.writer.write_call("String.new", 1);
        for c in chars {
            self.writer.write_push(Segment::Constant, c as usize);
            self.writer.write_call("String.appendChar", 2);
        }
    }

    pub(crate) fn check_index(&mut self, index: &Type, line: usize) {
        if !index.is_assignable_to(&Type::Int) {
            self.semantic_error(
                format!("Array index must be of type 'int', found '{}'", index),
                line,
            );
        }
    }

    pub(crate) fn check_indexable(&mut self, name: &str, ty: &Type, line: usize) {
        if !ty.is_array() && *ty != Type::Unknown {
            self.semantic_error(
                format!("'{}' of type '{}' is not an {}", name, ty, ARRAY_CLASS),
                line,
            );
        }
    }
}
