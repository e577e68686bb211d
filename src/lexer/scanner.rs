//! Scanner turning source text into tokens on demand.

use crate::error::LexerError;
use crate::lexer::token::{Keyword, Token, TokenKind};

/// Largest integer constant the target VM can push.
const MAX_INT_CONSTANT: u32 = 32767;

const SYMBOLS: &str = "{}()[].,;+-*/&|<>=~";

/// The lexer. Tokens are produced lazily with one token of lookahead.
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    peeked: Option<Token>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            peeked: None,
        }
    }

    /// Scan all tokens from the source, ending with a single EOF token.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Consume and return the next token.
    ///
    /// After the EOF token has been returned, further calls keep returning EOF.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scan_token(),
        }
    }

    /// Return the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<&Token, LexerError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.scan_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments()?;

        let Some(c) = self.advance() else {
            return Ok(Token::eof(self.line));
        };

        match c {
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.scan_identifier(c)),
            c if SYMBOLS.contains(c) => Ok(Token::new(TokenKind::Symbol(c), c, self.line)),
            _ => Err(LexerError::unexpected_char(c, self.line)),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexerError> {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                }
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while self.peek().is_some() && self.peek() != Some('\n') {
                            self.advance();
                        }
                    }
                    Some('*') => self.skip_block_comment()?,
                    _ => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexerError> {
        let start_line = self.line;
        self.advance(); // consume /
        self.advance(); // consume *

        loop {
            match self.advance() {
                None => return Err(LexerError::unterminated_comment(start_line)),
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(());
                }
                Some('\n') => self.line += 1,
                Some(_) => {}
            }
        }
    }

    fn scan_string(&mut self) -> Result<Token, LexerError> {
        let start_line = self.line;
        let mut value = String::new();

        loop {
            match self.advance() {
                None | Some('\n') => return Err(LexerError::unterminated_string(start_line)),
                Some('"') => break,
                Some(c) => value.push(c),
            }
        }

        Ok(Token::new(TokenKind::StringLiteral, value, start_line))
    }

    fn scan_number(&mut self, first: char) -> Result<Token, LexerError> {
        let mut value = String::from(first);

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else if c.is_ascii_alphabetic() || c == '_' {
                // `3x` must not silently become two tokens
                value.push(c);
                return Err(LexerError::malformed_number(value, self.line));
            } else {
                break;
            }
        }

        match value.parse::<u32>() {
            Ok(n) if n <= MAX_INT_CONSTANT => {
                Ok(Token::new(TokenKind::IntLiteral, value, self.line))
            }
            _ => Err(LexerError::IntegerTooLarge(value, self.line)),
        }
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut value = String::from(first);

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match Keyword::from_ident(&value) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier,
        };
        Token::new(kind, value, self.line)
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next()
    }
}
