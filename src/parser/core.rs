//! Token cursor shared by the recursive-descent parser.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser for Verve.
pub struct Parser {
    tokens: Vec<Token>,
    pub(crate) pos: usize,
}

impl Parser {
    /// The token list always ends in `Eof`, so lookahead never runs dry.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map_or(Span::new(0, 0, 1, 1), |t| t.span);
            tokens.push(Token::eof(end.end, end.line, end.column));
        }
        Self { tokens, pos: 0 }
    }

    /// Parse a complete program.
    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.declaration()?);
        }
        Ok(Program::new(statements))
    }

    pub(crate) fn lookahead(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.lookahead(0).kind == TokenKind::Eof
    }

    /// Same token variant as `kind`, ignoring any payload.
    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        !self.at_eof() && std::mem::discriminant(&self.lookahead(0).kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.lookahead(0).clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        let found = self.at(kind);
        if found {
            self.pos += 1;
        }
        found
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.at(kind) {
            return Ok(self.bump());
        }
        Err(self.unexpected(kind.to_string()))
    }

    pub(crate) fn expect_name(&mut self) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = &self.lookahead(0).kind {
            let name = name.clone();
            self.pos += 1;
            return Ok(name);
        }
        Err(self.unexpected("identifier"))
    }

    /// Error for the current token, reporting end of input separately.
    pub(crate) fn unexpected(&self, expected: impl Into<String>) -> ParserError {
        let token = self.lookahead(0);
        match token.kind {
            TokenKind::Eof => ParserError::unexpected_eof(token.span),
            ref found => ParserError::unexpected_token(expected, found.to_string(), token.span),
        }
    }

    pub(crate) fn here(&self) -> Span {
        self.lookahead(0).span
    }

    pub(crate) fn last_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }
}
